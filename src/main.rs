#[tokio::main]
async fn main() -> anyhow::Result<()> {
    plate_renewal::cli::run().await
}
