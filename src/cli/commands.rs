use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cdp_adapter::{ChromiumSessionFactory, SessionFactory};
use clap::{Args, Subcommand};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::renewal::{self, FeeSummary, PaymentRequest, RenewalContext, RenewalRequest};
use crate::server::{self, ServeState};
use crate::session::SessionPool;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Fetch a fee quote for one request and print it as JSON
    Quote(RequestArgs),

    /// Run the full renewal including payment and print the fee summary as JSON
    Complete(RequestArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address (defaults to server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (defaults to server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// JSON file with the request body
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,
}

pub async fn dispatch(command: &Commands, config: Config) -> Result<()> {
    match command {
        Commands::Serve(args) => cmd_serve(args, config).await,
        Commands::Quote(args) => {
            let request: RenewalRequest = read_request(&args.request).await?;
            let summary = run_single(config, move |ctx, session| {
                async move { renewal::quote(session, &ctx, &request).await }.boxed()
            })
            .await?;
            print_summary(&summary)
        }
        Commands::Complete(args) => {
            let request: PaymentRequest = read_request(&args.request).await?;
            let summary = run_single(config, move |ctx, session| {
                async move { renewal::complete(session, &ctx, &request).await }.boxed()
            })
            .await?;
            print_summary(&summary)
        }
    }
}

/// Builds the session pool and shared context from configuration.
pub fn build_runtime(config: &Config) -> (Arc<SessionPool>, Arc<RenewalContext>) {
    let factory: Arc<dyn SessionFactory> =
        Arc::new(ChromiumSessionFactory::new(Arc::new(config.browser.clone())));
    let pool = Arc::new(SessionPool::new(
        factory,
        config.max_concurrent_sessions,
        Duration::from_secs(config.admission_wait_secs),
        config.session_deadline_secs.map(Duration::from_secs),
    ));
    let context = Arc::new(RenewalContext::new(
        config.portal_url.clone(),
        config.timings,
        Diagnostics::new(config.diagnostics.clone()),
    ));
    (pool, context)
}

async fn cmd_serve(args: &ServeArgs, config: Config) -> Result<()> {
    let host = args.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", host, port))?;

    let (pool, context) = build_runtime(&config);
    info!(
        portal = %context.portal_url,
        max_sessions = pool.limit(),
        "renewal runtime ready"
    );
    server::serve(ServeState::new(pool, context), addr).await
}

async fn run_single<F>(config: Config, work: F) -> Result<FeeSummary>
where
    F: for<'s> FnOnce(
            Arc<RenewalContext>,
            &'s dyn cdp_adapter::ElementSession,
        ) -> futures::future::BoxFuture<'s, Result<FeeSummary, crate::RenewalError>>
        + Send
        + 'static,
{
    let (pool, context) = build_runtime(&config);
    pool.run(move |session| work(context, session))
        .await
        .map_err(|err| anyhow::anyhow!("{} ({:?} fault)", err, err.fault()))
}

async fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse request file {}", path.display()))
}

fn print_summary(summary: &FeeSummary) -> Result<()> {
    let body = serde_json::to_string_pretty(summary).context("failed to encode fee summary")?;
    println!("{}", body);
    Ok(())
}
