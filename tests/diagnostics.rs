mod common;

use action_primitives::Timings;
use common::{renewal_request, Interaction, Script, SimulatedPortal, PORTAL_URL};
use futures::FutureExt;
use plate_renewal::diagnostics::{Diagnostics, DiagnosticsConfig};
use plate_renewal::renewal::{self, selectors as sel, RenewalContext};
use plate_renewal::with_session;

fn context_with(dir: &std::path::Path, each_step: bool) -> RenewalContext {
    RenewalContext::new(
        PORTAL_URL,
        Timings::immediate(),
        Diagnostics::new(DiagnosticsConfig {
            enabled: true,
            directory: dir.to_path_buf(),
            capture_on_failure: true,
            capture_each_step: each_step,
        }),
    )
}

fn pngs(dir: &std::path::Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut names: Vec<String> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".png"))
                .collect();
            names.sort();
            names
        }
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn failure_screenshot_lands_in_plate_directory() {
    let dir = tempfile::tempdir().unwrap();
    let script =
        Script::price_after_street().alert_on("search", sel::EXPRESS_RENEW_FORM, "Invalid plate");
    let portal = SimulatedPortal::new(script);
    let ctx = context_with(dir.path(), false);
    let request = renewal_request("Davidson");

    let result = with_session(&portal, None, |session| {
        async move { renewal::quote(session, &ctx, &request).await }.boxed()
    })
    .await;
    assert!(result.is_err());

    let files = pngs(&dir.path().join("ABC123"));
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("failed_"));
    assert_eq!(portal.count(&Interaction::Screenshot), 1);
}

#[tokio::test]
async fn step_captures_are_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let portal = SimulatedPortal::new(Script::price_after_street());
    let ctx = context_with(dir.path(), true);
    let request = renewal_request("Davidson");

    with_session(&portal, None, |session| {
        async move { renewal::quote(session, &ctx, &request).await }.boxed()
    })
    .await
    .expect("quote succeeds");

    let files = pngs(&dir.path().join("ABC123"));
    assert!(files.iter().any(|name| name.starts_with("county_selected_")));
    assert!(files.iter().any(|name| name.starts_with("fee_collected_")));
    assert!(!files.iter().any(|name| name.starts_with("failed_")));
}

#[tokio::test]
async fn capture_failures_are_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let mut script =
        Script::price_after_street().alert_on("search", sel::EXPRESS_RENEW_FORM, "Invalid plate");
    script.screenshot_fails = true;
    let portal = SimulatedPortal::new(script);
    let ctx = context_with(dir.path(), true);
    let request = renewal_request("Davidson");

    let err = with_session(&portal, None, |session| {
        async move { renewal::quote(session, &ctx, &request).await }.boxed()
    })
    .await
    .unwrap_err();
    assert_eq!(err.public_message(), "Invalid plate Plate Number is not correct");
    assert!(pngs(&dir.path().join("ABC123")).is_empty());
    assert_eq!((portal.opens(), portal.closes()), (1, 1));
}
