//! Payment frame handling.

use action_primitives::Primitives;
use tracing::{debug, info, warn};

use crate::errors::RenewalError;
use crate::renewal::fees::collect_fee_summary;
use crate::renewal::model::{FeeSummary, PaymentOutcome, PaymentRequest};
use crate::renewal::selectors;

/// Submits the card details inside the payment frame.
///
/// The fee summary is re-read before anything is clicked because payment navigates away
/// from the fee fields; `fallback` is used when the page no longer shows them. Any alert
/// after submit is a rejection carrying the alert text. The default document is restored
/// on every exit path.
pub async fn handle_payment_processing(
    prims: &Primitives<'_>,
    request: &PaymentRequest,
    fallback: FeeSummary,
) -> Result<PaymentOutcome, RenewalError> {
    let summary = collect_fee_summary(prims).await.unwrap_or(fallback);

    let outcome = submit_payment(prims, request).await;

    if let Err(err) = prims.session().switch_to_default_content().await {
        warn!(error = %err, "failed to restore default document after payment");
    }

    match outcome? {
        Some(reason) => {
            info!(reason = %reason, "payment rejected by portal");
            Ok(PaymentOutcome::Rejected { reason })
        }
        None => Ok(PaymentOutcome::Accepted { summary }),
    }
}

async fn submit_payment(
    prims: &Primitives<'_>,
    request: &PaymentRequest,
) -> Result<Option<String>, RenewalError> {
    let session = prims.session();
    session.switch_to_default_content().await?;

    match prims.click_if_present(selectors::ACCEPT_TERMS).await {
        Ok(true) => {}
        Ok(false) => debug!("accept terms control absent"),
        Err(err) => debug!(error = %err, "accept terms click failed"),
    }

    let frame = prims.wait_present(selectors::PAYMENT_FRAME).await?;
    session.switch_to_frame(&frame).await?;

    prims
        .type_into(selectors::PAYMENT_ACCOUNT, &request.account)
        .await?;
    prims
        .select_text(selectors::PAYMENT_EXP_MONTH, &request.exp_month)
        .await?;
    prims
        .select_text(selectors::PAYMENT_EXP_YEAR, request.exp_year_short())
        .await?;
    prims.type_into(selectors::PAYMENT_CV, &request.cv).await?;
    prims.click(selectors::PAYMENT_SUBMIT).await?;
    debug!("payment submitted");

    Ok(prims.take_alert().await)
}
