use action_primitives::Primitives;
use tracing::debug;

use crate::renewal::model::{FeeLine, FeeSummary};

/// Drops a single leading currency symbol and surrounding whitespace.
pub fn strip_currency(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('$')
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Reads the fee breakdown from the current page.
///
/// Returns `None` when a mandatory line is absent or a read fails, which callers treat
/// as "no fee data on this page yet". Optional lines default to empty.
pub async fn collect_fee_summary(prims: &Primitives<'_>) -> Option<FeeSummary> {
    let mut summary = FeeSummary::default();
    for line in FeeLine::ALL {
        let selector = line.selector();
        let raw = if line.is_mandatory() {
            match prims.text_of(&selector).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!(line = line.label(), "mandatory fee line absent");
                    return None;
                }
                Err(err) => {
                    debug!(line = line.label(), error = %err, "fee line unreadable");
                    return None;
                }
            }
        } else {
            prims.text_or_default(&selector).await
        };

        let value = if line.is_monetary() {
            strip_currency(&raw)
        } else {
            raw.trim().to_string()
        };
        summary.set(line, value);
    }
    Some(summary)
}
