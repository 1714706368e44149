//! Wait budgets shared by every portal interaction

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Named delays and timeouts used while driving the portal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Timeout for an element to become present (milliseconds)
    pub element_wait_ms: u64,

    /// Timeout for a modal alert to appear (milliseconds)
    pub alert_wait_ms: u64,

    /// Pause after clicking the form submit button (milliseconds)
    pub submit_settle_ms: u64,

    /// Pause after writing the zip code (milliseconds)
    pub zip_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_wait_ms: 10_000,
            alert_wait_ms: 5_000,
            submit_settle_ms: 4_000,
            zip_settle_ms: 2_000,
        }
    }
}

impl Timings {
    /// Zero budgets, so every wait degenerates to a single lookup.
    pub fn immediate() -> Self {
        Self {
            element_wait_ms: 0,
            alert_wait_ms: 0,
            submit_settle_ms: 0,
            zip_settle_ms: 0,
        }
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn alert_wait(&self) -> Duration {
        Duration::from_millis(self.alert_wait_ms)
    }

    pub fn submit_settle(&self) -> Duration {
        Duration::from_millis(self.submit_settle_ms)
    }

    pub fn zip_settle(&self) -> Duration {
        Duration::from_millis(self.zip_settle_ms)
    }
}

/// Sleeps for `delay`; a zero delay returns without yielding to the timer.
pub async fn settle(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    trace!(delay_ms = delay.as_millis() as u64, "settling");
    tokio::time::sleep(delay).await;
}
