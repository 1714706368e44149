//! Tolerant element operations over an [`ElementSession`].
//!
//! The renewal portal renders different inputs per plate and per stage, so most of these
//! helpers treat a missing element as a normal outcome instead of an error.

use std::time::Duration;

use cdp_adapter::{ElementHandle, ElementSession};
use tracing::{debug, warn};

use crate::errors::ActionError;
use crate::types::{FieldWrite, FillReport, OptionMatch};
use crate::waiting::{settle, Timings};

/// Borrowed view of a session plus the wait budgets used for it.
#[derive(Clone, Copy)]
pub struct Primitives<'a> {
    session: &'a dyn ElementSession,
    timings: Timings,
}

impl<'a> Primitives<'a> {
    pub fn new(session: &'a dyn ElementSession, timings: Timings) -> Self {
        Self { session, timings }
    }

    pub fn session(&self) -> &'a dyn ElementSession {
        self.session
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Single presence check; lookup failures count as absence.
    pub async fn is_present(&self, selector: &str) -> bool {
        match self.session.find_one(selector).await {
            Ok(found) => found.is_some(),
            Err(err) => {
                debug!(selector, error = %err, "presence check failed");
                false
            }
        }
    }

    /// Waits up to the element budget for `selector`.
    pub async fn wait_present(&self, selector: &str) -> Result<ElementHandle, ActionError> {
        Ok(self
            .session
            .wait_for(selector, self.timings.element_wait())
            .await?)
    }

    pub async fn type_into(&self, selector: &str, text: &str) -> Result<(), ActionError> {
        let handle = self.wait_present(selector).await?;
        self.session.type_text(&handle, text).await?;
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<(), ActionError> {
        let handle = self.wait_present(selector).await?;
        self.session.click(&handle).await?;
        Ok(())
    }

    /// Clicks `selector` if it is present right now. Returns whether a click was issued.
    pub async fn click_if_present(&self, selector: &str) -> Result<bool, ActionError> {
        match self.session.find_one(selector).await? {
            Some(handle) => {
                self.session.click(&handle).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Selects the first option of `selector` whose label matches `needle`.
    ///
    /// Returns the chosen label, or `None` when the dropdown is absent or nothing matches.
    pub async fn select_matching(
        &self,
        selector: &str,
        needle: &str,
        mode: OptionMatch,
    ) -> Result<Option<String>, ActionError> {
        let Some(handle) = self.session.find_one(selector).await? else {
            return Ok(None);
        };
        let labels = self.session.option_labels(&handle).await?;
        let Some(label) = mode.first_match(&labels, needle) else {
            debug!(selector, needle, options = labels.len(), "no option matched");
            return Ok(None);
        };
        self.session.select_by_text(&handle, label).await?;
        Ok(Some(label.to_string()))
    }

    /// Waits for `selector` and selects the option with exactly this visible text.
    pub async fn select_text(&self, selector: &str, visible_text: &str) -> Result<(), ActionError> {
        let handle = self.wait_present(selector).await?;
        self.session.select_by_text(&handle, visible_text).await?;
        Ok(())
    }

    /// Text of `selector` if present now.
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>, ActionError> {
        match self.session.find_one(selector).await? {
            Some(handle) => Ok(Some(self.session.text(&handle).await?)),
            None => Ok(None),
        }
    }

    pub async fn text_or_default(&self, selector: &str) -> String {
        match self.text_of(selector).await {
            Ok(Some(text)) => text,
            Ok(None) => String::new(),
            Err(err) => {
                debug!(selector, error = %err, "text read failed, using empty value");
                String::new()
            }
        }
    }

    /// Accepts a pending alert within the alert budget and returns its text.
    pub async fn take_alert(&self) -> Option<String> {
        self.take_alert_within(self.timings.alert_wait()).await
    }

    pub async fn take_alert_within(&self, timeout: Duration) -> Option<String> {
        match self.session.accept_alert(timeout).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "alert handling failed");
                None
            }
        }
    }

    /// Writes every field it can. A field that cannot be resolved is skipped and recorded.
    pub async fn fill_fields(&self, writes: &[FieldWrite]) -> FillReport {
        let mut report = FillReport::default();
        for write in writes {
            match self.type_into(&write.selector, &write.value).await {
                Ok(()) => report.written.push(write.selector.clone()),
                Err(err) => {
                    debug!(selector = %write.selector, error = %err, "field skipped");
                    report.skipped.push((write.selector.clone(), err));
                }
            }
            settle(write.settle).await;
        }
        report
    }
}
