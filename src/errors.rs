//! Error handling module
//!
//! Every failure a renewal run can surface, classified by who is at fault.

use action_primitives::ActionError;
use cdp_adapter::AdapterError;
use serde::Serialize;
use thiserror::Error;

use crate::renewal::model::PageState;

/// Who caused a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultClass {
    /// Rejected input; the portal's message is passed through verbatim.
    Client,
    /// Portal or infrastructure problem; callers get a generic message.
    Service,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenewalError {
    #[error("{0}")]
    PlateRejected(String),

    #[error("{0}")]
    StreetNumberRejected(String),

    #[error("{0}")]
    PaymentRejected(String),

    #[error("Unable to retrieve fee summary")]
    FeeSummaryUnavailable,

    #[error("payment was not confirmed (page state {0:?})")]
    PaymentNotConfirmed(PageState),

    #[error("portal interaction failed: {0}")]
    Portal(String),

    #[error("failed to open browser session: {0}")]
    SessionUnavailable(String),

    #[error("workflow exceeded its {0}s deadline")]
    DeadlineExceeded(u64),

    #[error("workflow aborted: {0}")]
    Aborted(String),

    #[error("too many renewals in progress")]
    Busy,
}

impl RenewalError {
    pub fn plate_rejected(alert: Option<&str>) -> Self {
        let message = match alert.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => format!("{} Plate Number is not correct", text),
            None => "Plate Number is not correct".to_string(),
        };
        RenewalError::PlateRejected(message)
    }

    pub fn fault(&self) -> FaultClass {
        match self {
            RenewalError::PlateRejected(_)
            | RenewalError::StreetNumberRejected(_)
            | RenewalError::PaymentRejected(_) => FaultClass::Client,
            _ => FaultClass::Service,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            RenewalError::Busy => 503,
            _ => match self.fault() {
                FaultClass::Client => 400,
                FaultClass::Service => 500,
            },
        }
    }

    /// Message safe to return to callers. Service faults never carry selector detail.
    pub fn public_message(&self) -> String {
        match self {
            RenewalError::PlateRejected(text)
            | RenewalError::StreetNumberRejected(text)
            | RenewalError::PaymentRejected(text) => text.clone(),
            RenewalError::FeeSummaryUnavailable => self.to_string(),
            RenewalError::PaymentNotConfirmed(_) => "Payment processing failed".to_string(),
            RenewalError::Busy => "Too many renewals in progress, retry later".to_string(),
            _ => "Renewal service is temporarily unavailable".to_string(),
        }
    }

    /// Short label for metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RenewalError::PlateRejected(_) => "plate_rejected",
            RenewalError::StreetNumberRejected(_) => "street_number_rejected",
            RenewalError::PaymentRejected(_) => "payment_rejected",
            RenewalError::FeeSummaryUnavailable => "fee_summary_unavailable",
            RenewalError::PaymentNotConfirmed(_) => "payment_not_confirmed",
            RenewalError::Portal(_) => "portal_error",
            RenewalError::SessionUnavailable(_) => "session_unavailable",
            RenewalError::DeadlineExceeded(_) => "deadline_exceeded",
            RenewalError::Aborted(_) => "aborted",
            RenewalError::Busy => "busy",
        }
    }
}

impl From<AdapterError> for RenewalError {
    fn from(err: AdapterError) -> Self {
        RenewalError::Portal(err.to_string())
    }
}

impl From<ActionError> for RenewalError {
    fn from(err: ActionError) -> Self {
        RenewalError::Portal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_pass_portal_text_through() {
        let err = RenewalError::PaymentRejected("Failed: card declined".into());
        assert_eq!(err.fault(), FaultClass::Client);
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.public_message(), "Failed: card declined");
    }

    #[test]
    fn plate_rejection_message() {
        assert_eq!(
            RenewalError::plate_rejected(Some("Invalid entry.")).public_message(),
            "Invalid entry. Plate Number is not correct"
        );
        assert_eq!(
            RenewalError::plate_rejected(None).public_message(),
            "Plate Number is not correct"
        );
    }

    #[test]
    fn service_faults_hide_internals() {
        let err: RenewalError = AdapterError::not_found("#payment-account").into();
        assert_eq!(err.fault(), FaultClass::Service);
        assert_eq!(err.http_status(), 500);
        assert!(!err.public_message().contains("#payment-account"));
        assert_eq!(
            RenewalError::FeeSummaryUnavailable.public_message(),
            "Unable to retrieve fee summary"
        );
        assert_eq!(RenewalError::Busy.http_status(), 503);
    }
}
