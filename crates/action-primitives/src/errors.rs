//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Element anchor could not be resolved
    #[error("Anchor not found: {0}")]
    AnchorNotFound(String),

    /// Wait operation timed out
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Dropdown option was not found
    #[error("Option not found in dropdown: {0}")]
    OptionNotFound(String),

    /// Frame document could not be entered
    #[error("Frame unavailable: {0}")]
    FrameUnavailable(String),

    /// Navigation failed or timed out
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Browser communication error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Element-level absence, which the portal produces routinely.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            ActionError::AnchorNotFound(_)
                | ActionError::WaitTimeout(_)
                | ActionError::OptionNotFound(_)
        )
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::TargetNotFound => ActionError::AnchorNotFound(message),
            AdapterErrorKind::WaitTimeout => ActionError::WaitTimeout(message),
            AdapterErrorKind::OptionNotFound => ActionError::OptionNotFound(message),
            AdapterErrorKind::FrameUnavailable => ActionError::FrameUnavailable(message),
            AdapterErrorKind::NavTimeout => ActionError::Navigation(message),
            AdapterErrorKind::CdpIo | AdapterErrorKind::SessionClosed => {
                ActionError::CdpIo(message)
            }
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_kinds_map_onto_action_errors() {
        let err: ActionError = AdapterError::not_found("#zip").into();
        assert!(matches!(err, ActionError::AnchorNotFound(_)));
        assert!(err.is_absence());

        let err: ActionError = AdapterError::io("socket closed").into();
        assert!(matches!(err, ActionError::CdpIo(_)));
        assert!(!err.is_absence());

        let err: ActionError = AdapterError::new(AdapterErrorKind::FrameUnavailable).into();
        assert!(matches!(err, ActionError::FrameUnavailable(_)));
    }
}
