//! Core data types for action primitives

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ActionError;

/// How a needle is compared with a `<select>` option's visible label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionMatch {
    /// Label contains the needle, ignoring ASCII and Unicode case
    ContainsIgnoreCase,
    /// Label contains the needle exactly as written
    Contains,
}

impl OptionMatch {
    pub fn matches(self, label: &str, needle: &str) -> bool {
        let needle = needle.trim();
        if needle.is_empty() {
            return false;
        }
        match self {
            OptionMatch::Contains => label.contains(needle),
            OptionMatch::ContainsIgnoreCase => {
                label.to_lowercase().contains(&needle.to_lowercase())
            }
        }
    }

    /// First label in document order matching `needle`.
    pub fn first_match<'l>(self, labels: &'l [String], needle: &str) -> Option<&'l str> {
        labels
            .iter()
            .map(String::as_str)
            .find(|label| self.matches(label, needle))
    }
}

/// One best-effort write into a text input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldWrite {
    pub selector: String,
    pub value: String,
    /// Pause after the write, applied whether or not the write landed.
    pub settle: Duration,
}

impl FieldWrite {
    pub fn new(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            value: value.into(),
            settle: Duration::ZERO,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Outcome of a tolerant fill pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    pub written: Vec<String>,
    pub skipped: Vec<(String, ActionError)>,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
