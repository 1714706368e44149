//! Request records, page states and the fee summary produced by a renewal run.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::RenewalError;
use crate::renewal::selectors;

/// Applicant data for a renewal quote. Field names follow the portal's wire format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalRequest {
    #[serde(rename = "plateNumber")]
    pub plate_number: String,
    pub county: String,
    pub name: String,
    #[serde(rename = "addressTwo")]
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(rename = "homePhone0")]
    pub home_phone0: String,
    #[serde(rename = "homePhone1")]
    pub home_phone1: String,
    #[serde(rename = "homePhone2")]
    pub home_phone2: String,
    pub email: String,
    #[serde(rename = "confirmEmail")]
    pub confirm_email: String,
}

impl RenewalRequest {
    /// First whitespace-delimited token of the address line.
    pub fn street_number(&self) -> &str {
        self.address_line.split_whitespace().next().unwrap_or("")
    }
}

/// Renewal record plus card details for the completion flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(flatten)]
    pub renewal: RenewalRequest,
    pub account: String,
    pub exp_month: String,
    pub exp_year: String,
    pub cv: String,
}

impl PaymentRequest {
    /// Expiry year as the portal's dropdown shows it (last two digits).
    pub fn exp_year_short(&self) -> &str {
        let year = self.exp_year.trim();
        match year.char_indices().rev().nth(1) {
            Some((idx, _)) => &year[idx..],
            None => year,
        }
    }
}

impl fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("renewal", &self.renewal)
            .field("account", &"<redacted>")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cv", &"<redacted>")
            .finish()
    }
}

/// What the portal is currently displaying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageState {
    FormPage,
    StreetNumberPage,
    CountySelectionPage,
    PricePage,
    SuccessfulPayment,
    Unknown,
}

/// One line of the portal's fee breakdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeeLine {
    County,
    License,
    Make,
    Year,
    ExpDate,
    Registration,
    OnlineFee,
    OrganDonorAmount,
    CountyWheelTax,
    CityWheelTax,
    MailFee,
    Subtotal,
    ProcessingFee,
    Total,
}

impl FeeLine {
    pub const ALL: [FeeLine; 14] = [
        FeeLine::County,
        FeeLine::License,
        FeeLine::Make,
        FeeLine::Year,
        FeeLine::ExpDate,
        FeeLine::Registration,
        FeeLine::OnlineFee,
        FeeLine::OrganDonorAmount,
        FeeLine::CountyWheelTax,
        FeeLine::CityWheelTax,
        FeeLine::MailFee,
        FeeLine::Subtotal,
        FeeLine::ProcessingFee,
        FeeLine::Total,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FeeLine::County => "County",
            FeeLine::License => "License",
            FeeLine::Make => "Make",
            FeeLine::Year => "Year",
            FeeLine::ExpDate => "Exp Date",
            FeeLine::Registration => "Registration",
            FeeLine::OnlineFee => "Online Fee",
            FeeLine::OrganDonorAmount => "Organ Donor Amount",
            FeeLine::CountyWheelTax => "County Wheel Tax",
            FeeLine::CityWheelTax => "City Wheel Tax",
            FeeLine::MailFee => "Mail Fee",
            FeeLine::Subtotal => "Subtotal",
            FeeLine::ProcessingFee => "Processing Fee",
            FeeLine::Total => "Total",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|line| line.label() == label)
    }

    /// Monetary lines carry a currency symbol on the page.
    pub fn is_monetary(self) -> bool {
        !matches!(
            self,
            FeeLine::County | FeeLine::License | FeeLine::Make | FeeLine::Year | FeeLine::ExpDate
        )
    }

    /// Lines whose absence means the page holds no fee breakdown at all.
    pub fn is_mandatory(self) -> bool {
        matches!(
            self,
            FeeLine::Registration
                | FeeLine::MailFee
                | FeeLine::Subtotal
                | FeeLine::ProcessingFee
                | FeeLine::Total
        )
    }

    pub fn selector(self) -> String {
        selectors::fee_field(self)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Fee breakdown keyed by [`FeeLine`], serialized in portal order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct FeeSummary {
    values: [String; 14],
}

impl FeeSummary {
    pub fn get(&self, line: FeeLine) -> &str {
        &self.values[line.index()]
    }

    pub fn set(&mut self, line: FeeLine, value: impl Into<String>) {
        self.values[line.index()] = value.into();
    }

    pub fn with(mut self, line: FeeLine, value: impl Into<String>) -> Self {
        self.set(line, value);
        self
    }

    pub fn total(&self) -> &str {
        self.get(FeeLine::Total)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeeLine, &str)> + '_ {
        FeeLine::ALL
            .into_iter()
            .map(move |line| (line, self.get(line)))
    }
}

impl From<BTreeMap<String, String>> for FeeSummary {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let mut summary = FeeSummary::default();
        for (label, value) in raw {
            if let Some(line) = FeeLine::from_label(&label) {
                summary.set(line, value);
            }
        }
        summary
    }
}

impl Serialize for FeeSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FeeLine::ALL.len()))?;
        for (line, value) in self.iter() {
            map.serialize_entry(line.label(), value)?;
        }
        map.end()
    }
}

/// Result of driving the payment frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Accepted { summary: FeeSummary },
    Rejected { reason: String },
}

/// Which use case a run serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    Quote,
    Complete,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Workflow::Quote => "quote",
            Workflow::Complete => "complete",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a run in the renewal state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowState {
    Start,
    CountySelected,
    StreetNumberResolved,
    FormSubmitted,
    FeeCollected(FeeSummary),
    PaymentSubmitted(FeeSummary),
    Completed(FeeSummary),
    Failed(RenewalError),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Start => "start",
            WorkflowState::CountySelected => "county_selected",
            WorkflowState::StreetNumberResolved => "street_number_resolved",
            WorkflowState::FormSubmitted => "form_submitted",
            WorkflowState::FeeCollected(_) => "fee_collected",
            WorkflowState::PaymentSubmitted(_) => "payment_submitted",
            WorkflowState::Completed(_) => "completed",
            WorkflowState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed(_) | WorkflowState::Failed(_))
    }
}
