//! Renewal portal automation: page classification, form filling, county selection,
//! fee extraction, payment and the workflow that sequences them.

pub mod county;
pub mod fees;
pub mod filler;
pub mod inspector;
pub mod model;
pub mod payment;
pub mod selectors;
pub mod workflow;

pub use model::{
    FeeLine, FeeSummary, PageState, PaymentOutcome, PaymentRequest, RenewalRequest, Workflow,
    WorkflowState,
};
pub use workflow::{complete, quote, RenewalContext, RenewalRun};
