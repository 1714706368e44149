//! Vehicle registration renewal automation.
//!
//! Drives the renewal portal through a browser session: finds the plate, resolves the
//! county, fills the contact form, scrapes the fee breakdown and optionally pays.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod metrics;
pub mod renewal;
pub mod server;
pub mod session;

pub use config::Config;
pub use errors::{FaultClass, RenewalError};
pub use renewal::{FeeSummary, PaymentRequest, RenewalContext, RenewalRequest};
pub use session::{with_session, SessionPool};
