//! Tolerant interaction primitives for the renewal portal.
//!
//! Built on top of the element session adapter:
//! - best-effort field writes that never abort on a single missing input
//! - option matching against dynamic `<select>` labels
//! - alert capture with a bounded wait
//! - settle delays driven by a shared [`Timings`] budget

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
