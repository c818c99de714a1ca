//! Protected structural regions
//!
//! Navigation, hero, footer and contact-form regions are snapshotted from the
//! markup before optimization and checked (and if necessary restored) in the
//! regenerated markup afterwards.

pub mod analyzer;
pub mod patterns;
pub mod repair;

pub use analyzer::identify;
pub use patterns::selectors_for;
pub use repair::{missing_sections, reconcile, repair, verify, Reconciliation, Verification};
