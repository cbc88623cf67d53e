// src/engine/mod.rs

//! Rule engine.
//!
//! - [`registry`] tracks, per rule, the cancellation token of the newest
//!   trigger and the admission slot that keeps runs of one rule from
//!   overlapping.
//! - [`scheduler`] drives a single trigger through debounce, admission,
//!   execution and chaining.
//! - [`chain`] fans a successful run out to its `trig_async` / `trig`
//!   targets.

/// Canonical rule name type used throughout the engine.
pub type RuleName = String;

/// Outcome of an admitted run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Superseded by a newer trigger, or stopped by shutdown.
    Canceled,
}

pub mod chain;
pub mod registry;
pub mod scheduler;

pub use chain::ChainMode;
pub use registry::{RunStateRegistry, RunTicket};
pub use scheduler::RuleScheduler;
