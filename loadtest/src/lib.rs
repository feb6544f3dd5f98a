//! authswarm Library
//!
//! Virtual-user load generator for register/login/logout authentication APIs.
//! This module exports the components for use in integration tests and
//! external tooling.

pub mod api;
pub mod collector;
pub mod config;
pub mod outcome;
pub mod pacing;
pub mod runner;
pub mod session;
pub mod task;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use api::{AuthApi, HttpAuthApi};
pub use collector::{OutcomeCollector, RunSummary, StatsCollector};
pub use config::Config;
pub use outcome::{FailureKind, TaskOutcome};
pub use runner::{SwarmReport, SwarmRunner};
pub use session::{AuthToken, SessionIdentity, VirtualUserSession};
pub use task::{TaskKind, TaskWeights};
