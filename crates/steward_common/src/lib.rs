//! Steward Common - the host-maintenance core.
//!
//! Runs an ordered sequence of upkeep stages (connectivity check,
//! backup, disk verify/repair, package updates across independent
//! ecosystems, cache cleanup, storage optimization), classifies stage
//! failures from captured tool output, and applies bounded
//! remediation before retrying or surfacing the failure.

pub mod command_exec;
pub mod config;
pub mod confirm;
pub mod connectivity;
pub mod disk;
pub mod ecosystem;
pub mod error;
pub mod escalation;
pub mod orchestrator;
pub mod report;
pub mod runtime;
pub mod stage;

pub use command_exec::{CommandExec, CommandResult, CommandSpec, ExecutionStatus};
pub use config::StewardConfig;
pub use error::StewardError;
pub use orchestrator::Orchestrator;
pub use report::{NullObserver, RunObserver, RunReport, RunVerdict};
