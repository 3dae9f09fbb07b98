//! Stage definitions.
//!
//! `STAGES` is the fixed, ordered sequence the orchestrator runs; it
//! is the single source of truth for what maintenance means. Stages
//! are defined once and never mutated.

use crate::command_exec::CommandResult;
use crate::ecosystem::{Ecosystem, RemediationOutcome};
use serde::Serialize;

/// What the orchestrator does when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run immediately
    Abort,
    /// Record a warning and keep going
    WarnAndContinue,
    /// Re-run the stage action once, then warn
    RetryThenWarn,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::WarnAndContinue => "warn and continue",
            Self::RetryThenWarn => "retry, then warn",
        }
    }
}

/// The maintenance action a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Connectivity,
    Backup,
    DiskCheck,
    Update(Ecosystem),
    CacheCleanup,
    StorageOptimize,
}

/// One entry in the maintenance sequence.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub name: &'static str,
    pub kind: StageKind,
    pub policy: FailurePolicy,
}

/// The maintenance sequence, in execution order. Connectivity aborts
/// the run when it fails because every later stage needs the network;
/// disk problems and failed updates are warnings for the final report.
pub const STAGES: &[StageSpec] = &[
    StageSpec {
        name: "connectivity",
        kind: StageKind::Connectivity,
        policy: FailurePolicy::Abort,
    },
    StageSpec {
        name: "backup",
        kind: StageKind::Backup,
        policy: FailurePolicy::RetryThenWarn,
    },
    StageSpec {
        name: "disk-health",
        kind: StageKind::DiskCheck,
        policy: FailurePolicy::WarnAndContinue,
    },
    StageSpec {
        name: "os-packages",
        kind: StageKind::Update(Ecosystem::Os),
        policy: FailurePolicy::WarnAndContinue,
    },
    StageSpec {
        name: "js-packages",
        kind: StageKind::Update(Ecosystem::Js),
        policy: FailurePolicy::WarnAndContinue,
    },
    StageSpec {
        name: "ruby-gems",
        kind: StageKind::Update(Ecosystem::Ruby),
        policy: FailurePolicy::WarnAndContinue,
    },
    StageSpec {
        name: "python-packages",
        kind: StageKind::Update(Ecosystem::Python),
        policy: FailurePolicy::WarnAndContinue,
    },
    StageSpec {
        name: "cache-cleanup",
        kind: StageKind::CacheCleanup,
        policy: FailurePolicy::WarnAndContinue,
    },
    StageSpec {
        name: "storage-optimize",
        kind: StageKind::StorageOptimize,
        policy: FailurePolicy::WarnAndContinue,
    },
];

/// Final status of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Passed,
    Warned,
    Failed,
    /// Not applicable on this host (e.g. backup unconfigured)
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Warned => "warned",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// True when the stage needs a place in the warning summary.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Warned | Self::Failed)
    }
}

/// Everything recorded about one stage's execution.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    pub status: StageStatus,
    pub detail: String,
    pub commands: Vec<CommandResult>,
    pub remediation: Option<RemediationOutcome>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequence_starts_with_connectivity_abort() {
        assert_eq!(STAGES[0].name, "connectivity");
        assert_eq!(STAGES[0].policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_stage_names_are_unique() {
        let names: HashSet<&str> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), STAGES.len());
    }

    #[test]
    fn test_every_ecosystem_has_an_update_stage() {
        for ecosystem in Ecosystem::ALL {
            assert!(
                STAGES
                    .iter()
                    .any(|s| s.kind == StageKind::Update(ecosystem)),
                "no update stage for {}",
                ecosystem
            );
        }
    }

    #[test]
    fn test_only_connectivity_aborts() {
        let aborting: Vec<&str> = STAGES
            .iter()
            .filter(|s| s.policy == FailurePolicy::Abort)
            .map(|s| s.name)
            .collect();
        assert_eq!(aborting, vec!["connectivity"]);
    }
}
