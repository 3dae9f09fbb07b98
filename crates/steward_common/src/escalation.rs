//! Bounded escalation ladders.
//!
//! An ordered list of labelled command rungs, tried in sequence until
//! one succeeds or the list is exhausted. Replaces hand-nested
//! try/retry conditionals; the ladder length is the retry bound.

use crate::command_exec::{CommandExec, CommandResult, CommandSpec};
use serde::Serialize;
use tracing::{info, warn};

/// One rung of a ladder.
#[derive(Debug, Clone)]
pub struct EscalationStep {
    pub label: String,
    pub spec: CommandSpec,
}

impl EscalationStep {
    pub fn new(label: impl Into<String>, spec: CommandSpec) -> Self {
        Self {
            label: label.into(),
            spec,
        }
    }
}

/// What happened while climbing a ladder.
#[derive(Debug, Clone, Serialize)]
pub struct ClimbReport {
    pub results: Vec<CommandResult>,
    /// Index of the rung that succeeded, if any
    pub succeeded_at: Option<usize>,
}

impl ClimbReport {
    pub fn succeeded(&self) -> bool {
        self.succeeded_at.is_some()
    }
}

/// Try each rung in order; stop at the first success. A rung whose
/// tool cannot be invoked at all ends the climb early, since every
/// later rung would hit the same wall.
pub async fn climb(exec: &CommandExec, steps: &[EscalationStep]) -> ClimbReport {
    let mut results = Vec::with_capacity(steps.len());

    for (idx, step) in steps.iter().enumerate() {
        info!("escalation: {}", step.label);
        let result = exec.run(&step.spec).await;
        let ok = result.ok();
        let fatal = result.is_fatal();
        results.push(result);

        if ok {
            return ClimbReport {
                results,
                succeeded_at: Some(idx),
            };
        }
        warn!("escalation rung '{}' failed", step.label);
        if fatal {
            break;
        }
    }

    ClimbReport {
        results,
        succeeded_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_exec::CommandExec;

    fn step(label: &str, command: &str) -> EscalationStep {
        EscalationStep::new(label, CommandSpec::new(command, 30))
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let exec = CommandExec::new();
        let steps = [step("first", "true"), step("second", "true")];

        let report = climb(&exec, &steps).await;
        assert_eq!(report.succeeded_at, Some(0));
        assert_eq!(report.results.len(), 1);
    }

    #[tokio::test]
    async fn test_escalates_past_a_failure() {
        let exec = CommandExec::new();
        let steps = [step("first", "false"), step("second", "true")];

        let report = climb(&exec, &steps).await;
        assert_eq!(report.succeeded_at, Some(1));
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_ladder() {
        let exec = CommandExec::new();
        let steps = [step("first", "false"), step("second", "exit 3")];

        let report = climb(&exec, &steps).await;
        assert!(!report.succeeded());
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_tool_ends_climb_early() {
        let exec = CommandExec::new();
        let steps = [
            step("first", "steward-no-such-tool-xyz"),
            step("second", "true"),
        ];

        let report = climb(&exec, &steps).await;
        assert!(!report.succeeded());
        assert_eq!(report.results.len(), 1);
    }
}
