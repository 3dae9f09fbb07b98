//! Run reports and the persistent run log.
//!
//! The core never formats for a terminal: progress flows through the
//! `RunObserver` seam and the finished report is a value object the
//! caller renders. One JSON line per run is appended to an
//! XDG-compliant log with a fallback chain.

use crate::stage::{StageReport, StageSpec, StageStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::warn;

/// Receives structured progress events during a run.
pub trait RunObserver {
    fn stage_started(&mut self, spec: &StageSpec);
    fn stage_finished(&mut self, report: &StageReport);
}

/// Observer that ignores everything. For unattended embedding and
/// tests.
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn stage_started(&mut self, _spec: &StageSpec) {}
    fn stage_finished(&mut self, _report: &StageReport) {}
}

/// Overall verdict of a maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "stage")]
pub enum RunVerdict {
    Success,
    CompletedWithWarnings,
    Aborted(String),
}

impl RunVerdict {
    /// Process exit code: 0 full success, 1 completed with unresolved
    /// warnings, 2 aborted before completing.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::CompletedWithWarnings => 1,
            Self::Aborted(_) => 2,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Success => "all stages completed".to_string(),
            Self::CompletedWithWarnings => "completed with warnings".to_string(),
            Self::Aborted(stage) => format!("aborted at stage '{}'", stage),
        }
    }
}

/// Record of one full maintenance run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stages: Vec<StageReport>,
    pub verdict: RunVerdict,
}

impl RunReport {
    /// Stages that belong in the warning summary.
    pub fn attention(&self) -> Vec<&StageReport> {
        self.stages
            .iter()
            .filter(|s| s.status.needs_attention())
            .collect()
    }

    pub fn verdict_for(aborted_at: Option<String>, stages: &[StageReport]) -> RunVerdict {
        if let Some(stage) = aborted_at {
            return RunVerdict::Aborted(stage);
        }
        if stages.iter().any(|s| s.status.needs_attention()) {
            RunVerdict::CompletedWithWarnings
        } else {
            RunVerdict::Success
        }
    }

    /// Append a compact one-line record of this run to the run log,
    /// falling back to stdout when no log path is writable.
    pub fn append_to_log(&self) -> Result<(), std::io::Error> {
        let record = LogRecord::from(self);
        let json = serde_json::to_string(&record)?;

        if let Some(path) = discover_log_path() {
            match write_line(&json, &path) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("could not write run log {}: {}", path, e),
            }
        }

        println!("{}", json);
        Ok(())
    }
}

/// One line of the runs.jsonl log.
#[derive(Debug, Serialize)]
struct LogRecord {
    ts: String,
    run_id: String,
    verdict: String,
    duration_ms: u64,
    stages: Vec<LogStage>,
}

#[derive(Debug, Serialize)]
struct LogStage {
    name: &'static str,
    status: StageStatus,
}

impl From<&RunReport> for LogRecord {
    fn from(report: &RunReport) -> Self {
        Self {
            ts: report.started_at.to_rfc3339(),
            run_id: report.run_id.clone(),
            verdict: report.verdict.describe(),
            duration_ms: report.duration_ms,
            stages: report
                .stages
                .iter()
                .map(|s| LogStage {
                    name: s.name,
                    status: s.status,
                })
                .collect(),
        }
    }
}

/// Discover the run log path.
///
/// Priority:
/// 1. $STEWARD_LOG_FILE (explicit override)
/// 2. $XDG_STATE_HOME/steward/runs.jsonl
/// 3. ~/.local/state/steward/runs.jsonl
fn discover_log_path() -> Option<String> {
    if let Ok(path) = std::env::var("STEWARD_LOG_FILE") {
        return Some(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Some(format!("{}/steward/runs.jsonl", xdg_state));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(format!("{}/.local/state/steward/runs.jsonl", home));
    }

    None
}

fn write_line(json: &str, path: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &'static str, status: StageStatus) -> StageReport {
        StageReport {
            name,
            status,
            detail: String::new(),
            commands: Vec::new(),
            remediation: None,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_verdict_success() {
        let stages = vec![
            stage("connectivity", StageStatus::Passed),
            stage("backup", StageStatus::Skipped),
        ];
        let verdict = RunReport::verdict_for(None, &stages);
        assert_eq!(verdict, RunVerdict::Success);
        assert_eq!(verdict.exit_code(), 0);
    }

    #[test]
    fn test_verdict_with_warnings() {
        let stages = vec![
            stage("connectivity", StageStatus::Passed),
            stage("js-packages", StageStatus::Warned),
        ];
        let verdict = RunReport::verdict_for(None, &stages);
        assert_eq!(verdict, RunVerdict::CompletedWithWarnings);
        assert_eq!(verdict.exit_code(), 1);
    }

    #[test]
    fn test_verdict_aborted_wins() {
        let stages = vec![stage("connectivity", StageStatus::Failed)];
        let verdict = RunReport::verdict_for(Some("connectivity".to_string()), &stages);
        assert_eq!(verdict, RunVerdict::Aborted("connectivity".to_string()));
        assert_eq!(verdict.exit_code(), 2);
    }

    #[test]
    fn test_log_record_shape() {
        let report = RunReport {
            run_id: "test-run".to_string(),
            started_at: Utc::now(),
            duration_ms: 1234,
            stages: vec![stage("connectivity", StageStatus::Passed)],
            verdict: RunVerdict::Success,
        };
        let record = LogRecord::from(&report);
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("\"run_id\":\"test-run\""));
        assert!(json.contains("\"connectivity\""));
        assert!(json.contains("\"passed\""));
    }
}
