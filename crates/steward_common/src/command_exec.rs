//! Single command execution layer.
//!
//! Takes a command line, executes it on the real system, and captures
//! the real exit code, combined output, and duration. This layer does
//! NOT reinterpret errors: a non-zero exit is returned exactly as
//! received, never raised. Only a command that cannot be invoked at
//! all is fatal to the caller.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Maximum output length to capture (prevent memory issues)
const MAX_OUTPUT_BYTES: usize = 64 * 1024; // 64KB

/// Default timeout for commands
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// One external command invocation: the shell command line and its
/// time budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout_secs,
        }
    }
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Command ran successfully (exit code 0)
    Success,
    /// Command ran but returned non-zero exit code
    NonZeroExit,
    /// Command not found on system
    CommandNotFound,
    /// Permission denied
    PermissionDenied,
    /// Command exceeded its time budget and was killed
    Timeout,
    /// Other OS error
    OsError,
}

impl ExecutionStatus {
    /// Human-readable description
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::CommandNotFound => "command not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timeout",
            Self::OsError => "OS error",
        }
    }

    /// True when the tool could not be invoked at all. A timed-out or
    /// failing tool still produced output worth classifying; a missing
    /// one did not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CommandNotFound | Self::OsError)
    }
}

/// Result of a command execution. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// The command line that was executed
    pub command: String,
    /// Exit code (0 = success, -1 when killed or unknown)
    pub exit_code: i32,
    /// Combined stdout and stderr, in the order produced
    pub output: String,
    /// Whether output was truncated
    pub truncated: bool,
    /// Execution duration
    pub duration_ms: u64,
    /// Execution status
    pub status: ExecutionStatus,
}

impl CommandResult {
    pub fn ok(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }
}

/// Command executor. Commands run through `sh -c` so pipelines and
/// redirections in stage definitions behave as they would
/// interactively.
#[derive(Debug, Default)]
pub struct CommandExec;

impl CommandExec {
    pub fn new() -> Self {
        Self
    }

    /// Execute a command, capturing combined output and exit status.
    ///
    /// A timed-out command is killed and reported as a failure; it
    /// flows into the same classification path as an explicit error.
    pub async fn run(&self, spec: &CommandSpec) -> CommandResult {
        let start = Instant::now();
        debug!("executing: {}", spec.command);

        // stderr is folded into stdout at the shell level so
        // classification sees the stream an interactive run would show
        let wrapped = format!("{{ {}\n}} 2>&1", spec.command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&wrapped)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("could not spawn '{}': {}", spec.command, e);
                let status = match e.kind() {
                    std::io::ErrorKind::NotFound => ExecutionStatus::CommandNotFound,
                    std::io::ErrorKind::PermissionDenied => ExecutionStatus::PermissionDenied,
                    _ => ExecutionStatus::OsError,
                };
                return CommandResult {
                    command: spec.command.clone(),
                    exit_code: -1,
                    output: format!("OS error: {}", e),
                    truncated: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    status,
                };
            }
        };

        match timeout(
            Duration::from_secs(spec.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let (mut text, mut truncated) = truncate_output(&output.stdout);
                // the shell itself may still write to stderr (e.g. a
                // syntax error before the redirect takes effect)
                if !output.stderr.is_empty() {
                    let (stderr_text, stderr_truncated) = truncate_output(&output.stderr);
                    text.push_str(&stderr_text);
                    truncated |= stderr_truncated;
                }
                let status = derive_status(exit_code, &text);
                if status != ExecutionStatus::Success {
                    debug!("'{}' exited {} ({})", spec.command, exit_code, status.as_str());
                }
                CommandResult {
                    command: spec.command.clone(),
                    exit_code,
                    output: text,
                    truncated,
                    duration_ms: start.elapsed().as_millis() as u64,
                    status,
                }
            }
            Ok(Err(e)) => CommandResult {
                command: spec.command.clone(),
                exit_code: -1,
                output: format!("OS error: {}", e),
                truncated: false,
                duration_ms: start.elapsed().as_millis() as u64,
                status: ExecutionStatus::OsError,
            },
            Err(_) => {
                // dropping the future killed the child (kill_on_drop)
                warn!(
                    "'{}' timed out after {}s and was killed",
                    spec.command, spec.timeout_secs
                );
                CommandResult {
                    command: spec.command.clone(),
                    exit_code: -1,
                    output: format!("timed out after {}s", spec.timeout_secs),
                    truncated: false,
                    duration_ms: spec.timeout_secs * 1000,
                    status: ExecutionStatus::Timeout,
                }
            }
        }
    }
}

/// Derive a status from the exit code and what the shell reported.
/// Exit 127 is how `sh -c` signals an executable it could not locate.
fn derive_status(exit_code: i32, output: &str) -> ExecutionStatus {
    if exit_code == 0 {
        ExecutionStatus::Success
    } else if exit_code == 127 && output.contains("not found") {
        ExecutionStatus::CommandNotFound
    } else {
        ExecutionStatus::NonZeroExit
    }
}

/// Truncate output to max bytes, converting to string
fn truncate_output(bytes: &[u8]) -> (String, bool) {
    let truncated = bytes.len() > MAX_OUTPUT_BYTES;
    let slice = if truncated {
        &bytes[..MAX_OUTPUT_BYTES]
    } else {
        bytes
    };

    let output = String::from_utf8_lossy(slice).to_string();
    (output, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(command: &str) -> CommandSpec {
        CommandSpec::new(command, 30)
    }

    #[tokio::test]
    async fn test_successful_command() {
        let exec = CommandExec::new();
        let result = exec.run(&spec("echo steward-ok")).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("steward-ok"));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_data_not_error() {
        let exec = CommandExec::new();
        let result = exec.run(&spec("exit 7")).await;

        assert_eq!(result.status, ExecutionStatus::NonZeroExit);
        assert_eq!(result.exit_code, 7);
        assert!(!result.is_fatal());
    }

    #[tokio::test]
    async fn test_stderr_is_merged_into_output() {
        let exec = CommandExec::new();
        let result = exec.run(&spec("echo visible >&2; exit 1")).await;

        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("visible"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_fatal() {
        let exec = CommandExec::new();
        let result = exec.run(&spec("steward-no-such-tool-xyz")).await;

        assert_eq!(result.status, ExecutionStatus::CommandNotFound);
        assert_eq!(result.exit_code, 127);
        assert!(result.is_fatal());
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reports_failure() {
        let exec = CommandExec::new();
        let result = exec.run(&CommandSpec::new("sleep 5", 1)).await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(!result.is_fatal());
        assert!(result.output.contains("timed out"));
    }

    #[tokio::test]
    async fn test_output_truncation() {
        let exec = CommandExec::new();
        // ~100KB of output, well past the 64KB cap
        let result = exec
            .run(&spec("head -c 100000 /dev/zero | tr '\\0' 'x'"))
            .await;

        assert!(result.truncated);
        assert!(result.output.len() <= MAX_OUTPUT_BYTES);
    }

    #[test]
    fn test_derive_status() {
        assert_eq!(derive_status(0, ""), ExecutionStatus::Success);
        assert_eq!(derive_status(1, "boom"), ExecutionStatus::NonZeroExit);
        assert_eq!(
            derive_status(127, "sh: line 1: pacmann: command not found"),
            ExecutionStatus::CommandNotFound
        );
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(ExecutionStatus::Timeout.as_str(), "timeout");
        assert_eq!(ExecutionStatus::Success.as_str(), "success");
    }
}
