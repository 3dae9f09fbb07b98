//! Disk verify/repair loop.
//!
//! Every enumerated unit is verified; repair is only ever attempted on
//! a unit whose verify failed, gated by the confirmation capability,
//! and bounded by a two-rung escalation ladder (repair, one retry).
//! Disks are processed before their own partitions because repairing a
//! disk can invalidate in-flight partition state.

pub mod lsblk;

use crate::command_exec::{CommandExec, CommandResult, CommandSpec};
use crate::confirm::Confirmer;
use crate::error::StewardError;
use crate::escalation::{self, EscalationStep};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Disk or partition, as reported by the disk utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Disk,
    Partition,
}

/// One unit to verify. Discovered fresh on every run; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUnit {
    pub identifier: String,
    pub kind: UnitKind,
    /// Owning disk for a partition (lookup only, not ownership)
    pub parent: Option<String>,
}

/// Terminal state of one unit after the verify/repair cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Verified,
    RepairSucceeded,
    RepairFailed,
    /// Verify failed and repair was declined or not permitted
    RepairSkipped,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::RepairSucceeded => "repair succeeded",
            Self::RepairFailed => "repair failed",
            Self::RepairSkipped => "repair skipped",
        }
    }

    pub fn healthy(&self) -> bool {
        matches!(self, Self::Verified | Self::RepairSucceeded)
    }
}

/// Full record of one unit's cycle.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: DiskUnit,
    pub state: UnitState,
    pub verify: CommandResult,
    pub repair: Vec<CommandResult>,
}

/// Aggregate outcome for the stage.
#[derive(Debug, Clone, Serialize)]
pub struct DiskReport {
    pub units: Vec<UnitReport>,
}

impl DiskReport {
    /// Overall success: every unit reached Verified or RepairSucceeded.
    pub fn pass(&self) -> bool {
        self.units.iter().all(|u| u.state.healthy())
    }

    /// Units needing manual intervention.
    pub fn needs_attention(&self) -> Vec<&UnitReport> {
        self.units.iter().filter(|u| !u.state.healthy()).collect()
    }
}

/// The disk utility's command lines. `{dev}` is substituted with the
/// unit identifier. Only exit-code-zero semantics are assumed, so a
/// different utility is a template change, not a code change.
#[derive(Debug, Clone)]
pub struct DiskToolchain {
    pub list: String,
    pub verify: String,
    pub repair: String,
    pub timeout_secs: u64,
}

impl Default for DiskToolchain {
    fn default() -> Self {
        Self {
            list: "lsblk --json --output NAME,TYPE".to_string(),
            verify: "fsck -n {dev}".to_string(),
            repair: "fsck -y {dev}".to_string(),
            timeout_secs: 1800,
        }
    }
}

impl DiskToolchain {
    fn list_spec(&self) -> CommandSpec {
        CommandSpec::new(self.list.clone(), self.timeout_secs)
    }

    fn verify_spec(&self, dev: &str) -> CommandSpec {
        CommandSpec::new(self.verify.replace("{dev}", dev), self.timeout_secs)
    }

    fn repair_spec(&self, dev: &str) -> CommandSpec {
        CommandSpec::new(self.repair.replace("{dev}", dev), self.timeout_secs)
    }
}

/// Enumerate disks and partitions, disks first.
pub async fn enumerate_units(
    exec: &CommandExec,
    toolchain: &DiskToolchain,
) -> Result<Vec<DiskUnit>, StewardError> {
    let result = exec.run(&toolchain.list_spec()).await;
    if !result.ok() {
        return Err(StewardError::Execution {
            command: result.command,
            status: result.status.as_str(),
        });
    }
    let units = lsblk::parse_units(&result.output)?;
    info!("enumerated {} disk units", units.len());
    Ok(units)
}

/// Run the verify/repair cycle over `units`, in the given order.
pub async fn verify_and_repair(
    exec: &CommandExec,
    toolchain: &DiskToolchain,
    units: Vec<DiskUnit>,
    confirmer: &dyn Confirmer,
) -> DiskReport {
    let mut reports = Vec::with_capacity(units.len());

    for unit in units {
        debug!("verifying {}", unit.identifier);
        let verify = exec.run(&toolchain.verify_spec(&unit.identifier)).await;

        if verify.ok() {
            reports.push(UnitReport {
                unit,
                state: UnitState::Verified,
                verify,
                repair: Vec::new(),
            });
            continue;
        }

        warn!(
            "verify failed for {} (exit {})",
            unit.identifier, verify.exit_code
        );

        let question = format!("Attempt repair of {}?", unit.identifier);
        if !confirmer.confirm(&question) {
            warn!("repair of {} skipped", unit.identifier);
            reports.push(UnitReport {
                unit,
                state: UnitState::RepairSkipped,
                verify,
                repair: Vec::new(),
            });
            continue;
        }

        // repair, retried exactly once, then terminal
        let ladder = [
            EscalationStep::new(
                format!("repair {}", unit.identifier),
                toolchain.repair_spec(&unit.identifier),
            ),
            EscalationStep::new(
                format!("repair {} (second attempt)", unit.identifier),
                toolchain.repair_spec(&unit.identifier),
            ),
        ];
        let climb = escalation::climb(exec, &ladder).await;

        let state = if climb.succeeded() {
            info!("repaired {}", unit.identifier);
            UnitState::RepairSucceeded
        } else {
            warn!("{} needs manual intervention", unit.identifier);
            UnitState::RepairFailed
        };
        reports.push(UnitReport {
            unit,
            state,
            verify,
            repair: climb.results,
        });
    }

    DiskReport { units: reports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AutoConfirmer;

    fn toolchain(verify: &str, repair: &str) -> DiskToolchain {
        DiskToolchain {
            list: "true".to_string(),
            verify: verify.to_string(),
            repair: repair.to_string(),
            timeout_secs: 30,
        }
    }

    fn unit(id: &str) -> DiskUnit {
        DiskUnit {
            identifier: id.to_string(),
            kind: UnitKind::Disk,
            parent: None,
        }
    }

    #[tokio::test]
    async fn test_healthy_unit_is_never_repaired() {
        let exec = CommandExec::new();
        let report = verify_and_repair(
            &exec,
            &toolchain("true", "exit 99"),
            vec![unit("/dev/sda")],
            &AutoConfirmer { answer: true },
        )
        .await;

        assert_eq!(report.units[0].state, UnitState::Verified);
        assert!(report.units[0].repair.is_empty());
        assert!(report.pass());
    }

    #[tokio::test]
    async fn test_failed_verify_triggers_repair() {
        let exec = CommandExec::new();
        let report = verify_and_repair(
            &exec,
            &toolchain("false", "true"),
            vec![unit("/dev/sda")],
            &AutoConfirmer { answer: true },
        )
        .await;

        assert_eq!(report.units[0].state, UnitState::RepairSucceeded);
        assert_eq!(report.units[0].repair.len(), 1);
        assert!(report.pass());
    }

    #[tokio::test]
    async fn test_repair_is_retried_exactly_once() {
        let exec = CommandExec::new();
        let report = verify_and_repair(
            &exec,
            &toolchain("false", "false"),
            vec![unit("/dev/sda")],
            &AutoConfirmer { answer: true },
        )
        .await;

        assert_eq!(report.units[0].state, UnitState::RepairFailed);
        assert_eq!(report.units[0].repair.len(), 2);
        assert!(!report.pass());
        assert_eq!(report.needs_attention().len(), 1);
    }

    #[tokio::test]
    async fn test_declined_repair_is_skipped_with_warning() {
        let exec = CommandExec::new();
        let report = verify_and_repair(
            &exec,
            &toolchain("false", "true"),
            vec![unit("/dev/sda")],
            &AutoConfirmer { answer: false },
        )
        .await;

        assert_eq!(report.units[0].state, UnitState::RepairSkipped);
        assert!(report.units[0].repair.is_empty());
        assert!(!report.pass());
    }

    #[tokio::test]
    async fn test_failed_unit_does_not_stop_the_loop() {
        let exec = CommandExec::new();
        let report = verify_and_repair(
            &exec,
            // only sda fails its verify
            &toolchain("test {dev} != /dev/sda", "false"),
            vec![unit("/dev/sda"), unit("/dev/sdb")],
            &AutoConfirmer { answer: true },
        )
        .await;

        assert_eq!(report.units[0].state, UnitState::RepairFailed);
        assert_eq!(report.units[1].state, UnitState::Verified);
    }
}
