//! Stage orchestration.
//!
//! Runs the static stage sequence in order: invoke the stage action,
//! route update-stage failures to the matching ecosystem classifier,
//! re-invoke the original action exactly once after a resolved
//! remediation, and apply the stage's failure policy to the final
//! outcome. Control flow is strictly sequential; later stages assume
//! the earlier ones ran.

use crate::command_exec::{CommandExec, CommandResult, CommandSpec};
use crate::config::StewardConfig;
use crate::confirm::{select_confirmer, Confirmer};
use crate::connectivity::{self, DEFAULT_PING_TEMPLATE};
use crate::disk::{self, DiskToolchain};
use crate::ecosystem::{self, Ecosystem, RemediationContext};
use crate::report::{RunObserver, RunReport};
use crate::runtime::{MiseActivator, RuntimeActivator};
use crate::stage::{FailurePolicy, StageKind, StageReport, StageSpec, StageStatus, STAGES};
use chrono::Utc;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// One cache/log cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupTask {
    pub label: String,
    pub command: String,
}

/// The literal invocation strings of every wrapped tool. External
/// collaborators live here, not in control flow: swapping a tool is a
/// template change.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ping: String,
    pub backup: String,
    pub os_update: String,
    pub js_update: String,
    pub ruby_update: String,
    pub python_outdated: String,
    pub python_upgrade: String,
    pub cleanup: Vec<CleanupTask>,
    pub storage_optimize: String,
    pub disk: DiskToolchain,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            ping: DEFAULT_PING_TEMPLATE.to_string(),
            backup: "rsync -a --delete {source}/ {target}/".to_string(),
            os_update: "pacman -Syu --noconfirm".to_string(),
            js_update: "npm update -g".to_string(),
            ruby_update: "gem update --no-document".to_string(),
            python_outdated: "python -m pip list --outdated --format=json --disable-pip-version-check"
                .to_string(),
            python_upgrade: "python -m pip install --upgrade {packages}".to_string(),
            cleanup: vec![
                CleanupTask {
                    label: "vacuum systemd journal".to_string(),
                    command: "journalctl --vacuum-time=14d".to_string(),
                },
                CleanupTask {
                    label: "trim package cache".to_string(),
                    command: "paccache -rk2".to_string(),
                },
            ],
            storage_optimize: "fstrim -av".to_string(),
            disk: DiskToolchain::default(),
        }
    }
}

/// One pass of an ecosystem's "update all" action.
struct UpdateAttempt {
    commands: Vec<CommandResult>,
    ok: bool,
    detail: String,
}

impl UpdateAttempt {
    /// The command whose output should be classified.
    fn failure(&self) -> Option<&CommandResult> {
        if self.ok {
            return None;
        }
        self.commands
            .iter()
            .rev()
            .find(|c| !c.ok())
            .or_else(|| self.commands.last())
    }
}

#[derive(Debug, Deserialize)]
struct PipOutdated {
    name: String,
}

fn parse_pip_outdated(json: &str) -> Result<Vec<String>, serde_json::Error> {
    let rows: Vec<PipOutdated> = serde_json::from_str(json)?;
    Ok(rows.into_iter().map(|r| r.name).collect())
}

/// The top-level driver.
pub struct Orchestrator {
    exec: CommandExec,
    config: StewardConfig,
    toolchain: Toolchain,
    confirmer: Box<dyn Confirmer>,
    activator: Box<dyn RuntimeActivator>,
    ctx: RemediationContext,
}

impl Orchestrator {
    pub fn new(config: StewardConfig) -> Self {
        let confirmer = select_confirmer(config.auto_repair);
        let activator = Box::new(MiseActivator {
            timeout_secs: config.timeouts.default_secs,
        });
        let ctx = RemediationContext::detect(config.timeouts.update_secs);
        let mut toolchain = Toolchain::default();
        toolchain.disk.timeout_secs = config.timeouts.disk_secs;

        Self {
            exec: CommandExec::new(),
            config,
            toolchain,
            confirmer,
            activator,
            ctx,
        }
    }

    /// Assemble from explicit parts. Lets embedders and tests swap the
    /// toolchain and capabilities.
    pub fn with_parts(
        config: StewardConfig,
        toolchain: Toolchain,
        confirmer: Box<dyn Confirmer>,
        activator: Box<dyn RuntimeActivator>,
        ctx: RemediationContext,
    ) -> Self {
        Self {
            exec: CommandExec::new(),
            config,
            toolchain,
            confirmer,
            activator,
            ctx,
        }
    }

    /// Run every stage in order and produce the run report.
    pub async fn run(&self, observer: &mut dyn RunObserver) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let t0 = Instant::now();
        info!("maintenance run {} started", run_id);

        let mut stages = Vec::with_capacity(STAGES.len());
        let mut aborted_at = None;

        for spec in STAGES {
            observer.stage_started(spec);
            let report = self.run_stage(spec).await;
            observer.stage_finished(&report);

            let abort =
                spec.policy == FailurePolicy::Abort && report.status == StageStatus::Failed;
            stages.push(report);
            if abort {
                error!("stage '{}' failed, aborting run", spec.name);
                aborted_at = Some(spec.name.to_string());
                break;
            }
        }

        let verdict = RunReport::verdict_for(aborted_at, &stages);
        info!("maintenance run {} finished: {}", run_id, verdict.describe());

        RunReport {
            run_id,
            started_at,
            duration_ms: t0.elapsed().as_millis() as u64,
            stages,
            verdict,
        }
    }

    /// Run one stage and apply its failure policy.
    async fn run_stage(&self, spec: &StageSpec) -> StageReport {
        let t0 = Instant::now();
        info!("stage '{}' started", spec.name);
        let mut report = self.stage_action(spec).await;

        if report.status == StageStatus::Failed {
            match spec.policy {
                FailurePolicy::Abort => {}
                FailurePolicy::RetryThenWarn => {
                    warn!("stage '{}' failed, retrying once", spec.name);
                    let mut second = self.stage_action(spec).await;
                    let mut commands = std::mem::take(&mut report.commands);
                    commands.append(&mut second.commands);
                    second.commands = commands;
                    if second.status != StageStatus::Passed {
                        second.status = StageStatus::Warned;
                    }
                    report = second;
                }
                FailurePolicy::WarnAndContinue => {
                    let terminal = report
                        .remediation
                        .as_ref()
                        .map(|r| r.terminal)
                        .unwrap_or(false);
                    // a terminal signature keeps the stage failed; it
                    // still does not stop the run under this policy
                    if !terminal {
                        report.status = StageStatus::Warned;
                    }
                }
            }
        }

        report.duration_ms = t0.elapsed().as_millis() as u64;
        info!(
            "stage '{}' finished: {} ({})",
            spec.name,
            report.status.as_str(),
            report.detail
        );
        report
    }

    /// The stage's raw action, before policy is applied.
    async fn stage_action(&self, spec: &StageSpec) -> StageReport {
        match spec.kind {
            StageKind::Connectivity => self.connectivity_stage(spec).await,
            StageKind::Backup => self.backup_stage(spec).await,
            StageKind::DiskCheck => self.disk_stage(spec).await,
            StageKind::Update(ecosystem) => self.update_stage(spec, ecosystem).await,
            StageKind::CacheCleanup => self.cleanup_stage(spec).await,
            StageKind::StorageOptimize => self.storage_stage(spec).await,
        }
    }

    async fn connectivity_stage(&self, spec: &StageSpec) -> StageReport {
        let cfg = &self.config.connectivity;
        let summary = connectivity::probe_hosts(
            &self.exec,
            &cfg.hosts,
            cfg.attempts,
            Duration::from_secs(cfg.delay_secs),
            cfg.ping_timeout_secs,
            cfg.policy,
            &self.toolchain.ping,
        )
        .await;

        let (status, detail) = if summary.pass {
            (
                StageStatus::Passed,
                format!(
                    "{} of {} hosts reachable ({} policy)",
                    summary.probes.iter().filter(|p| p.reachable).count(),
                    summary.probes.len(),
                    summary.policy.as_str()
                ),
            )
        } else {
            (
                StageStatus::Failed,
                format!("unreachable: {}", summary.unreachable_hosts().join(", ")),
            )
        };

        self.report(spec, status, detail, Vec::new(), None)
    }

    async fn backup_stage(&self, spec: &StageSpec) -> StageReport {
        let backup = &self.config.backup;
        let (Some(source), Some(target)) = (backup.source.as_ref(), backup.target.as_ref())
        else {
            return self.report(
                spec,
                StageStatus::Skipped,
                "backup source/target not configured".to_string(),
                Vec::new(),
                None,
            );
        };

        let command = self
            .toolchain
            .backup
            .replace("{source}", &source.display().to_string())
            .replace("{target}", &target.display().to_string());
        let result = self
            .exec
            .run(&CommandSpec::new(command, self.config.timeouts.default_secs))
            .await;

        let (status, detail) = if result.ok() {
            (
                StageStatus::Passed,
                format!("{} mirrored to {}", source.display(), target.display()),
            )
        } else {
            (
                StageStatus::Failed,
                format!("backup exited {} ({})", result.exit_code, result.status.as_str()),
            )
        };
        self.report(spec, status, detail, vec![result], None)
    }

    async fn disk_stage(&self, spec: &StageSpec) -> StageReport {
        let units = match disk::enumerate_units(&self.exec, &self.toolchain.disk).await {
            Ok(units) => units,
            Err(e) => {
                return self.report(
                    spec,
                    StageStatus::Failed,
                    format!("could not enumerate disk units: {}", e),
                    Vec::new(),
                    None,
                );
            }
        };
        let total = units.len();

        let disk_report = disk::verify_and_repair(
            &self.exec,
            &self.toolchain.disk,
            units,
            self.confirmer.as_ref(),
        )
        .await;

        let pass = disk_report.pass();
        let detail = if pass {
            format!("{} units healthy", total)
        } else {
            let problems: Vec<String> = disk_report
                .needs_attention()
                .iter()
                .map(|u| format!("{}: {}", u.unit.identifier, u.state.as_str()))
                .collect();
            format!("manual intervention needed - {}", problems.join("; "))
        };

        let commands = disk_report
            .units
            .into_iter()
            .flat_map(|u| std::iter::once(u.verify).chain(u.repair))
            .collect();

        let status = if pass {
            StageStatus::Passed
        } else {
            StageStatus::Failed
        };
        self.report(spec, status, detail, commands, None)
    }

    async fn update_stage(&self, spec: &StageSpec, ecosystem: Ecosystem) -> StageReport {
        let attempt = self.update_attempt(ecosystem).await;
        if attempt.ok {
            let detail = attempt.detail;
            return self.report(spec, StageStatus::Passed, detail, attempt.commands, None);
        }

        let failure = match attempt.failure() {
            Some(failure) => failure.clone(),
            None => {
                // nothing ran at all; treat as a plain failure
                let detail = attempt.detail.clone();
                return self.report(spec, StageStatus::Failed, detail, attempt.commands, None);
            }
        };

        if failure.is_fatal() {
            let detail = format!(
                "could not invoke the {} package manager ({})",
                ecosystem,
                failure.status.as_str()
            );
            return self.report(spec, StageStatus::Failed, detail, attempt.commands, None);
        }

        let outcome = ecosystem::classify_and_remediate(
            &self.exec,
            self.activator.as_ref(),
            &self.ctx,
            ecosystem,
            &failure,
        )
        .await;

        let mut commands = attempt.commands;
        commands.extend(outcome.commands_run.iter().cloned());

        if outcome.resolved && !outcome.terminal {
            info!("retrying {} update after remediation", ecosystem);
            let second = self.update_attempt(ecosystem).await;
            let recovered = second.ok;
            commands.extend(second.commands);

            let (status, detail) = if recovered {
                (
                    StageStatus::Passed,
                    format!(
                        "recovered after remediation ({})",
                        outcome.signature_id.unwrap_or("unknown")
                    ),
                )
            } else {
                (
                    StageStatus::Failed,
                    format!(
                        "failed again after remediation ({})",
                        outcome.signature_id.unwrap_or("unknown")
                    ),
                )
            };
            return self.report(spec, status, detail, commands, Some(outcome));
        }

        let detail = match (outcome.signature_id, outcome.terminal) {
            (Some(id), true) => format!("'{}' requires operator attention", id),
            (Some(id), false) => format!("remediation for '{}' did not resolve the failure", id),
            (None, _) => "unrecognized failure; raw output retained".to_string(),
        };
        self.report(spec, StageStatus::Failed, detail, commands, Some(outcome))
    }

    /// One pass of the ecosystem's update action.
    async fn update_attempt(&self, ecosystem: Ecosystem) -> UpdateAttempt {
        let timeout = self.config.timeouts.update_secs;
        match ecosystem {
            Ecosystem::Os => {
                self.simple_attempt(&self.toolchain.os_update, timeout, "system packages updated")
                    .await
            }
            Ecosystem::Js => {
                self.simple_attempt(&self.toolchain.js_update, timeout, "global npm packages updated")
                    .await
            }
            Ecosystem::Ruby => {
                self.simple_attempt(&self.toolchain.ruby_update, timeout, "gems updated")
                    .await
            }
            Ecosystem::Python => self.python_attempt(timeout).await,
        }
    }

    async fn simple_attempt(
        &self,
        command: &str,
        timeout_secs: u64,
        success_detail: &str,
    ) -> UpdateAttempt {
        let result = self
            .exec
            .run(&CommandSpec::new(command.to_string(), timeout_secs))
            .await;
        let ok = result.ok();
        UpdateAttempt {
            detail: if ok {
                success_detail.to_string()
            } else {
                format!("'{}' exited {}", result.command, result.exit_code)
            },
            commands: vec![result],
            ok,
        }
    }

    /// pip has no native "upgrade everything": list the outdated set,
    /// then upgrade it in one invocation.
    async fn python_attempt(&self, timeout_secs: u64) -> UpdateAttempt {
        let list = self
            .exec
            .run(&CommandSpec::new(
                self.toolchain.python_outdated.clone(),
                timeout_secs,
            ))
            .await;
        if !list.ok() {
            return UpdateAttempt {
                detail: format!("'{}' exited {}", list.command, list.exit_code),
                commands: vec![list],
                ok: false,
            };
        }

        let outdated = match parse_pip_outdated(&list.output) {
            Ok(outdated) => outdated,
            Err(e) => {
                warn!("unparseable pip listing: {}", e);
                return UpdateAttempt {
                    detail: format!("unparseable pip listing: {}", e),
                    commands: vec![list],
                    ok: false,
                };
            }
        };

        if outdated.is_empty() {
            return UpdateAttempt {
                detail: "all python packages current".to_string(),
                commands: vec![list],
                ok: true,
            };
        }

        let upgrade = self
            .toolchain
            .python_upgrade
            .replace("{packages}", &outdated.join(" "));
        let result = self
            .exec
            .run(&CommandSpec::new(upgrade, timeout_secs))
            .await;
        let ok = result.ok();
        UpdateAttempt {
            detail: if ok {
                format!("{} python packages upgraded", outdated.len())
            } else {
                format!("'{}' exited {}", result.command, result.exit_code)
            },
            commands: vec![list, result],
            ok,
        }
    }

    async fn cleanup_stage(&self, spec: &StageSpec) -> StageReport {
        let mut commands = Vec::with_capacity(self.toolchain.cleanup.len());
        let mut failed = Vec::new();

        for task in &self.toolchain.cleanup {
            info!("cleanup: {}", task.label);
            let result = self
                .exec
                .run(&CommandSpec::new(
                    task.command.clone(),
                    self.config.timeouts.default_secs,
                ))
                .await;
            if !result.ok() {
                warn!("cleanup task '{}' failed", task.label);
                failed.push(task.label.clone());
            }
            commands.push(result);
        }

        let (status, detail) = if failed.is_empty() {
            (
                StageStatus::Passed,
                format!("{} cleanup tasks completed", commands.len()),
            )
        } else {
            (StageStatus::Failed, format!("failed: {}", failed.join(", ")))
        };
        self.report(spec, status, detail, commands, None)
    }

    async fn storage_stage(&self, spec: &StageSpec) -> StageReport {
        let result = self
            .exec
            .run(&CommandSpec::new(
                self.toolchain.storage_optimize.clone(),
                self.config.timeouts.default_secs,
            ))
            .await;

        let (status, detail) = if result.ok() {
            (StageStatus::Passed, "storage optimized".to_string())
        } else {
            (
                StageStatus::Failed,
                format!("'{}' exited {}", result.command, result.exit_code),
            )
        };
        self.report(spec, status, detail, vec![result], None)
    }

    fn report(
        &self,
        spec: &StageSpec,
        status: StageStatus,
        detail: String,
        commands: Vec<CommandResult>,
        remediation: Option<ecosystem::RemediationOutcome>,
    ) -> StageReport {
        StageReport {
            name: spec.name,
            status,
            detail,
            commands,
            remediation,
            duration_ms: 0, // filled by run_stage
        }
    }
}
