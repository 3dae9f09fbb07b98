//! Failure classification and remediation, one signature table per
//! package ecosystem.
//!
//! Classification is pure text matching: the ecosystem's signatures
//! are evaluated in declaration order and the first match wins, so the
//! outcome is deterministic for a given failure text. Remediation is
//! data, not branching code — each signature carries an ordered list
//! of declarative steps interpreted by one resolver, and adding a
//! signature never touches control flow.

pub mod manifest;

mod js;
mod os;
mod python;
mod ruby;

use crate::command_exec::{CommandExec, CommandResult, CommandSpec};
use crate::error::StewardError;
use crate::runtime::{RuntimeActivator, RuntimeKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// One independently-managed package domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Os,
    Js,
    Ruby,
    Python,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 4] = [Self::Os, Self::Js, Self::Ruby, Self::Python];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Os => "os",
            Self::Js => "js",
            Self::Ruby => "ruby",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text matcher for one signature. Regex patterns may capture `pkg`
/// (the offending package) and `req` (a version requirement).
#[derive(Debug)]
pub enum Pattern {
    Substring(&'static str),
    Regex(Regex),
}

/// Captures pulled out of a successful match.
#[derive(Debug, Default, Clone)]
struct MatchCaptures {
    package: Option<String>,
    requirement: Option<String>,
}

impl Pattern {
    fn apply(&self, text: &str) -> Option<MatchCaptures> {
        match self {
            Pattern::Substring(needle) => text.contains(needle).then(MatchCaptures::default),
            Pattern::Regex(re) => re.captures(text).map(|caps| MatchCaptures {
                package: caps.name("pkg").map(|m| m.as_str().to_string()),
                requirement: caps.name("req").map(|m| m.as_str().to_string()),
            }),
        }
    }
}

/// A declarative remediation step, resolved to concrete commands at
/// apply time. `{pkg}` in a `Run` command is substituted with the
/// package captured from the failure text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemedialStep {
    /// Run a fixed command line.
    Run {
        label: &'static str,
        command: &'static str,
    },
    /// Give the invoking user ownership of an ecosystem cache dir.
    TakeOwnership { dir: CacheDir },
    /// Drop the captured package from the ecosystem manifest (when one
    /// exists) and reinstall from it.
    ReinstallFromManifest,
    /// Install and activate a compatible runtime via the activator.
    EnsureRuntime(RuntimeKind),
    /// Create an isolated environment and retry the failed operation
    /// inside it.
    IsolatedEnvRetry,
}

/// Cache directories a remediation may claim for the invoking user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDir {
    PacmanCache,
    NpmCache,
    GemHome,
}

/// One recognizable failure mode and how to respond to it.
pub struct ErrorSignature {
    pub id: &'static str,
    pub summary: &'static str,
    pub pattern: Pattern,
    pub remediation: Vec<RemedialStep>,
    /// A terminal signature ends the stage in failure regardless of
    /// remediation outcome; the post-remediation retry is suppressed.
    pub terminal: bool,
}

/// A classified failure: the signature plus anything captured from the
/// raw text.
pub struct SignatureMatch<'a> {
    pub signature: &'a ErrorSignature,
    pub package: Option<String>,
    pub requirement: Option<String>,
}

/// Produced once per failure event, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationOutcome {
    pub signature_id: Option<&'static str>,
    pub terminal: bool,
    pub commands_run: Vec<CommandResult>,
    pub resolved: bool,
    pub detail: String,
}

/// Host facts remediation commands are rendered against.
#[derive(Debug, Clone)]
pub struct RemediationContext {
    pub user: String,
    pub home: PathBuf,
    pub pacman_cache: PathBuf,
    pub npm_cache: PathBuf,
    pub gem_home: PathBuf,
    pub venv_dir: PathBuf,
    pub package_manifest: Option<PathBuf>,
    pub requirements_manifest: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl RemediationContext {
    pub fn detect(timeout_secs: u64) -> Self {
        let user = std::env::var("SUDO_USER")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| "root".to_string());
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        Self {
            pacman_cache: PathBuf::from("/var/cache/pacman/pkg"),
            npm_cache: home.join(".npm"),
            gem_home: home.join(".local/share/gem"),
            venv_dir: home.join(".local/share/steward/venv"),
            package_manifest: Some(PathBuf::from("package.json")),
            requirements_manifest: Some(PathBuf::from("requirements.txt")),
            user,
            home,
            timeout_secs,
        }
    }

    fn cache_path(&self, dir: CacheDir) -> &PathBuf {
        match dir {
            CacheDir::PacmanCache => &self.pacman_cache,
            CacheDir::NpmCache => &self.npm_cache,
            CacheDir::GemHome => &self.gem_home,
        }
    }
}

/// The ecosystem's signature table, in priority order.
pub fn table(ecosystem: Ecosystem) -> &'static [ErrorSignature] {
    match ecosystem {
        Ecosystem::Os => os::signatures(),
        Ecosystem::Js => js::signatures(),
        Ecosystem::Ruby => ruby::signatures(),
        Ecosystem::Python => python::signatures(),
    }
}

/// Match `text` against the ecosystem's signatures in declared
/// priority order; first match wins.
pub fn classify(ecosystem: Ecosystem, text: &str) -> Option<SignatureMatch<'static>> {
    for signature in table(ecosystem) {
        if let Some(captures) = signature.pattern.apply(text) {
            return Some(SignatureMatch {
                signature,
                package: captures.package,
                requirement: captures.requirement,
            });
        }
    }
    None
}

/// Classify a failed command and, on a match, run the signature's
/// remediation sequence. `resolved` is true only when every
/// remediation command exited zero; an unmatched failure keeps its raw
/// text for the final report.
pub async fn classify_and_remediate(
    exec: &CommandExec,
    activator: &dyn RuntimeActivator,
    ctx: &RemediationContext,
    ecosystem: Ecosystem,
    failure: &CommandResult,
) -> RemediationOutcome {
    let Some(matched) = classify(ecosystem, &failure.output) else {
        warn!(
            "no {} signature matched failure of '{}'",
            ecosystem, failure.command
        );
        return RemediationOutcome {
            signature_id: None,
            terminal: false,
            commands_run: Vec::new(),
            resolved: false,
            detail: "no signature matched; raw output retained".to_string(),
        };
    };

    let signature = matched.signature;
    info!(
        "{} failure matched signature '{}': {}",
        ecosystem, signature.id, signature.summary
    );

    let mut commands_run = Vec::new();
    let mut all_ok = true;
    let mut detail = signature.summary.to_string();

    'steps: for step in &signature.remediation {
        let specs = match plan_step(step, ecosystem, &matched, &failure.command, activator, ctx) {
            Ok(specs) => specs,
            Err(e) => {
                warn!("remediation step for '{}' not plannable: {}", signature.id, e);
                all_ok = false;
                detail = format!("{} (planning failed: {})", signature.summary, e);
                break;
            }
        };

        for spec in specs {
            let result = exec.run(&spec).await;
            let ok = result.ok();
            let fatal = result.is_fatal();
            commands_run.push(result);

            if fatal {
                // the remedial tool itself is unusable; running the
                // rest of the sequence would only pile up noise
                all_ok = false;
                detail = format!("{} (remediation command could not run)", signature.summary);
                break 'steps;
            }
            if !ok {
                all_ok = false;
            }
        }
    }

    if all_ok {
        debug!("remediation for '{}' completed cleanly", signature.id);
    }

    RemediationOutcome {
        signature_id: Some(signature.id),
        terminal: signature.terminal,
        commands_run,
        resolved: all_ok,
        detail,
    }
}

/// Resolve one declarative step to concrete commands. Manifest edits
/// happen here, through real parsers; a step that needs a captured
/// package fails planning when the pattern captured none.
fn plan_step(
    step: &RemedialStep,
    ecosystem: Ecosystem,
    matched: &SignatureMatch<'_>,
    original_command: &str,
    activator: &dyn RuntimeActivator,
    ctx: &RemediationContext,
) -> Result<Vec<CommandSpec>, StewardError> {
    match step {
        RemedialStep::Run { label, command } => {
            debug!("planning remediation: {}", label);
            let rendered = if command.contains("{pkg}") {
                let pkg = matched.package.as_deref().ok_or_else(|| {
                    StewardError::Plan(format!(
                        "signature '{}' captured no package name",
                        matched.signature.id
                    ))
                })?;
                command.replace("{pkg}", pkg)
            } else {
                (*command).to_string()
            };
            Ok(vec![CommandSpec::new(rendered, ctx.timeout_secs)])
        }

        RemedialStep::TakeOwnership { dir } => {
            let path = ctx.cache_path(*dir);
            Ok(vec![CommandSpec::new(
                format!("chown -R {} {}", ctx.user, path.display()),
                ctx.timeout_secs,
            )])
        }

        RemedialStep::ReinstallFromManifest => {
            let pkg = matched.package.as_deref().ok_or_else(|| {
                StewardError::Plan(format!(
                    "signature '{}' captured no package name",
                    matched.signature.id
                ))
            })?;
            match ecosystem {
                Ecosystem::Js => {
                    let Some(path) = ctx.package_manifest.as_ref().filter(|p| p.exists()) else {
                        debug!("no package.json present, skipping manifest step");
                        return Ok(Vec::new());
                    };
                    manifest::remove_npm_dependency(path, pkg)?;
                    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
                    let command = match dir {
                        Some(dir) => format!("cd {} && npm install", dir.display()),
                        None => "npm install".to_string(),
                    };
                    Ok(vec![CommandSpec::new(command, ctx.timeout_secs)])
                }
                Ecosystem::Python => {
                    let Some(path) = ctx.requirements_manifest.as_ref().filter(|p| p.exists())
                    else {
                        debug!("no requirements.txt present, skipping manifest step");
                        return Ok(Vec::new());
                    };
                    manifest::remove_requirement(path, pkg)?;
                    Ok(vec![CommandSpec::new(
                        format!("python -m pip install -r {}", path.display()),
                        ctx.timeout_secs,
                    )])
                }
                // no editable manifest for these ecosystems
                Ecosystem::Os | Ecosystem::Ruby => Ok(Vec::new()),
            }
        }

        RemedialStep::EnsureRuntime(kind) => {
            Ok(activator.activation_commands(*kind, matched.requirement.as_deref()))
        }

        RemedialStep::IsolatedEnvRetry => {
            let venv = ctx.venv_dir.display();
            Ok(vec![
                CommandSpec::new(format!("python -m venv --clear {}", venv), ctx.timeout_secs),
                CommandSpec::new(
                    format!(". {}/bin/activate && {}", venv, original_command),
                    ctx.timeout_secs,
                ),
            ])
        }
    }
}
