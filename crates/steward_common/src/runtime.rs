//! Runtime environment activation.
//!
//! "Ensure runtime version X is active" is a capability supplied by a
//! collaborator; the core plans activation through this trait and
//! never edits shell profiles or startup files itself.

use crate::command_exec::CommandSpec;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Node,
    Ruby,
    Python,
}

impl RuntimeKind {
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Ruby => "ruby",
            Self::Python => "python",
        }
    }
}

pub trait RuntimeActivator: Send + Sync {
    /// Plan the commands that make a runtime satisfying `requirement`
    /// active for subsequent invocations. `None` means "a current
    /// version".
    fn activation_commands(&self, runtime: RuntimeKind, requirement: Option<&str>)
        -> Vec<CommandSpec>;
}

/// Activation via the `mise` version manager.
pub struct MiseActivator {
    pub timeout_secs: u64,
}

impl MiseActivator {
    /// mise takes concrete versions. A range requirement (">= 3.2.0")
    /// resolves to `latest` rather than its lower bound, which may be
    /// an EOL build.
    fn resolve_version(requirement: Option<&str>) -> String {
        match requirement {
            Some(req) => {
                let req = req.trim().trim_end_matches('.');
                if req.is_empty() || req.chars().any(|c| "<>=~^!| ".contains(c)) {
                    "latest".to_string()
                } else {
                    req.to_string()
                }
            }
            None => "latest".to_string(),
        }
    }
}

impl RuntimeActivator for MiseActivator {
    fn activation_commands(
        &self,
        runtime: RuntimeKind,
        requirement: Option<&str>,
    ) -> Vec<CommandSpec> {
        let version = Self::resolve_version(requirement);
        vec![
            CommandSpec::new(
                format!("mise install {}@{}", runtime.tool(), version),
                self.timeout_secs,
            ),
            CommandSpec::new(
                format!("mise use --global {}@{}", runtime.tool(), version),
                self.timeout_secs,
            ),
        ]
    }
}

/// Activator that plans nothing. For hosts without a version manager
/// and for tests.
pub struct NoopActivator;

impl RuntimeActivator for NoopActivator {
    fn activation_commands(
        &self,
        _runtime: RuntimeKind,
        _requirement: Option<&str>,
    ) -> Vec<CommandSpec> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_version_is_kept() {
        assert_eq!(MiseActivator::resolve_version(Some("3.2.0")), "3.2.0");
        assert_eq!(MiseActivator::resolve_version(Some("20.11.1.")), "20.11.1");
    }

    #[test]
    fn test_range_requirement_resolves_to_latest() {
        assert_eq!(MiseActivator::resolve_version(Some(">= 3.2.0")), "latest");
        assert_eq!(MiseActivator::resolve_version(Some("^20.0.0")), "latest");
        assert_eq!(MiseActivator::resolve_version(None), "latest");
    }

    #[test]
    fn test_mise_activation_plan() {
        let activator = MiseActivator { timeout_secs: 300 };
        let plan = activator.activation_commands(RuntimeKind::Ruby, Some("3.3.1"));

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].command, "mise install ruby@3.3.1");
        assert_eq!(plan[1].command, "mise use --global ruby@3.3.1");
    }

    #[test]
    fn test_noop_activator_plans_nothing() {
        assert!(NoopActivator
            .activation_commands(RuntimeKind::Node, Some("20"))
            .is_empty());
    }
}
