//! Steward configuration.
//!
//! Config file: ~/.config/steward/config.toml or /etc/steward/config.toml

use crate::connectivity::ReachabilityPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Connectivity stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Hosts that must answer before maintenance starts
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Ping attempts per host
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Fixed delay between attempts, in seconds
    #[serde(default = "default_delay")]
    pub delay_secs: u64,

    /// Per-ping deadline, in seconds
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    /// `all` (default) or `any`
    #[serde(default)]
    pub policy: ReachabilityPolicy,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            attempts: default_attempts(),
            delay_secs: default_delay(),
            ping_timeout_secs: default_ping_timeout(),
            policy: ReachabilityPolicy::default(),
        }
    }
}

fn default_hosts() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "archlinux.org".to_string()]
}

fn default_attempts() -> u32 {
    3
}

fn default_delay() -> u64 {
    2
}

fn default_ping_timeout() -> u64 {
    5
}

/// Backup stage settings. Both paths must be set for the stage to run;
/// an unconfigured backup is skipped with a warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub source: Option<PathBuf>,

    #[serde(default)]
    pub target: Option<PathBuf>,
}

impl BackupConfig {
    pub fn is_configured(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }
}

/// Per-stage command time budgets, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout")]
    pub default_secs: u64,

    /// fsck over a large partition is slow
    #[serde(default = "default_disk_timeout")]
    pub disk_secs: u64,

    /// a full system upgrade can download gigabytes
    #[serde(default = "default_update_timeout")]
    pub update_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout(),
            disk_secs: default_disk_timeout(),
            update_secs: default_update_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    600
}

fn default_disk_timeout() -> u64 {
    1800
}

fn default_update_timeout() -> u64 {
    3600
}

/// Main steward configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StewardConfig {
    /// Repair unhealthy disks without prompting
    #[serde(default)]
    pub auto_repair: bool,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl StewardConfig {
    /// Get default user config path: ~/.config/steward/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("steward").join("config.toml"))
    }

    /// Get system config path: /etc/steward/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/steward/config.toml")
    }

    /// Load configuration.
    ///
    /// Priority:
    /// 1. User config (~/.config/steward/config.toml)
    /// 2. System config (/etc/steward/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from(&system_path);
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: StewardConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StewardConfig::default();
        assert!(!config.auto_repair);
        assert_eq!(config.connectivity.attempts, 3);
        assert_eq!(config.connectivity.policy, ReachabilityPolicy::All);
        assert!(!config.backup.is_configured());
        assert_eq!(config.timeouts.update_secs, 3600);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: StewardConfig = toml::from_str("").unwrap();
        assert_eq!(config.connectivity.hosts.len(), 2);
        assert_eq!(config.timeouts.default_secs, 600);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: StewardConfig = toml::from_str(
            r#"
            auto_repair = true

            [connectivity]
            hosts = ["10.0.0.1"]
            policy = "any"

            [backup]
            source = "/home"
            target = "/mnt/backup/home"
            "#,
        )
        .unwrap();

        assert!(config.auto_repair);
        assert_eq!(config.connectivity.hosts, vec!["10.0.0.1"]);
        assert_eq!(config.connectivity.policy, ReachabilityPolicy::Any);
        assert_eq!(config.connectivity.attempts, 3);
        assert!(config.backup.is_configured());
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let result: std::result::Result<StewardConfig, _> =
            toml::from_str("[connectivity]\npolicy = \"most\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let original = StewardConfig {
            auto_repair: true,
            ..Default::default()
        };
        let text = toml::to_string(&original).unwrap();
        let parsed: StewardConfig = toml::from_str(&text).unwrap();
        assert!(parsed.auto_repair);
        assert_eq!(parsed.connectivity.hosts, original.connectivity.hosts);
    }
}
