//! Host reachability probing.
//!
//! Each configured host is pinged with bounded retries and a fixed
//! delay between attempts; a host counts as reachable on its first
//! success. The aggregate verdict is policy-driven: `all` (default)
//! requires every host to answer, `any` is satisfied by one.

use crate::command_exec::{CommandExec, CommandSpec};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default probe command. `{timeout}` and `{host}` are substituted.
pub const DEFAULT_PING_TEMPLATE: &str = "ping -c 1 -W {timeout} {host}";

/// Aggregate reachability policy.
///
/// `All` is the default: later stages pull from mirrors, registries,
/// and backup targets that sit behind different hosts, so one silent
/// host is already a problem. `Any` suits single-uplink machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReachabilityPolicy {
    #[default]
    All,
    Any,
}

impl ReachabilityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

/// Outcome of probing a single host.
#[derive(Debug, Clone, Serialize)]
pub struct HostProbe {
    pub host: String,
    pub reachable: bool,
    pub attempts_used: u32,
}

/// Outcome of probing the whole host list.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSummary {
    pub probes: Vec<HostProbe>,
    pub policy: ReachabilityPolicy,
    pub pass: bool,
}

impl ProbeSummary {
    pub fn unreachable_hosts(&self) -> Vec<&str> {
        self.probes
            .iter()
            .filter(|p| !p.reachable)
            .map(|p| p.host.as_str())
            .collect()
    }
}

/// Probe one host: up to `attempts` tries, `delay` between them,
/// stopping at the first success. Generic over the probe itself so the
/// retry behavior is testable without a network.
pub async fn probe_host<F, Fut>(
    host: &str,
    attempts: u32,
    delay: Duration,
    mut try_once: F,
) -> HostProbe
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if try_once(host.to_string()).await {
            debug!("{} reachable on attempt {}", host, attempt);
            return HostProbe {
                host: host.to_string(),
                reachable: true,
                attempts_used: attempt,
            };
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    HostProbe {
        host: host.to_string(),
        reachable: false,
        attempts_used: attempts,
    }
}

/// Aggregate per-host outcomes under a policy.
pub fn evaluate(probes: &[HostProbe], policy: ReachabilityPolicy) -> bool {
    match policy {
        ReachabilityPolicy::All => probes.iter().all(|p| p.reachable),
        ReachabilityPolicy::Any => probes.iter().any(|p| p.reachable),
    }
}

/// Probe every configured host in order.
pub async fn probe_hosts(
    exec: &CommandExec,
    hosts: &[String],
    attempts: u32,
    delay: Duration,
    ping_timeout_secs: u64,
    policy: ReachabilityPolicy,
    template: &str,
) -> ProbeSummary {
    if hosts.is_empty() {
        warn!("no connectivity hosts configured, treating network as reachable");
    }

    let mut probes = Vec::with_capacity(hosts.len());
    for host in hosts {
        let probe = probe_host(host, attempts, delay, |h| {
            let command = template
                .replace("{timeout}", &ping_timeout_secs.to_string())
                .replace("{host}", &h);
            // the ping has its own -W deadline; pad the outer budget
            let spec = CommandSpec::new(command, ping_timeout_secs + 5);
            async move { exec.run(&spec).await.ok() }
        })
        .await;

        if probe.reachable {
            info!("{} reachable (attempt {})", probe.host, probe.attempts_used);
        } else {
            warn!("{} unreachable after {} attempts", probe.host, probe.attempts_used);
        }
        probes.push(probe);
    }

    let pass = evaluate(&probes, policy);
    ProbeSummary {
        probes,
        policy,
        pass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    fn fails_all() -> HostProbe {
        HostProbe {
            host: "a".into(),
            reachable: false,
            attempts_used: 3,
        }
    }

    fn up() -> HostProbe {
        HostProbe {
            host: "b".into(),
            reachable: true,
            attempts_used: 2,
        }
    }

    #[tokio::test]
    async fn test_host_reachable_on_second_attempt() {
        let mut calls = 0u32;
        let probe = probe_host("b", 3, Duration::ZERO, |_h| {
            calls += 1;
            ready(calls >= 2)
        })
        .await;

        assert!(probe.reachable);
        assert_eq!(probe.attempts_used, 2);
    }

    #[tokio::test]
    async fn test_host_exhausts_attempts() {
        let mut calls = 0u32;
        let probe = probe_host("a", 3, Duration::ZERO, |_h| {
            calls += 1;
            ready(false)
        })
        .await;

        assert!(!probe.reachable);
        assert_eq!(probe.attempts_used, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_no_retry_after_first_success() {
        let mut calls = 0u32;
        let probe = probe_host("b", 5, Duration::ZERO, |_h| {
            calls += 1;
            ready(true)
        })
        .await;

        assert!(probe.reachable);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_all_policy_fails_when_one_host_is_down() {
        let probes = vec![fails_all(), up()];
        assert!(!evaluate(&probes, ReachabilityPolicy::All));
    }

    #[test]
    fn test_any_policy_passes_when_one_host_is_up() {
        let probes = vec![fails_all(), up()];
        assert!(evaluate(&probes, ReachabilityPolicy::Any));
    }

    #[test]
    fn test_empty_host_list_is_vacuously_reachable() {
        assert!(evaluate(&[], ReachabilityPolicy::All));
    }

    #[test]
    fn test_policy_serialization() {
        let json = serde_json::to_string(&ReachabilityPolicy::All).unwrap();
        assert_eq!(json, r#""all""#);
        let parsed: ReachabilityPolicy = serde_json::from_str(r#""any""#).unwrap();
        assert_eq!(parsed, ReachabilityPolicy::Any);
    }
}
