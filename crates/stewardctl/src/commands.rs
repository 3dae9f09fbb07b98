//! Command implementations for stewardctl.

use crate::display::{self, DisplayObserver};
use anyhow::{Context, Result};
use steward_common::config::StewardConfig;
use steward_common::Orchestrator;
use tracing::warn;

/// Run the full maintenance sequence. Returns the process exit code:
/// 0 full success, 1 completed with warnings, 2 aborted.
pub async fn run(auto_repair: bool) -> Result<i32> {
    let mut config = StewardConfig::load().context("loading configuration")?;
    if auto_repair {
        config.auto_repair = true;
    }

    let orchestrator = Orchestrator::new(config);
    let mut observer = DisplayObserver;

    let report = tokio::select! {
        report = orchestrator.run(&mut observer) => report,
        _ = tokio::signal::ctrl_c() => {
            // dropping the run future kills the in-flight command
            eprintln!("interrupted; maintenance run terminated");
            return Ok(2);
        }
    };

    display::render_summary(&report);

    if let Err(e) = report.append_to_log() {
        warn!("could not append to run log: {}", e);
    }

    Ok(report.verdict.exit_code())
}

/// List the maintenance stages in execution order.
pub fn stages() -> Result<i32> {
    display::render_stages();
    Ok(0)
}

/// Show the configuration the next run would use.
pub fn show_config() -> Result<i32> {
    let config = StewardConfig::load().context("loading configuration")?;
    let rendered = toml::to_string_pretty(&config).context("rendering configuration")?;
    print!("{}", rendered);
    Ok(0)
}
