//! Terminal output primitives and the run summary renderer.
//!
//! Receives the core's structured events {level, message}; the core
//! itself never formats for a terminal. Pastel ANSI palette, disabled
//! automatically when output is not a terminal.

use steward_common::report::{RunObserver, RunReport};
use steward_common::stage::{StageReport, StageSpec, StageStatus, STAGES};

/// ANSI color codes - pastel palette
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BLUE: &'static str = "\x1b[38;5;117m"; // Pastel blue
    pub const GREEN: &'static str = "\x1b[38;5;120m"; // Pastel green
    pub const YELLOW: &'static str = "\x1b[38;5;228m"; // Pastel yellow
    pub const RED: &'static str = "\x1b[38;5;210m"; // Pastel red
    pub const GRAY: &'static str = "\x1b[38;5;250m"; // Light gray
    pub const CYAN: &'static str = "\x1b[38;5;159m"; // Pastel cyan
    pub const BOLD: &'static str = "\x1b[1m";
}

/// Status level for messages
#[derive(Debug, Clone, Copy)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn symbol(&self) -> &'static str {
        match self {
            Level::Info => "ℹ",
            Level::Success => "✓",
            Level::Warning => "⚠",
            Level::Error => "✗",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Info => Colors::CYAN,
            Level::Success => Colors::GREEN,
            Level::Warning => Colors::YELLOW,
            Level::Error => Colors::RED,
        }
    }
}

impl From<StageStatus> for Level {
    fn from(status: StageStatus) -> Self {
        match status {
            StageStatus::Passed => Level::Success,
            StageStatus::Warned => Level::Warning,
            StageStatus::Failed => Level::Error,
            StageStatus::Skipped => Level::Info,
        }
    }
}

fn paint(color: &str, text: &str) -> String {
    if console::user_attended() {
        format!("{}{}{}", color, text, Colors::RESET)
    } else {
        text.to_string()
    }
}

/// Format a section title
pub fn section(text: &str) -> String {
    paint(Colors::CYAN, &format!("→ {}", text))
}

/// Format a status message
pub fn status(level: Level, message: &str) -> String {
    paint(level.color(), &format!("{} {}", level.symbol(), message))
}

/// Format a key-value pair
pub fn kv(key: &str, value: &str) -> String {
    format!("{} {}", paint(Colors::GRAY, &format!("{}:", key)), value)
}

/// Observer that narrates stage progress as it happens.
pub struct DisplayObserver;

impl RunObserver for DisplayObserver {
    fn stage_started(&mut self, spec: &StageSpec) {
        println!("{}", section(spec.name));
    }

    fn stage_finished(&mut self, report: &StageReport) {
        println!(
            "  {}",
            status(report.status.into(), &format!("{} ({}ms)", report.detail, report.duration_ms))
        );
    }
}

/// How much raw tool output to echo per unresolved failure.
const OUTPUT_TAIL_LINES: usize = 15;

/// Render the final summary: every stage's outcome, then the raw tool
/// output of everything that needs attention. Nothing fails silently.
pub fn render_summary(report: &RunReport) {
    println!();
    println!("{}", paint(Colors::BOLD, "maintenance summary"));

    for stage in &report.stages {
        println!(
            "  {}",
            status(
                stage.status.into(),
                &format!("{:<18} {}", stage.name, stage.detail)
            )
        );
    }

    let attention = report.attention();
    if !attention.is_empty() {
        println!();
        println!("{}", paint(Colors::BOLD, "needs attention"));
        for stage in attention {
            println!("  {}", paint(Colors::YELLOW, stage.name));
            if let Some(remediation) = &stage.remediation {
                match remediation.signature_id {
                    Some(id) => println!(
                        "    {}",
                        kv("signature", &format!("{} (resolved: {})", id, remediation.resolved))
                    ),
                    None => println!("    {}", kv("signature", "none matched")),
                }
            }
            for command in stage.commands.iter().filter(|c| !c.ok()) {
                println!("    {}", kv("command", &command.command));
                for line in output_tail(&command.output) {
                    println!("      {}", paint(Colors::GRAY, line));
                }
            }
        }
    }

    println!();
    println!("{}", kv("duration", &format!("{:.1}s", report.duration_ms as f64 / 1000.0)));
    let verdict_level = match report.verdict.exit_code() {
        0 => Level::Success,
        1 => Level::Warning,
        _ => Level::Error,
    };
    println!("{}", status(verdict_level, &report.verdict.describe()));
}

/// List the maintenance sequence without running it.
pub fn render_stages() {
    println!("{}", paint(Colors::BOLD, "maintenance stages, in order"));
    for (idx, stage) in STAGES.iter().enumerate() {
        println!(
            "  {}. {:<18} {}",
            idx + 1,
            stage.name,
            paint(Colors::GRAY, &format!("on failure: {}", stage.policy.as_str()))
        );
    }
}

fn output_tail(output: &str) -> Vec<&str> {
    let lines: Vec<&str> = output.lines().collect();
    let skip = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines.into_iter().skip(skip).collect()
}
