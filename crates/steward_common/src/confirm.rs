//! Confirmation capability.
//!
//! The disk loop asks one question ("attempt repair of X?") through a
//! single `confirm` seam; its logic is identical whether the answer
//! comes from a terminal or from configuration.

use std::io::{self, Write};
use tracing::debug;

pub trait Confirmer: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Answers every question with a configured default. Used when an
/// explicit flag was given or no terminal is attached.
pub struct AutoConfirmer {
    pub answer: bool,
}

impl Confirmer for AutoConfirmer {
    fn confirm(&self, question: &str) -> bool {
        debug!("auto-answering '{}' with {}", question, self.answer);
        self.answer
    }
}

/// Prompts on the attached terminal; y/yes confirms.
pub struct InteractiveConfirmer;

impl Confirmer for InteractiveConfirmer {
    fn confirm(&self, question: &str) -> bool {
        print!("{} [y/N] ", question);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return false;
        }

        let answer = input.trim();
        answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
    }
}

/// Pick the right implementation for this run: auto-repair answers yes
/// without prompting, a terminal gets the interactive prompt, and an
/// unattended run without the flag skips repairs with a warning.
pub fn select_confirmer(auto_repair: bool) -> Box<dyn Confirmer> {
    if auto_repair {
        Box::new(AutoConfirmer { answer: true })
    } else if atty::is(atty::Stream::Stdin) {
        Box::new(InteractiveConfirmer)
    } else {
        Box::new(AutoConfirmer { answer: false })
    }
}
