//! Compiles generated source into callable decision functions.
//!
//! Nothing here executes host code: source is scanned against a denylist,
//! size-checked, then parsed into the closed rule language. The scan only
//! catches accidental or naive dangerous text. Untrusted multi-tenant input
//! still needs process-level isolation around this step.

use std::time::Duration;

use tracing::debug;

use crate::domain::augment::Bar;
use crate::domain::error::{EvalError, RejectReason};
use crate::domain::rule::Rule;
use crate::domain::rule_eval::{evaluate, Deadline, PositionContext};
use crate::domain::rule_parser::{parse_program, ENTRY_NAME, EXIT_NAME};

pub const MAX_SOURCE_BYTES: usize = 16 * 1024;
pub const DEFAULT_CALL_BUDGET: Duration = Duration::from_millis(50);

/// Case-insensitive substrings that reject a source outright.
pub const DENYLIST: &[&str] = &[
    "import",
    "__",
    "exec",
    "eval",
    "compile",
    "open(",
    "file(",
    "os.",
    "sys.",
    "subprocess",
    "socket",
    "system(",
    "popen",
    "globals",
    "locals",
    "getattr",
    "setattr",
    "lambda",
    "input(",
    "shutil",
    "pickle",
    "urllib",
    "requests",
    "http",
    "std::",
    "unsafe",
];

/// Reject a source containing any denylisted token.
pub fn scan(source: &str) -> Result<(), RejectReason> {
    let lower = source.to_lowercase();
    match DENYLIST.iter().find(|token| lower.contains(*token)) {
        Some(token) => Err(RejectReason::DeniedToken {
            token: token.to_string(),
        }),
        None => Ok(()),
    }
}

/// Compiled entry and exit functions plus the source they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRules {
    source: String,
    entry: Rule,
    exit: Rule,
}

pub fn compile(source: &str) -> Result<GeneratedRules, RejectReason> {
    if source.len() > MAX_SOURCE_BYTES {
        return Err(RejectReason::SourceTooLarge {
            len: source.len(),
            limit: MAX_SOURCE_BYTES,
        });
    }
    scan(source)?;

    let program = parse_program(source)?;
    let entry = program.entry.ok_or_else(|| RejectReason::MissingFunction {
        name: ENTRY_NAME.to_string(),
    })?;
    let exit = program.exit.ok_or_else(|| RejectReason::MissingFunction {
        name: EXIT_NAME.to_string(),
    })?;

    debug!(bytes = source.len(), warmup = entry.warmup(), "compiled generated rules");
    Ok(GeneratedRules {
        source: source.to_string(),
        entry,
        exit,
    })
}

impl GeneratedRules {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_rule(&self) -> &Rule {
        &self.entry
    }

    pub fn exit_rule(&self) -> &Rule {
        &self.exit
    }

    /// Bars the entry function refuses to trade on.
    pub fn warmup(&self) -> usize {
        self.entry.warmup()
    }

    /// Should a flat book buy at bar `i`? Runs under a fresh `budget`.
    pub fn entry_condition(&self, bars: &[Bar], i: usize, budget: Duration) -> Result<bool, EvalError> {
        evaluate(&self.entry, bars, i, None, &Deadline::after(budget))
    }

    /// Should the open position be sold at bar `i`? Runs under a fresh `budget`.
    pub fn exit_condition(
        &self,
        bars: &[Bar],
        i: usize,
        entry_price: f64,
        entry_index: usize,
        budget: Duration,
    ) -> Result<bool, EvalError> {
        let position = PositionContext {
            entry_price,
            entry_index,
        };
        evaluate(&self.exit, bars, i, Some(&position), &Deadline::after(budget))
    }
}
