//! Domain error types.

use chrono::NaiveDate;

/// A parse error with position information for generated rule source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let line_start = input[..self.position.min(input.len())]
            .rfind('\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let line_end = input[line_start..]
            .find('\n')
            .map(|p| line_start + p)
            .unwrap_or(input.len());
        let caret = " ".repeat(self.position.saturating_sub(line_start)) + "^";
        format!(
            "{line}\n{caret}\n{err}",
            line = &input[line_start..line_end],
            caret = caret,
            err = self
        )
    }
}

/// Why the sandbox refused to compile generated source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("denylisted token '{token}' in generated source")]
    DeniedToken { token: String },

    #[error("generated source is {len} bytes, limit is {limit}")]
    SourceTooLarge { len: usize, limit: usize },

    #[error("generated source does not define {name}")]
    MissingFunction { name: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Per-call failure of a compiled decision function.
///
/// Never fatal: the simulation treats either variant as "no signal".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("condition evaluation exceeded its {budget_ms} ms budget")]
    Timeout { budget_ms: u128 },

    #[error("bar index {index} out of range for {len} bars")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Top-level error type for stratsim.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("strategy needs clarification: {}", clarifications.join(" "))]
    ClarificationNeeded { clarifications: Vec<String> },

    #[error("generated rules rejected: {0}")]
    GenerationRejected(#[from] RejectReason),

    #[error("no historical data for {symbol} between {start} and {end}")]
    NoHistoricalData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Data { .. } => 3,
            EngineError::ClarificationNeeded { .. } => 4,
            EngineError::GenerationRejected(_) => 5,
            EngineError::NoHistoricalData { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
