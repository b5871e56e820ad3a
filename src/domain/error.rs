//! Domain error types.

/// Top-level error type for tradeport.
///
/// Only `ParseFailure` is fatal to the current file; everything else either
/// degrades gracefully or reports a recoverable workflow misuse.
#[derive(Debug, thiserror::Error)]
pub enum TradeportError {
    /// Both parse attempts (delimited, then spreadsheet) failed. No partial
    /// rows are ever exposed alongside this error.
    #[error("parse failed: {reason}")]
    ParseFailure { reason: String },

    #[error("{operation} is not valid in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("mapping references unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("commit requires at least one selected trade")]
    EmptySelection,

    #[error("store error: {reason}")]
    Store { reason: String },

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

impl TradeportError {
    /// The pipeline stage a user-visible failure belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            TradeportError::ParseFailure { .. } => "parse",
            TradeportError::InvalidState { .. }
            | TradeportError::UnknownColumn { .. }
            | TradeportError::EmptySelection => "mapping",
            TradeportError::Store { .. } => "commit",
            TradeportError::ConfigParse { .. }
            | TradeportError::ConfigMissing { .. }
            | TradeportError::ConfigInvalid { .. } => "config",
            TradeportError::Io(_) => "io",
        }
    }
}

impl From<&TradeportError> for std::process::ExitCode {
    fn from(err: &TradeportError) -> Self {
        let code: u8 = match err {
            TradeportError::Io(_) => 1,
            TradeportError::ConfigParse { .. }
            | TradeportError::ConfigMissing { .. }
            | TradeportError::ConfigInvalid { .. } => 2,
            TradeportError::Store { .. } => 3,
            TradeportError::ParseFailure { .. } => 4,
            TradeportError::InvalidState { .. }
            | TradeportError::UnknownColumn { .. }
            | TradeportError::EmptySelection => 5,
        };
        std::process::ExitCode::from(code)
    }
}
