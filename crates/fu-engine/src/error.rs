//! Engine errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while defining, parsing or converting units.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed unit or quantity expression.
    #[error("Parse error in '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// Token does not name a unit, with or without prefix.
    #[error("Undefined unit: {0}")]
    UndefinedUnit(String),

    #[error("Cannot convert from '{from}' ({from_dim}) to '{to}' ({to_dim})")]
    Dimensionality {
        from: String,
        from_dim: String,
        to: String,
        to_dim: String,
    },

    #[error("Unknown context: {0}")]
    UnknownContext(String),

    /// Raised only under `RedefinitionPolicy::Error`.
    #[error("Redefinition of '{0}'")]
    Redefinition(String),

    #[error("Cyclic definition involving '{0}'")]
    Cycle(String),

    #[error("Invalid definition '{line}': {reason}")]
    InvalidDefinition { line: String, reason: String },

    #[error("Unsupported directive: {0}")]
    Unsupported(String),

    /// Wraps an error with the file and line it came from.
    #[error("{origin}:{line}: {source}")]
    AtLine {
        origin: String,
        line: usize,
        source: Box<EngineError>,
    },

    #[error("Failed to read definitions file: {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl EngineError {
    /// Innermost error, skipping `AtLine` wrappers.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::AtLine { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        EngineError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
