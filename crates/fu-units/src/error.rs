use std::path::PathBuf;

use fu_engine::EngineError;
use thiserror::Error;

pub type UnitsResult<T> = Result<T, UnitsError>;

#[derive(Error, Debug)]
pub enum UnitsError {
    /// Missing or inconsistent configuration: flow name, definition files.
    #[error("Configuration error: {what}")]
    Config { what: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Numeric(#[from] fu_core::FuError),

    /// Species pattern failed to compile.
    #[error("Invalid species pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl UnitsError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        UnitsError::Config { what: what.into() }
    }
}
