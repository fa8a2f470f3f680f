use std::path::PathBuf;

use fu_units::UnitsError;

pub type GenerateResult<T> = Result<T, GenerateError>;

#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Invalid dataset: {what}")]
    Dataset { what: String },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error(transparent)]
    Numeric(#[from] fu_core::FuError),
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| GenerateError::Io { path, source }
    }

    pub(crate) fn dataset(what: impl Into<String>) -> Self {
        GenerateError::Dataset { what: what.into() }
    }
}
