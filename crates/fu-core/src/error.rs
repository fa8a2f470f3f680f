use thiserror::Error;

pub type FuResult<T> = Result<T, FuError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
