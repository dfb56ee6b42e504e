use thiserror::Error;

pub type CfResult<T> = Result<T, CfError>;

/// Errors raised by the shared numeric guards. Layer-specific failures live
/// in each crate's own error type.
#[derive(Error, Debug)]
pub enum CfError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
