//! Error types for the domain model.

use thiserror::Error;

/// Errors raised by catalog construction and the register codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Rejected before any I/O: bad address, count, bit index, value
    /// range, unknown key or option.
    #[error("validation error: {0}")]
    Validation(String),

    /// Raw register words could not be interpreted as the declared
    /// data type (typically fewer words than the type requires).
    #[error("decode error: {0}")]
    Decode(String),

    /// Catalog selection or construction failed (unknown version tag,
    /// inconsistent table entry).
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for the domain model.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ModelError::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        ModelError::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ModelError::Config(msg.into())
    }
}
