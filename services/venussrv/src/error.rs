//! Error handling for the Venus polling service.

use thiserror::Error;
use venus_model::ModelError;

/// Service error type.
///
/// The taxonomy separates problems that are rejected before any I/O
/// (`Validation`, `Config`) from communication-layer failures the
/// engine treats as soft (`Transport`, `Timeout`) and device-level
/// protocol violations (`Protocol`, `Decode`).
#[derive(Error, Debug, Clone)]
pub enum VenusError {
    /// Rejected before any network activity: unknown key, bad range,
    /// wrong value type for a signal's role.
    #[error("Validation error: {0}")]
    Validation(String),

    /// TCP-level failure: connect refused, broken pipe, link closed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An exchange did not complete within its deadline.
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The device replied with a malformed frame or an exception.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Register words could not be interpreted as the declared type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration loading or catalog selection failed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, VenusError>;

impl VenusError {
    pub fn validation(msg: impl Into<String>) -> Self {
        VenusError::Validation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        VenusError::Transport(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        VenusError::Timeout(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        VenusError::Protocol(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        VenusError::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        VenusError::Config(msg.into())
    }

    /// Soft failures are device-side problems the engine absorbs
    /// into `None`/`false` results once retries are exhausted. Only
    /// errors rejected before the wire (`Validation`, `Config`)
    /// stay hard.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            VenusError::Transport(_)
                | VenusError::Timeout(_)
                | VenusError::Protocol(_)
                | VenusError::Decode(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, VenusError::Timeout(_))
    }
}

impl From<ModelError> for VenusError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation(msg) => VenusError::Validation(msg),
            ModelError::Decode(msg) => VenusError::Decode(msg),
            ModelError::Config(msg) => VenusError::Config(msg),
        }
    }
}

impl From<std::io::Error> for VenusError {
    fn from(err: std::io::Error) -> Self {
        VenusError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_side_failures_are_soft() {
        assert!(VenusError::transport("refused").is_soft());
        assert!(VenusError::timeout("deadline").is_soft());
        assert!(VenusError::protocol("exception").is_soft());
        assert!(VenusError::decode("short payload").is_soft());
        assert!(!VenusError::validation("bad key").is_soft());
        assert!(!VenusError::config("bad tag").is_soft());
    }

    #[test]
    fn model_errors_map_onto_the_service_taxonomy() {
        let err: VenusError = ModelError::validation("bit index").into();
        assert!(matches!(err, VenusError::Validation(_)));
        let err: VenusError = ModelError::decode("short").into();
        assert!(matches!(err, VenusError::Decode(_)));
    }
}
