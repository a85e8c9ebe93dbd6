//! Error types for Flowgate Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A flow condition could not be evaluated. Fails the whole resolution.
    #[error("Condition evaluation failed: {0}")]
    ConditionEvaluation(String),

    /// The candidate flow source failed before any filtering happened.
    #[error("Flow provider error: {0}")]
    FlowProvider(String),

    #[error("Unknown API: {0}")]
    UnknownApi(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Unknown endpoint group: {0}")]
    UnknownEndpointGroup(String),

    #[error("Endpoint already exists: {0}")]
    DuplicateEndpoint(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration not found")]
    ConfigNotFound,

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConditionEvaluation("unknown variable 'foo'".to_string());
        assert_eq!(
            err.to_string(),
            "Condition evaluation failed: unknown variable 'foo'"
        );

        assert_eq!(Error::ConfigNotFound.to_string(), "Configuration not found");
        assert_eq!(
            Error::UnknownEndpoint("edge-1".to_string()).to_string(),
            "Unknown endpoint: edge-1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
