//! Error types for the orcastream gateway.

use std::result;
use tonic::{Code, Status};

/// A specialized Result type for gateway operations.
pub type Result<T> = result::Result<T, Error>;

/// The error type for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream has no resolvable metadata or endpoint
    #[error("Stream not found: {0}")]
    NotFound(String),

    /// A fetch using a previously resolved handle failed
    #[error("Access handle rejected: {0}")]
    HandleInvalid(String),

    /// Listing or metadata calls failed on the wire
    #[error("Transport error: {0}")]
    Transport(String),

    /// The consumer sink refused a forwarded frame
    #[error("Forward failed: {0}")]
    Forward(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<arrow::error::ArrowError> for Error {
    fn from(err: arrow::error::ArrowError) -> Self {
        Error::Arrow(err.to_string())
    }
}

impl From<arrow_flight::error::FlightError> for Error {
    fn from(err: arrow_flight::error::FlightError) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::NotFound => Error::NotFound(status.message().to_string()),
            _ => Error::Transport(format!("{}: {}", status.code(), status.message())),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => Status::not_found(msg),
            Error::HandleInvalid(msg) => Status::unavailable(format!("Access handle rejected: {}", msg)),
            Error::Transport(msg) => Status::unavailable(format!("Transport error: {}", msg)),
            Error::Forward(msg) => Status::aborted(format!("Forward failed: {}", msg)),
            Error::Config(msg) => Status::failed_precondition(format!("Config error: {}", msg)),
            Error::Arrow(msg) => Status::internal(format!("Arrow error: {}", msg)),
            Error::Serialization(msg) => Status::internal(format!("Serialization error: {}", msg)),
            Error::Io(err) => Status::internal(format!("I/O error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_not_found_maps_to_not_found() {
        let err: Error = Status::not_found("no such flight").into();
        assert!(matches!(err, Error::NotFound(ref m) if m == "no such flight"));
    }

    #[test]
    fn test_other_status_maps_to_transport() {
        let err: Error = Status::unavailable("connection refused").into();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_error_into_status() {
        let status: Status = Error::Forward("receiver dropped".into()).into();
        assert_eq!(status.code(), Code::Aborted);

        let status: Status = Error::NotFound("a/b".into()).into();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "a/b");
    }
}
