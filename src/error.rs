use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// A reply that was read but could not be accepted.
///
/// `ServerError` is a well-formed `-` reply; every other variant means the
/// byte stream itself was not valid RESP.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("server replied with error: {0}")]
    ServerError(String),

    #[error("unexpected reply marker {0:?}")]
    UnexpectedMarker(char),

    #[error("reply truncated by end of stream")]
    Truncated,

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("reply line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Transient failures of a single connection.
///
/// None of these ever leave the worker that produced them; they are logged,
/// counted, and answered with a reconnect.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("TLS setup for {addr} failed: {reason}")]
    Tls { addr: String, reason: String },

    #[error("no reply within {0:?}")]
    ReadTimeout(Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ConnectionError {
    /// True when the failure came from the byte stream rather than the network.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ConnectionError::Protocol(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_are_classified() {
        let err: ConnectionError = ProtocolError::Truncated.into();
        assert!(err.is_protocol());
        assert!(!ConnectionError::Closed.is_protocol());
    }

    #[test]
    fn server_error_text_is_preserved() {
        let err = ProtocolError::ServerError("WRONGPASS invalid password".into());
        assert_eq!(
            err.to_string(),
            "server replied with error: WRONGPASS invalid password"
        );
    }
}
