//! Error types shared by connections, the cache proxy and configuration.

use std::fmt;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (socket closed, write failure, timeout).
    /// These are the only errors the retry policy acts on.
    #[error("communication error: {message}")]
    Communication {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The byte stream could not be framed. The connection is unusable.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server replied with an error and the connection raises on errors.
    #[error("server error: {0}")]
    Server(ServerError),

    /// A push message could not be interpreted safely.
    #[error("push notification error: {0}")]
    PushNotification(String),

    /// Cache or client configuration was rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The command cannot be routed by a connection aggregate.
    #[error("cannot use '{0}' over clusters of connections")]
    NotSupported(String),
}

impl Error {
    pub fn communication(message: impl Into<String>) -> Self {
        Error::Communication {
            message: message.into(),
            source: None,
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Communication {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Only communication failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Communication { .. })
    }
}

/// Framing errors raised by the RESP parser.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// The leading type byte is not a known RESP2/RESP3 tag.
    #[error("unknown response prefix: '{}'", *.0 as char)]
    UnknownType(u8),

    /// The frame carried the right tag but a malformed body.
    #[error("invalid frame: {0}")]
    Invalid(String),
}

/// An error reply returned by the server (`-ERR ...` or `!<len>`).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    /// Leading upper-case word of the message, e.g. `ERR` or `WRONGTYPE`.
    pub kind: Option<String>,
    pub message: String,
}

impl ServerError {
    /// Split a raw error line into kind and message.
    pub fn parse(raw: &str) -> Self {
        let first = raw.split(' ').next().unwrap_or_default();
        let is_kind = !first.is_empty()
            && first
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');

        ServerError {
            kind: is_kind.then(|| first.to_string()),
            message: raw.to_string(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
