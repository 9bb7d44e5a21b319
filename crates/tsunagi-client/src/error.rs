//! Connection error types.

use thiserror::Error;

/// Socket-level failures: opening, reading or writing the duplex stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket is not open (never opened, lost, or reconnecting).
    #[error("socket is not open")]
    NotOpen,

    /// The endpoint URL could not be understood by the dialer.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The socket closed before it finished opening.
    #[error("connection error: socket closed with status {0}")]
    Closed(u16),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error from the underlying stream.
    #[error("framing error: {0}")]
    Framing(String),
}

/// Errors surfaced by [`Connection`](crate::Connection) implementations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection was destroyed; no further requests are accepted.
    #[error("connection closed")]
    Closed,

    /// `init` was called on a connection that is already running.
    #[error("connection already started")]
    AlreadyStarted,

    /// Socket-level failure while sending or during the first connect.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered a correlated request with an error payload.
    #[error("remote error: {0}")]
    Remote(String),

    /// The request envelope could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The connection was torn down while the request was outstanding.
    ///
    /// Only [`Connection::call`](crate::Connection::call) reports this; the
    /// callback form simply never runs the completion.
    #[error("request abandoned")]
    Abandoned,
}

impl ConnectionError {
    /// Create a Remote error.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Returns true if this error means the connection is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::Abandoned)
    }
}

/// Connection result type.
pub type ConnectionResult<T> = Result<T, ConnectionError>;
