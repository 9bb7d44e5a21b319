//! VFS error types.

use std::io;

use thiserror::Error;
use tsunagi_client::ConnectionError;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Rejected input: bad mount registration, malformed path, wrong kind.
    #[error("invalid: {0}")]
    Validation(String),

    /// No enabled mount matches the path.
    #[error("no mount point for path: {0}")]
    NoMount(String),

    /// File, directory or mount not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The owning mount is read-only.
    #[error("mount '{0}' is read-only")]
    ReadOnly(String),

    /// The transport does not implement this operation.
    #[error("'{op}' is not supported by the {transport} transport")]
    Unsupported { op: &'static str, transport: String },

    /// The connection failed locally (not open, destroyed, abandoned).
    #[error("connection error: {0}")]
    Connection(ConnectionError),

    /// The server answered with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a Validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a NoMount error.
    pub fn no_mount(path: impl Into<String>) -> Self {
        Self::NoMount(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a ReadOnly error.
    pub fn read_only(mount: impl Into<String>) -> Self {
        Self::ReadOnly(mount.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(op: &'static str, transport: impl Into<String>) -> Self {
        Self::Unsupported {
            op,
            transport: transport.into(),
        }
    }

    /// Create a Remote error.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Returns true for "not found" style failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NoMount(_))
    }
}

/// Server-reported errors stay distinct from local connection failures.
impl From<ConnectionError> for VfsError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Remote(msg) => Self::Remote(msg),
            other => Self::Connection(other),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tsunagi_client::TransportError;

    #[test]
    fn test_connection_error_mapping() {
        let remote: VfsError = ConnectionError::remote("denied").into();
        assert!(matches!(remote, VfsError::Remote(msg) if msg == "denied"));

        let local: VfsError = ConnectionError::Transport(TransportError::NotOpen).into();
        assert!(matches!(local, VfsError::Connection(_)));
        assert_eq!(local.to_string(), "connection error: transport error: socket is not open");
    }
}
