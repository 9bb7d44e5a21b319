//! Connection lifecycle and server-push event types.
//!
//! Provides [`ConnectionEvent`], the typed form of everything a
//! [`Connection`](crate::Connection) tells its subscribers, and
//! [`ConnectionState`] for lifecycle tracking.
//!
//! Events fan out through a `tokio::sync::broadcast` channel so every
//! subscriber sees them in receipt order.

use serde_json::Value;

use crate::constants::WATCH_ACTION;

// ============================================================================
// Event Types
// ============================================================================

/// Events pushed from a connection to its subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    /// The socket came back after a loss.
    Online,
    /// The socket was lost, or a reconnect attempt failed.
    ///
    /// `attempt` is 0 on the first loss and counts failed reconnects after.
    Offline { attempt: u32 },
    /// The server closed the socket deliberately; no reconnect will follow.
    Disconnected,
    /// An unsolicited server message.
    Message(ServerMessage),
}

/// An unsolicited server-to-client message.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerMessage {
    /// Broadcast key, e.g. `vfs:watch`.
    pub action: Option<String>,
    /// The message's `args` (null when absent).
    pub args: Value,
    /// The whole frame as received.
    pub payload: Value,
}

impl ServerMessage {
    pub fn from_payload(payload: Value) -> Self {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let args = payload.get("args").cloned().unwrap_or(Value::Null);
        Self {
            action,
            args,
            payload,
        }
    }

    /// Returns true for a filesystem change notification.
    pub fn is_watch(&self) -> bool {
        self.action.as_deref() == Some(WATCH_ACTION)
    }
}

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Destroyed,
}

impl ConnectionState {
    /// Returns true when requests can be sent right now.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true once the connection has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}
