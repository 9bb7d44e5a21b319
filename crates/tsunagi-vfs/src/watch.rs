//! File-watch notifications.
//!
//! The dispatcher publishes a [`WatchEvent`] after every successful mutating
//! operation. Server `vfs:watch` broadcasts are re-published on the same
//! [`WatchBus`] by [`spawn_forwarder`], so subscribers see local and remote
//! changes through one channel.

use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tsunagi_client::{Connection, ConnectionEvent};

use crate::constants::WATCH_CHANNEL_CAPACITY;
use crate::file::{FileData, FileRef};
use crate::mime::MimeTable;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum WatchKind {
    Write,
    Mkdir,
    Delete,
    Move,
    Copy,
    Trash,
    Untrash,
}

/// Where a notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WatchSource {
    /// An operation performed through this dispatcher.
    Local,
    /// A server broadcast.
    Remote,
}

/// A file change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    /// The affected file; the destination for copy and move.
    pub file: FileRef,
    pub source: WatchSource,
}

impl WatchEvent {
    pub fn local(kind: WatchKind, file: FileRef) -> Self {
        Self {
            kind,
            file,
            source: WatchSource::Local,
        }
    }

    /// Decode `vfs:watch` args: `{event, file}`. `file` may be a path string
    /// or a file data object.
    pub fn from_broadcast(args: &Value, mime: &MimeTable) -> Option<Self> {
        let kind = args.get("event")?.as_str()?.parse().ok()?;
        let data = match args.get("file")? {
            Value::String(path) => FileData::new(path.clone(), Default::default()),
            other => serde_json::from_value(other.clone()).ok()?,
        };
        Some(Self {
            kind,
            file: FileRef::from_data(data, mime).ok()?,
            source: WatchSource::Remote,
        })
    }
}

/// Fan-out channel for [`WatchEvent`]s. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct WatchBus {
    tx: broadcast::Sender<WatchEvent>,
}

impl Default for WatchBus {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: WatchEvent) {
        tracing::debug!(kind = %event.kind, path = %event.file.path, source = %event.source, "watch");
        let _ = self.tx.send(event);
    }
}

/// Re-publish a connection's `vfs:watch` broadcasts on `bus`.
///
/// The task ends when the connection's event channel closes; callers that
/// outlive the connection should abort the handle on shutdown.
pub fn spawn_forwarder(conn: &dyn Connection, bus: WatchBus, mime: MimeTable) -> JoinHandle<()> {
    let mut events = conn.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Message(msg)) if msg.is_watch() => {
                    match WatchEvent::from_broadcast(&msg.args, &mime) {
                        Some(event) => bus.emit(event),
                        None => tracing::debug!(args = %msg.args, "ignoring malformed vfs:watch"),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch forwarder lagged behind connection events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tsunagi_client::StandaloneConnection;

    #[test]
    fn test_from_broadcast() {
        let mime = MimeTable::new();
        let event = WatchEvent::from_broadcast(
            &json!({"event": "write", "file": {"path": "home:///a.txt", "type": "file"}}),
            &mime,
        )
        .unwrap();
        assert_eq!(event.kind, WatchKind::Write);
        assert_eq!(event.file.filename, "a.txt");
        assert_eq!(event.file.mime.as_deref(), Some("text/plain"));
        assert_eq!(event.source, WatchSource::Remote);

        let event =
            WatchEvent::from_broadcast(&json!({"event": "mkdir", "file": "home:///d/"}), &mime)
                .unwrap();
        assert_eq!(event.kind, WatchKind::Mkdir);
        assert_eq!(event.file.filename, "d");

        assert!(WatchEvent::from_broadcast(&json!({"event": "explode", "file": "x"}), &mime).is_none());
        assert!(WatchEvent::from_broadcast(&json!({"event": "write"}), &mime).is_none());
    }

    #[tokio::test]
    async fn test_forwarder_republishes_watch_broadcasts() {
        let conn = StandaloneConnection::new();
        let bus = WatchBus::new();
        let mut rx = bus.subscribe();
        let handle = spawn_forwarder(&conn, bus.clone(), MimeTable::new());

        conn.broadcast(json!({"action": "other", "args": {}}));
        conn.broadcast(json!({"action": "vfs:watch", "args": {"event": "bogus", "file": "x"}}));
        conn.broadcast(json!({"action": "vfs:watch", "args": {"event": "delete", "file": "home:///gone"}}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, WatchKind::Delete);
        assert_eq!(event.file.path, "home:///gone");
        assert_eq!(event.source, WatchSource::Remote);

        drop(conn);
        handle.await.unwrap();
    }
}
