//! Reconnecting socket transport.
//!
//! [`SocketTransport`] implements [`Connection`] over a persistent socket.
//! A driver task owns the socket and runs the connect/reconnect loop; the
//! pending-request table, the index counter and the outbound queue live in
//! shared state that [`Connection::request`] touches synchronously.
//!
//! ```text
//!   request() ──▶ pending[index] = completion ──▶ outbound mpsc ──┐
//!                                                                 ▼
//!   Driver task:  dial ─▶ pump(socket) ─▶ lost ─▶ sleep(backoff) ─▶ dial ...
//!                            │
//!                            ├─ {_index: n, ..}  → pending.remove(n)(payload)
//!                            └─ {action, args}   → broadcast to subscribers
//! ```
//!
//! States: `Disconnected → Connecting → Connected ⇄ Reconnecting → Destroyed`.
//! Only a failure before the first successful open is reported to `init`;
//! later losses become `Offline { attempt }` events. Losing the socket
//! resets the pending table; the index counter never resets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::connection::{Completion, Connection, LocalHandler};
use crate::constants::{CLOSE_ABNORMAL, CLOSE_DELIBERATE, EVENT_CHANNEL_CAPACITY};
use crate::envelope::{Inbound, RequestEnvelope};
use crate::error::{ConnectionError, ConnectionResult, TransportError};
use crate::events::{ConnectionEvent, ConnectionState};
use crate::socket::{Dialer, Socket, SocketFrame, TcpDialer};

// ============================================================================
// Shared state
// ============================================================================

/// Mutable connection state shared between callers and the driver task.
#[derive(Default)]
struct Inner {
    state: ConnectionState,
    /// Next correlation index. Monotonic for the life of the connection.
    next_index: u64,
    pending: HashMap<u64, Completion>,
    /// Present only while a socket is open.
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct Shared {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ConnectionEvent>,
    shutdown: CancellationToken,
}

impl Shared {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    /// Socket opened. Returns false if the connection was destroyed meanwhile.
    ///
    /// The outbound queue is installed and `Online` published under the same
    /// lock, so no request can be accepted ahead of the notification.
    fn opened(&self, outbound: mpsc::UnboundedSender<String>, resumed: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_destroyed() {
            return false;
        }
        inner.state = ConnectionState::Connected;
        inner.outbound = Some(outbound);
        if resumed {
            tracing::info!("socket connection restored");
            let _ = self.events.send(ConnectionEvent::Online);
        } else {
            tracing::info!("socket connection established");
        }
        true
    }

    /// Socket lost after being open. Returns false if destroyed meanwhile.
    fn lost(&self, code: u16) -> bool {
        let abandoned = {
            let mut inner = self.inner.lock();
            if inner.state.is_destroyed() {
                return false;
            }
            inner.state = ConnectionState::Reconnecting { attempt: 0 };
            inner.outbound = None;
            let abandoned = std::mem::take(&mut inner.pending);
            let _ = self.events.send(ConnectionEvent::Offline { attempt: 0 });
            abandoned
        };
        tracing::warn!(
            code,
            abandoned = abandoned.len(),
            "socket connection lost, reconnecting"
        );
        true
    }

    /// A reconnect attempt failed. Returns false if destroyed meanwhile.
    fn retry_failed(&self, attempt: u32, error: &TransportError) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_destroyed() {
            return false;
        }
        inner.state = ConnectionState::Reconnecting { attempt };
        let _ = self.events.send(ConnectionEvent::Offline { attempt });
        tracing::warn!(attempt, %error, "reconnect attempt failed");
        true
    }

    /// The server closed with the deliberate status: stop without reconnecting.
    fn closed_deliberately(&self) {
        let abandoned = {
            let mut inner = self.inner.lock();
            if inner.state.is_destroyed() {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.outbound = None;
            let _ = self.events.send(ConnectionEvent::Disconnected);
            std::mem::take(&mut inner.pending)
        };
        tracing::info!(abandoned = abandoned.len(), "server closed the connection");
    }

    fn failed_initial(&self) {
        let mut inner = self.inner.lock();
        if !inner.state.is_destroyed() {
            inner.state = ConnectionState::Disconnected;
        }
    }

    /// Route one inbound text frame.
    fn dispatch(&self, text: &str) {
        let inbound = match Inbound::decode(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        match inbound {
            Inbound::Response { index, payload } => {
                // Take the completion out before running it; it may re-enter.
                let completion = self.inner.lock().pending.remove(&index);
                match completion {
                    Some(completion) => completion(payload),
                    None => tracing::debug!(index, "dropping response with no pending request"),
                }
            }
            Inbound::Broadcast(message) => {
                tracing::trace!(action = ?message.action, "server broadcast");
                let _ = self.events.send(ConnectionEvent::Message(message));
            }
            Inbound::Unroutable(payload) => {
                tracing::debug!(%payload, "dropping response with malformed index");
            }
        }
    }
}

// ============================================================================
// Driver task
// ============================================================================

/// Owns the socket; runs until destroyed, a deliberate close, or a failed
/// first connect.
struct Driver {
    shared: Arc<Shared>,
    dialer: Arc<dyn Dialer>,
    url: String,
    backoff: Backoff,
}

impl Driver {
    async fn run(self, ready: oneshot::Sender<ConnectionResult<()>>) {
        let mut ready = Some(ready);
        let mut attempt: u32 = 0;

        loop {
            let dialed = tokio::select! {
                _ = self.shared.shutdown.cancelled() => return,
                result = self.dialer.dial(&self.url) => result,
            };

            match dialed {
                Ok(socket) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    if !self.shared.opened(tx, ready.is_none()) {
                        return;
                    }
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Ok(()));
                    }
                    attempt = 0;

                    let Some(code) = self.pump(socket, rx).await else {
                        return;
                    };
                    if code == CLOSE_DELIBERATE {
                        self.shared.closed_deliberately();
                        return;
                    }
                    if !self.shared.lost(code) {
                        return;
                    }
                }
                Err(error) => {
                    if let Some(ready) = ready.take() {
                        tracing::warn!(url = %self.url, %error, "initial connection failed");
                        self.shared.failed_initial();
                        let _ = ready.send(Err(ConnectionError::Transport(error)));
                        return;
                    }
                    attempt += 1;
                    if !self.shared.retry_failed(attempt, &error) {
                        return;
                    }
                }
            }

            let delay = self.backoff.delay(attempt);
            tracing::debug!(attempt, ?delay, "scheduling reconnect");
            tokio::select! {
                _ = self.shared.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Move frames until the socket closes. Returns the close status, or
    /// `None` when the connection was destroyed.
    async fn pump(
        &self,
        socket: Socket,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) -> Option<u16> {
        let Socket {
            mut sink,
            mut stream,
        } = socket;

        loop {
            tokio::select! {
                _ = self.shared.shutdown.cancelled() => {
                    let _ = sink.close().await;
                    return None;
                }
                Some(frame) = outbound.recv() => {
                    if let Err(error) = sink.send(frame).await {
                        tracing::warn!(%error, "socket write failed");
                        return Some(CLOSE_ABNORMAL);
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(SocketFrame::Text(text))) => self.shared.dispatch(&text),
                    Some(Ok(SocketFrame::Close(code))) => return Some(code),
                    Some(Err(error)) => {
                        tracing::warn!(%error, "socket read failed");
                        return Some(CLOSE_ABNORMAL);
                    }
                    None => return Some(CLOSE_ABNORMAL),
                },
            }
        }
    }
}

// ============================================================================
// SocketTransport
// ============================================================================

/// [`Connection`] over a persistent, reconnecting socket.
pub struct SocketTransport {
    url: String,
    dialer: Arc<dyn Dialer>,
    backoff: Backoff,
    local: Option<Arc<dyn LocalHandler>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

impl SocketTransport {
    /// Create a transport for `url` using the TCP line dialer.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dialer: Arc::new(TcpDialer),
            backoff: Backoff::default(),
            local: None,
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Serve some methods locally instead of sending them.
    pub fn with_local_handler(mut self, local: Arc<dyn LocalHandler>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of requests waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.inner.lock().pending.len()
    }
}

#[async_trait]
impl Connection for SocketTransport {
    async fn init(&self) -> ConnectionResult<()> {
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                ConnectionState::Destroyed => return Err(ConnectionError::Closed),
                ConnectionState::Disconnected => inner.state = ConnectionState::Connecting,
                _ => return Err(ConnectionError::AlreadyStarted),
            }
        }

        tracing::info!(url = %self.url, "opening socket connection");

        let (ready_tx, ready_rx) = oneshot::channel();
        let driver = Driver {
            shared: Arc::clone(&self.shared),
            dialer: Arc::clone(&self.dialer),
            url: self.url.clone(),
            backoff: self.backoff,
        };
        tokio::spawn(driver.run(ready_tx));

        // Driver gone without answering means destroy() won the race.
        ready_rx.await.map_err(|_| ConnectionError::Closed)?
    }

    fn request(&self, method: &str, args: Value, completion: Completion) -> ConnectionResult<()> {
        if self.shared.inner.lock().state.is_destroyed() {
            return Err(ConnectionError::Closed);
        }

        if let Some(local) = &self.local {
            if let Some(payload) = local.handle(method, &args) {
                tracing::trace!(method, "request served locally");
                completion(payload);
                return Ok(());
            }
        }

        let mut inner = self.shared.inner.lock();
        if inner.state.is_destroyed() {
            return Err(ConnectionError::Closed);
        }
        let Some(outbound) = inner.outbound.clone() else {
            return Err(TransportError::NotOpen.into());
        };

        let index = inner.next_index;
        inner.next_index += 1;

        let frame = RequestEnvelope::new(index, method, &args).encode()?;
        outbound
            .send(frame)
            .map_err(|_| ConnectionError::Transport(TransportError::NotOpen))?;
        inner.pending.insert(index, completion);

        tracing::trace!(index, method, "request sent");
        Ok(())
    }

    fn destroy(&self) {
        let abandoned = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_destroyed() {
                return;
            }
            inner.state = ConnectionState::Destroyed;
            inner.outbound = None;
            std::mem::take(&mut inner.pending)
        };
        self.shared.shutdown.cancel();
        tracing::info!(
            url = %self.url,
            abandoned = abandoned.len(),
            "socket connection destroyed"
        );
    }

    fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ============================================================================
// Tests
// ============================================================================
