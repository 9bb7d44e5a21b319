//! Scripted in-memory dialer for tests.
//!
//! Each [`ScriptedDialer::dial`] pops the next scripted outcome. A scripted
//! socket hands the test a [`ServerEnd`] to read what the client sent and to
//! push frames, close codes, or a plain disconnect (drop) back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::TransportError;
use crate::socket::{Dialer, Socket, SocketFrame};

/// The far end of a scripted socket.
pub struct ServerEnd {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<Result<SocketFrame, TransportError>>,
}

impl ServerEnd {
    /// Next frame the client sent, decoded as JSON.
    pub async fn recv(&mut self) -> Option<Value> {
        let text = self.from_client.next().await?;
        serde_json::from_str(&text).ok()
    }

    /// Push a JSON frame to the client.
    pub fn send(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    /// Push a raw text frame to the client.
    pub fn send_text(&self, text: &str) {
        let _ = self
            .to_client
            .unbounded_send(Ok(SocketFrame::Text(text.to_string())));
    }

    /// Close with a status code.
    pub fn close(self, code: u16) {
        let _ = self.to_client.unbounded_send(Ok(SocketFrame::Close(code)));
    }

    /// Fail the client's read side.
    pub fn fail(self) {
        let _ = self.to_client.unbounded_send(Err(TransportError::Io(
            std::io::Error::from(std::io::ErrorKind::ConnectionReset),
        )));
    }

    /// Let the connection drain what has been pushed so far.
    ///
    /// Under a paused clock this returns once every other task is idle.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Build a connected socket pair.
pub fn socket_pair() -> (Socket, ServerEnd) {
    let (client_tx, from_client) = mpsc::unbounded::<String>();
    let (to_client, client_rx) = mpsc::unbounded();

    let sink = client_tx.sink_map_err(|_| TransportError::NotOpen);
    let socket = Socket {
        sink: Box::pin(sink),
        stream: Box::pin(client_rx),
    };
    (
        socket,
        ServerEnd {
            from_client,
            to_client,
        },
    )
}

/// Dialer that replays a script of outcomes.
///
/// An empty script refuses the connection.
#[derive(Default)]
pub struct ScriptedDialer {
    script: Mutex<VecDeque<Result<Socket, TransportError>>>,
    dials: AtomicUsize,
}

impl ScriptedDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful dial; returns the server side of that socket.
    pub fn push_socket(&self) -> ServerEnd {
        let (socket, server) = socket_pair();
        self.script.lock().push_back(Ok(socket));
        server
    }

    /// Queue a failed dial.
    pub fn push_error(&self, error: TransportError) {
        self.script.lock().push_back(Err(error));
    }

    /// How many times `dial` has been called.
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, url: &str) -> Result<Socket, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(url, "scripted dial");
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )))
        })
    }
}
