//! In-memory connection for running without a server.
//!
//! Methods registered with [`StandaloneConnection::with_handler`] are served
//! locally; every other method answers with an error payload, the way a
//! desktop running from static files reports operations it cannot perform.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::connection::{Completion, Connection};
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::envelope::response_payload;
use crate::error::{ConnectionError, ConnectionResult, TransportError};
use crate::events::{ConnectionEvent, ConnectionState};

type Handler = Box<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

pub struct StandaloneConnection {
    handlers: HashMap<String, Handler>,
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl std::fmt::Debug for StandaloneConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneConnection")
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl Default for StandaloneConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl StandaloneConnection {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            handlers: HashMap::new(),
            state: Mutex::new(ConnectionState::Disconnected),
            events,
        }
    }

    /// Serve `method` with `handler`.
    pub fn with_handler<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Box::new(handler));
        self
    }

    /// Publish a server-style broadcast to subscribers.
    pub fn broadcast(&self, payload: Value) {
        let message = crate::events::ServerMessage::from_payload(payload);
        let _ = self.events.send(ConnectionEvent::Message(message));
    }
}

#[async_trait]
impl Connection for StandaloneConnection {
    async fn init(&self) -> ConnectionResult<()> {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Destroyed => Err(ConnectionError::Closed),
            ConnectionState::Connected => Err(ConnectionError::AlreadyStarted),
            _ => {
                *state = ConnectionState::Connected;
                tracing::info!("running in standalone mode");
                Ok(())
            }
        }
    }

    fn request(&self, method: &str, args: Value, completion: Completion) -> ConnectionResult<()> {
        match *self.state.lock() {
            ConnectionState::Destroyed => return Err(ConnectionError::Closed),
            ConnectionState::Connected => {}
            _ => return Err(TransportError::NotOpen.into()),
        }

        let result = match self.handlers.get(method) {
            Some(handler) => handler(&args),
            None => Err(format!("'{method}' is not available in standalone mode")),
        };
        completion(response_payload(result));
        Ok(())
    }

    fn destroy(&self) {
        *self.state.lock() = ConnectionState::Destroyed;
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}
