//! The connection contract.
//!
//! A [`Connection`] is an RPC endpoint with an online/offline lifecycle.
//! Calls are fire-and-complete: [`Connection::request`] either dispatches
//! the call and stores the [`Completion`] until the matching response
//! arrives, or fails synchronously without ever running it.
//!
//! Implementations are picked at construction time:
//! [`SocketTransport`](crate::SocketTransport) for a live server and
//! [`StandaloneConnection`](crate::StandaloneConnection) for running
//! without one.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::envelope;
use crate::error::{ConnectionError, ConnectionResult};
use crate::events::{ConnectionEvent, ConnectionState};

/// Stored response handler for one outstanding call.
///
/// Runs at most once with the response payload (`_index` stripped).
/// Dropping it without running is how abandonment works.
pub type Completion = Box<dyn FnOnce(Value) + Send + 'static>;

/// Box a closure as a [`Completion`].
pub fn completion<F>(f: F) -> Completion
where
    F: FnOnce(Value) + Send + 'static,
{
    Box::new(f)
}

/// Serves selected methods locally before they reach the network.
pub trait LocalHandler: Send + Sync {
    /// Return the response payload for `method`, or `None` to pass it on.
    fn handle(&self, method: &str, args: &Value) -> Option<Value>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish initial connectivity.
    ///
    /// Fails only when the very first connect fails; losses after that are
    /// reported as [`ConnectionEvent::Offline`].
    async fn init(&self) -> ConnectionResult<()>;

    /// Dispatch `method` with `args`.
    ///
    /// `Ok` means the call is in flight and `completion` will run at most
    /// once. `Err` means nothing was sent and `completion` was dropped.
    fn request(&self, method: &str, args: Value, completion: Completion) -> ConnectionResult<()>;

    /// Release the transport. Idempotent.
    ///
    /// Pending completions are dropped without running.
    fn destroy(&self);

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Subscribe to lifecycle notifications and server broadcasts.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;

    fn is_offline(&self) -> bool {
        !self.state().is_online()
    }

    /// Await the response to `method` and decode its `{error, result}` body.
    async fn call(&self, method: &str, args: Value) -> ConnectionResult<Value> {
        let (tx, rx) = oneshot::channel();
        self.request(
            method,
            args,
            completion(move |payload| {
                let _ = tx.send(payload);
            }),
        )?;
        let payload = rx.await.map_err(|_| ConnectionError::Abandoned)?;
        envelope::into_result(payload)
    }
}
