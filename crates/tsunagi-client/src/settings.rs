//! Debounced settings persistence.
//!
//! [`SettingsStore`] saves settings pools through the server's `settings`
//! method. Saves to the same pool within the debounce window collapse into
//! one call carrying the latest value; each pool has its own timer.
//!
//! ```text
//!   save(pool, v1) ─┐
//!   save(pool, v2) ─┼─▶ worker: pending[pool] = v2, due = now + 250ms
//!                   │             │
//!                   │             └─ due ─▶ call("settings", {pool, settings: v2})
//!   flush() ────────┘  sends everything pending now
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::connection::Connection;
use crate::constants::{SETTINGS_METHOD, SETTINGS_SAVE_DELAY};
use crate::error::{ConnectionError, ConnectionResult};

type Pool = Option<String>;

enum Command {
    Save { pool: Pool, settings: Value },
    Flush(oneshot::Sender<()>),
}

/// Settings persistence over a [`Connection`].
pub struct SettingsStore {
    conn: Arc<dyn Connection>,
    delay: Duration,
    worker: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("delay", &self.delay)
            .field("running", &self.worker.lock().is_some())
            .finish()
    }
}

impl SettingsStore {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            delay: SETTINGS_SAVE_DELAY,
            worker: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Start the save worker. Must run inside a tokio runtime.
    pub fn init(&self) -> ConnectionResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(ConnectionError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(Arc::clone(&self.conn), self.delay, rx));
        *worker = Some(tx);
        Ok(())
    }

    /// Queue `settings` for `pool`, replacing anything not yet sent.
    pub fn save(&self, pool: Option<&str>, settings: Value) -> ConnectionResult<()> {
        self.send(Command::Save {
            pool: pool.map(str::to_owned),
            settings,
        })
    }

    /// Send every pending save now and wait until they are done.
    pub async fn flush(&self) -> ConnectionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| ConnectionError::Closed)
    }

    /// Stop the worker. Saves still waiting for their timer are dropped.
    /// Idempotent.
    pub fn destroy(&self) {
        // Dropping the sender ends the worker loop
        self.worker.lock().take();
    }

    fn send(&self, command: Command) -> ConnectionResult<()> {
        let worker = self.worker.lock();
        let tx = worker.as_ref().ok_or(ConnectionError::Closed)?;
        tx.send(command).map_err(|_| ConnectionError::Closed)
    }
}

impl Drop for SettingsStore {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn run(conn: Arc<dyn Connection>, delay: Duration, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut pending: HashMap<Pool, (Value, Instant)> = HashMap::new();

    loop {
        let next_due = pending.values().map(|(_, due)| *due).min();
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Save { pool, settings }) => {
                    pending.insert(pool, (settings, Instant::now() + delay));
                }
                Some(Command::Flush(done)) => {
                    for (pool, (settings, _)) in pending.drain() {
                        persist(conn.as_ref(), pool, settings).await;
                    }
                    let _ = done.send(());
                }
                None => break,
            },
            _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                let due: Vec<Pool> = pending
                    .iter()
                    .filter(|(_, (_, at))| *at <= now)
                    .map(|(pool, _)| pool.clone())
                    .collect();
                for pool in due {
                    if let Some((settings, _)) = pending.remove(&pool) {
                        persist(conn.as_ref(), pool, settings).await;
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        tracing::warn!(dropped = pending.len(), "settings store stopped with unsaved pools");
    }
}

async fn persist(conn: &dyn Connection, pool: Pool, settings: Value) {
    let args = json!({"pool": pool, "settings": settings});
    match conn.call(SETTINGS_METHOD, args).await {
        Ok(_) => tracing::debug!(?pool, "settings saved"),
        Err(error) => tracing::warn!(?pool, %error, "failed to save settings"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standalone::StandaloneConnection;

    /// Standalone connection recording every `settings` call.
    async fn recording() -> (Arc<dyn Connection>, Arc<Mutex<Vec<Value>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let conn = StandaloneConnection::new().with_handler(SETTINGS_METHOD, move |args| {
            seen.lock().push(args.clone());
            Ok(Value::Bool(true))
        });
        conn.init().await.unwrap();
        let conn: Arc<dyn Connection> = Arc::new(conn);
        (conn, calls)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_coalesce_within_window() {
        let (conn, calls) = recording().await;
        let store = SettingsStore::new(conn);
        store.init().unwrap();

        store.save(Some("desktop"), json!({"theme": "dark"})).unwrap();
        sleep_ms(100).await;
        store.save(Some("desktop"), json!({"theme": "light"})).unwrap();

        // Second save restarted the window
        sleep_ms(249).await;
        assert!(calls.lock().is_empty());

        sleep_ms(2).await;
        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], json!({"pool": "desktop", "settings": {"theme": "light"}}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pools_have_separate_timers() {
        let (conn, calls) = recording().await;
        let store = SettingsStore::new(conn);
        store.init().unwrap();

        store.save(Some("desktop"), json!(1)).unwrap();
        sleep_ms(200).await;
        store.save(None, json!(2)).unwrap();

        sleep_ms(60).await;
        assert_eq!(*calls.lock(), [json!({"pool": "desktop", "settings": 1})]);

        sleep_ms(200).await;
        assert_eq!(calls.lock()[1], json!({"pool": null, "settings": 2}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_sends_immediately() {
        let (conn, calls) = recording().await;
        let store = SettingsStore::new(conn);
        store.init().unwrap();

        store.save(Some("a"), json!(1)).unwrap();
        store.save(Some("b"), json!(2)).unwrap();
        store.flush().await.unwrap();
        assert_eq!(calls.lock().len(), 2);

        // Nothing left for the timer
        sleep_ms(1000).await;
        assert_eq!(calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle() {
        let (conn, calls) = recording().await;
        let store = SettingsStore::new(conn);
        assert!(matches!(store.save(None, json!(1)), Err(ConnectionError::Closed)));

        store.init().unwrap();
        assert!(matches!(store.init(), Err(ConnectionError::AlreadyStarted)));

        store.save(Some("desktop"), json!(1)).unwrap();
        store.destroy();
        store.destroy();
        assert!(store.save(None, json!(2)).is_err());
        assert!(store.flush().await.is_err());

        sleep_ms(1000).await;
        assert!(calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_does_not_stop_worker() {
        let conn = Arc::new(StandaloneConnection::new());
        conn.init().await.unwrap();
        let store = SettingsStore::new(conn).with_delay(Duration::from_millis(10));
        store.init().unwrap();

        // No handler: the standalone connection answers with an error payload
        store.save(None, json!(1)).unwrap();
        sleep_ms(20).await;
        store.save(None, json!(2)).unwrap();
        store.flush().await.unwrap();
    }
}
