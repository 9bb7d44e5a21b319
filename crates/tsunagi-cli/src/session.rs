//! Session: the composition root.
//!
//! Builds the connection, the mount registry, the transports and the
//! dispatcher from a [`Config`], wires the connection's `vfs:watch`
//! broadcasts into the dispatcher's watch bus, and owns startup/shutdown of
//! those plus the settings store.
//!
//! ```text
//!   Config ─▶ Connection (socket | standalone)
//!         ─▶ MountRegistry (http + configured mounts)
//!         ─▶ Vfs { remote(conn), web, memory }
//!   start():    conn.init(), settings.init(), spawn watch forwarder
//!   shutdown(): stop forwarder, settings.destroy(), conn.destroy()
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tsunagi_client::{
    Connection, ConnectionError, SettingsStore, SocketTransport, StandaloneConnection,
};
use tsunagi_vfs::{
    MemoryTransport, MountRegistry, RemoteTransport, Vfs, VfsError, WebTransport, spawn_forwarder,
};

use crate::config::{Config, ConnectionKind};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("mount error: {0}")]
    Mount(#[from] VfsError),

    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("mount '{mount}' uses unknown transport '{transport}'")]
    UnknownTransport { mount: String, transport: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One client session: a connection plus the filesystem routed over it.
pub struct Session {
    conn: Arc<dyn Connection>,
    vfs: Arc<Vfs>,
    settings: SettingsStore,
    forwarder: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.conn.state())
            .field("vfs", &self.vfs)
            .finish()
    }
}

impl Session {
    /// Build everything from config. Nothing connects until [`start`](Self::start).
    pub fn new(config: &Config) -> SessionResult<Self> {
        let conn: Arc<dyn Connection> = match config.connection.kind {
            ConnectionKind::Socket => Arc::new(SocketTransport::new(&config.connection.url)),
            ConnectionKind::Standalone => Arc::new(StandaloneConnection::new()),
        };
        Self::with_connection(config, conn)
    }

    /// Build around an existing connection.
    pub fn with_connection(config: &Config, conn: Arc<dyn Connection>) -> SessionResult<Self> {
        let registry = Arc::new(MountRegistry::new());
        for mount in &config.mounts {
            registry.add(mount.to_mount()?)?;
        }

        let vfs = Vfs::new(Arc::clone(&registry), config.mime_table())
            .with_transport(Arc::new(RemoteTransport::new(
                Arc::clone(&conn),
                &config.connection.fs_uri,
            )))
            .with_transport(Arc::new(WebTransport::new()))
            .with_transport(Arc::new(MemoryTransport::new()));

        if let Some(mount) = registry
            .list()
            .into_iter()
            .find(|m| !vfs.has_transport(&m.transport))
        {
            return Err(SessionError::UnknownTransport {
                mount: mount.name.clone(),
                transport: mount.transport.clone(),
            });
        }

        Ok(Self {
            settings: SettingsStore::new(Arc::clone(&conn)),
            conn,
            vfs: Arc::new(vfs),
            forwarder: None,
        })
    }

    /// Connect and start forwarding server file notifications.
    pub async fn start(&mut self) -> SessionResult<()> {
        self.conn.init().await?;
        self.settings.init()?;
        self.forwarder = Some(spawn_forwarder(
            self.conn.as_ref(),
            self.vfs.watch().clone(),
            self.vfs.mime().clone(),
        ));
        tracing::info!(state = ?self.conn.state(), "session started");
        Ok(())
    }

    /// Tear down. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.settings.destroy();
        self.conn.destroy();
        tracing::debug!("session shut down");
    }

    pub fn vfs(&self) -> &Arc<Vfs> {
        &self.vfs
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountConfig;
    use serde_json::{Value, json};
    use tsunagi_client::ConnectionState;
    use tsunagi_vfs::{Options, WatchKind};

    fn standalone_config() -> Config {
        let mut config = Config::default();
        config.connection.kind = ConnectionKind::Standalone;
        config
    }

    #[tokio::test]
    async fn test_standalone_session() {
        let mut session = Session::new(&standalone_config()).unwrap();
        session.start().await.unwrap();
        assert_eq!(session.connection().state(), ConnectionState::Connected);

        let vfs = session.vfs();
        let names: Vec<_> = vfs.registry().list().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, ["http", "home", "tmp"]);

        // Scratch mount works without a server
        let file = vfs.file("tmp:///a.txt").unwrap();
        file.write(vfs, b"hi", &Options::new()).await.unwrap();
        assert_eq!(file.read(vfs, &Options::new()).await.unwrap(), b"hi");

        // The remote mount reports what standalone mode cannot do
        let err = vfs.read(&vfs.file("home:///a.txt").unwrap(), &Options::new()).await.unwrap_err();
        assert!(matches!(err, VfsError::Remote(_)));

        session.shutdown();
        assert_eq!(session.connection().state(), ConnectionState::Destroyed);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_server_watch_reaches_vfs_subscribers() {
        let conn = Arc::new(
            StandaloneConnection::new().with_handler("FS:exists", |_| Ok(Value::Bool(true))),
        );
        let mut session =
            Session::with_connection(&standalone_config(), conn.clone() as Arc<dyn Connection>)
                .unwrap();
        session.start().await.unwrap();
        let mut watch = session.vfs().watch().subscribe();

        conn.broadcast(json!({
            "action": "vfs:watch",
            "args": {"event": "trash", "file": {"path": "home:///old.txt"}}
        }));
        let event = watch.recv().await.unwrap();
        assert_eq!(event.kind, WatchKind::Trash);
        assert_eq!(event.file.filename, "old.txt");

        let vfs = session.vfs();
        assert!(vfs.exists(&vfs.file("home:///x").unwrap()).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_saved_through_connection() {
        let saved = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&saved);
        let conn = StandaloneConnection::new().with_handler("settings", move |args| {
            seen.lock().push(args.clone());
            Ok(Value::Bool(true))
        });
        let mut session = Session::with_connection(&standalone_config(), Arc::new(conn)).unwrap();
        session.start().await.unwrap();

        session.settings().save(Some("desktop"), json!({"theme": "dark"})).unwrap();
        session.settings().save(Some("desktop"), json!({"theme": "light"})).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(*saved.lock(), [json!({"pool": "desktop", "settings": {"theme": "light"}})]);

        session.shutdown();
        assert!(session.settings().save(None, json!(1)).is_err());
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let mut config = standalone_config();
        config.mounts.push(MountConfig::new("gdrive", "google", "gdrive:///"));
        let err = Session::new(&config).unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnknownTransport { ref transport, .. } if transport == "google"
        ));
    }

    #[test]
    fn test_shadowed_mount_rejected() {
        let mut config = standalone_config();
        config.mounts.push(MountConfig::new("docs", "remote", "home:///docs/"));
        assert!(matches!(Session::new(&config), Err(SessionError::Mount(_))));
    }

    #[tokio::test]
    async fn test_socket_start_fails_without_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = Config::default();
        config.connection.url = format!("tcp://{addr}/");
        let mut session = Session::new(&config).unwrap();
        assert!(matches!(session.start().await, Err(SessionError::Connection(_))));
    }
}
