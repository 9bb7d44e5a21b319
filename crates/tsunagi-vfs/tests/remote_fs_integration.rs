//! End-to-end: dispatcher → remote transport → socket → TCP file server.
//!
//! The server keeps files in a map and answers `/FS/*` requests the way a
//! desktop file server does, pushing a `vfs:watch` broadcast after writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::codec::{Framed, LinesCodec};

use tsunagi_client::{Connection, SocketTransport};
use tsunagi_vfs::{
    MemoryTransport, MimeTable, Mount, MountRegistry, Options, RemoteTransport, Vfs, VfsError,
    WatchKind, WatchSource, spawn_forwarder,
};

/// Serve one client until it disconnects.
async fn file_server(listener: TcpListener) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut conn = Framed::new(stream, LinesCodec::new());
    let mut files: HashMap<String, String> = HashMap::new();

    while let Some(Ok(line)) = conn.next().await {
        let req: Value = serde_json::from_str(&line).unwrap();
        let args = &req["args"];
        let path = args["path"].as_str().unwrap_or_default().to_string();

        let (error, result, broadcast) = match req["path"].as_str().unwrap() {
            "/FS/write" => {
                files.insert(path.clone(), args["data"].as_str().unwrap().to_string());
                let watch = json!({
                    "action": "vfs:watch",
                    "args": {"event": "write", "file": {"path": path}}
                });
                (Value::Null, json!(true), Some(watch))
            }
            "/FS/read" => match files.get(&path) {
                Some(data) => (Value::Null, json!(data), None),
                None => (json!(format!("{path}: not found")), Value::Null, None),
            },
            "/FS/exists" => (Value::Null, json!(files.contains_key(&path)), None),
            other => (json!(format!("unknown endpoint {other}")), Value::Null, None),
        };

        let reply = json!({"_index": req["_index"], "error": error, "result": result});
        conn.send(reply.to_string()).await.unwrap();
        if let Some(watch) = broadcast {
            conn.send(watch.to_string()).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_remote_mount_round_trip_and_watch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("tcp://{}/", listener.local_addr().unwrap());
    let server = tokio::spawn(file_server(listener));

    let conn: Arc<dyn Connection> = Arc::new(SocketTransport::new(url));
    conn.init().await.unwrap();

    let registry = Arc::new(MountRegistry::new());
    registry.add(Mount::new("home", "remote", "home:///")).unwrap();
    registry.add(Mount::new("tmp", "memory", "tmp:///")).unwrap();

    let vfs = Vfs::new(registry, MimeTable::new())
        .with_transport(Arc::new(RemoteTransport::new(Arc::clone(&conn), "http://fs")))
        .with_transport(Arc::new(MemoryTransport::new()));
    let mut watch = vfs.watch().subscribe();
    let forwarder = spawn_forwarder(conn.as_ref(), vfs.watch().clone(), vfs.mime().clone());

    let notes = vfs.file("home:///notes.txt").unwrap();
    assert!(!notes.exists(&vfs).await.unwrap());
    notes.write(&vfs, b"remember the milk", &Options::new()).await.unwrap();
    assert_eq!(
        notes.read(&vfs, &Options::new()).await.unwrap(),
        b"remember the milk"
    );

    // One local event, plus the server's broadcast re-published; either may land first
    let mut events = Vec::new();
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(5), watch.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, WatchKind::Write);
        assert_eq!(event.file.path, "home:///notes.txt");
        events.push(event.source);
    }
    events.sort_by_key(|source| *source == WatchSource::Remote);
    assert_eq!(events, [WatchSource::Local, WatchSource::Remote]);

    // Cross-transport copy reads over the socket and writes into memory
    let scratch = vfs.file("tmp:///notes.txt").unwrap();
    notes.copy_to(&vfs, &scratch, &Options::new()).await.unwrap();
    assert_eq!(
        scratch.read(&vfs, &Options::new()).await.unwrap(),
        b"remember the milk"
    );

    let err = vfs
        .read(&vfs.file("home:///missing.txt").unwrap(), &Options::new())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Remote(msg) if msg.contains("not found")));

    conn.destroy();
    forwarder.abort();
    server.await.unwrap();
}
