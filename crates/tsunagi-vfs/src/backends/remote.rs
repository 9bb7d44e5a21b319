//! Socket-backed transport.
//!
//! Every operation becomes an `FS:<op>` call on the shared [`Connection`].
//! File bodies travel base64-encoded; listings come back as arrays of file
//! data objects. Download URLs are built locally from the server's file URI.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tsunagi_client::Connection;
use tsunagi_client::constants::FS_METHOD_PREFIX;

use crate::constants::REMOTE_TRANSPORT;
use crate::error::{VfsError, VfsResult};
use crate::file::{FileData, FileRef};
use crate::transport::{Options, Transport};

/// Transport that forwards file operations over a [`Connection`].
pub struct RemoteTransport {
    conn: Arc<dyn Connection>,
    fs_uri: String,
}

impl std::fmt::Debug for RemoteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTransport")
            .field("fs_uri", &self.fs_uri)
            .field("state", &self.conn.state())
            .finish()
    }
}

impl RemoteTransport {
    /// `fs_uri` is the server's HTTP file endpoint, e.g. `http://host/FS`.
    pub fn new(conn: Arc<dyn Connection>, fs_uri: impl Into<String>) -> Self {
        Self {
            conn,
            fs_uri: fs_uri.into(),
        }
    }

    async fn call(&self, op: &str, args: Value) -> VfsResult<Value> {
        let method = format!("{FS_METHOD_PREFIX}{op}");
        tracing::trace!(%method, "remote fs call");
        Ok(self.conn.call(&method, args).await?)
    }

    fn path_args(file: &FileRef, options: &Options) -> Value {
        json!({ "path": file.path, "options": options })
    }

    fn pair_args(src: &FileRef, dest: &FileRef, options: &Options) -> Value {
        json!({ "src": src.path, "dest": dest.path, "options": options })
    }
}

fn malformed(op: &str, result: &Value) -> VfsError {
    VfsError::remote(format!("malformed {op} response: {result}"))
}

#[async_trait]
impl Transport for RemoteTransport {
    fn name(&self) -> &str {
        REMOTE_TRANSPORT
    }

    async fn read(&self, file: &FileRef, options: &Options) -> VfsResult<Vec<u8>> {
        let result = self.call("read", Self::path_args(file, options)).await?;
        let encoded = result.as_str().ok_or_else(|| malformed("read", &result))?;
        BASE64
            .decode(encoded)
            .map_err(|e| VfsError::remote(format!("bad base64 in read response: {e}")))
    }

    async fn exists(&self, file: &FileRef) -> VfsResult<bool> {
        let result = self.call("exists", json!({ "path": file.path })).await?;
        result.as_bool().ok_or_else(|| malformed("exists", &result))
    }

    async fn scandir(&self, dir: &FileRef, options: &Options) -> VfsResult<Vec<FileData>> {
        let result = self.call("scandir", Self::path_args(dir, options)).await?;
        serde_json::from_value(result.clone()).map_err(|_| malformed("scandir", &result))
    }

    async fn url(&self, file: &FileRef) -> VfsResult<String> {
        Ok(format!("{}/get/{}", self.fs_uri.trim_end_matches('/'), file.path))
    }

    async fn write(&self, file: &FileRef, data: &[u8], options: &Options) -> VfsResult<()> {
        let args = json!({
            "path": file.path,
            "data": BASE64.encode(data),
            "options": options,
        });
        self.call("write", args).await?;
        Ok(())
    }

    async fn copy(&self, src: &FileRef, dest: &FileRef, options: &Options) -> VfsResult<()> {
        self.call("copy", Self::pair_args(src, dest, options)).await?;
        Ok(())
    }

    async fn rename(&self, src: &FileRef, dest: &FileRef, options: &Options) -> VfsResult<()> {
        self.call("move", Self::pair_args(src, dest, options)).await?;
        Ok(())
    }

    async fn unlink(&self, file: &FileRef, options: &Options) -> VfsResult<()> {
        self.call("unlink", Self::path_args(file, options)).await?;
        Ok(())
    }

    async fn mkdir(&self, dir: &FileRef, options: &Options) -> VfsResult<()> {
        self.call("mkdir", Self::path_args(dir, options)).await?;
        Ok(())
    }

    async fn trash(&self, file: &FileRef) -> VfsResult<()> {
        self.call("trash", json!({ "path": file.path })).await?;
        Ok(())
    }

    async fn untrash(&self, file: &FileRef) -> VfsResult<()> {
        self.call("untrash", json!({ "path": file.path })).await?;
        Ok(())
    }
}
