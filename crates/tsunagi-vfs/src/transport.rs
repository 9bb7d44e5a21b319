//! The transport contract.
//!
//! A [`Transport`] executes file operations for the mounts bound to it.
//! Each one speaks its own protocol: the socket connection, plain HTTP, or
//! an in-memory tree. The dispatcher has already resolved the mount and
//! checked read-only access by the time a transport is called.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{VfsError, VfsResult};
use crate::file::{FileData, FileRef};

/// Per-operation options, passed through to the transport untouched.
pub type Options = Map<String, Value>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport id, as referenced by mounts.
    fn name(&self) -> &str;

    // ========================================================================
    // Reading
    // ========================================================================

    async fn read(&self, file: &FileRef, options: &Options) -> VfsResult<Vec<u8>>;

    async fn exists(&self, file: &FileRef) -> VfsResult<bool>;

    /// Directory listing as wire data; the dispatcher builds references.
    async fn scandir(&self, dir: &FileRef, options: &Options) -> VfsResult<Vec<FileData>>;

    async fn url(&self, file: &FileRef) -> VfsResult<String>;

    /// Fetch the whole file for saving outside the desktop.
    async fn download(&self, file: &FileRef) -> VfsResult<Vec<u8>> {
        self.read(file, &Options::new()).await
    }

    // ========================================================================
    // Writing
    // ========================================================================

    async fn write(&self, file: &FileRef, data: &[u8], options: &Options) -> VfsResult<()>;

    /// Copy within this transport.
    async fn copy(&self, src: &FileRef, dest: &FileRef, options: &Options) -> VfsResult<()>;

    /// Move within this transport.
    async fn rename(&self, src: &FileRef, dest: &FileRef, options: &Options) -> VfsResult<()>;

    async fn unlink(&self, file: &FileRef, options: &Options) -> VfsResult<()>;

    async fn mkdir(&self, dir: &FileRef, options: &Options) -> VfsResult<()>;

    async fn trash(&self, file: &FileRef) -> VfsResult<()> {
        let _ = file;
        Err(VfsError::unsupported("trash", self.name()))
    }

    async fn untrash(&self, file: &FileRef) -> VfsResult<()> {
        let _ = file;
        Err(VfsError::unsupported("untrash", self.name()))
    }
}
