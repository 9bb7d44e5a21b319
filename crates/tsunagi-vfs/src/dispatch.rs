//! File operation dispatcher.
//!
//! [`Vfs`] resolves each file reference to its mount, checks read-only
//! access locally, and forwards the operation to the mount's transport.
//!
//! ```text
//!   FileRef ─▶ MountRegistry::resolve ─▶ Mount { transport, read_only }
//!                                            │
//!                 read-only + mutating? ─────┼──▶ Err(ReadOnly), no transport call
//!                                            ▼
//!                                   transports[mount.transport]
//! ```
//!
//! Copy and move between mounts on different transports fall back to
//! read-then-write (move also unlinks the source), since no native
//! primitive spans two protocols.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::file::FileRef;
use crate::mime::MimeTable;
use crate::mount::{Mount, MountRegistry};
use crate::transport::{Options, Transport};
use crate::watch::{WatchBus, WatchEvent, WatchKind};

/// A mount together with the transport serving it.
type Route = (Arc<Mount>, Arc<dyn Transport>);

/// Routes file operations to transports.
pub struct Vfs {
    registry: Arc<MountRegistry>,
    transports: HashMap<String, Arc<dyn Transport>>,
    mime: MimeTable,
    watch: WatchBus,
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("registry", &self.registry)
            .field("transports", &self.transports.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Vfs {
    pub fn new(registry: Arc<MountRegistry>, mime: MimeTable) -> Self {
        Self {
            registry,
            transports: HashMap::new(),
            mime,
            watch: WatchBus::new(),
        }
    }

    /// Serve mounts whose transport id is `transport.name()`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports
            .insert(transport.name().to_string(), transport);
        self
    }

    pub fn registry(&self) -> &Arc<MountRegistry> {
        &self.registry
    }

    pub fn mime(&self) -> &MimeTable {
        &self.mime
    }

    pub fn watch(&self) -> &WatchBus {
        &self.watch
    }

    pub fn has_transport(&self, name: &str) -> bool {
        self.transports.contains_key(name)
    }

    /// Reference a file, guessing its MIME type from this dispatcher's table.
    pub fn file(&self, path: impl Into<String>) -> VfsResult<FileRef> {
        FileRef::new(path, &self.mime)
    }

    /// Mount and transport owning `file`.
    pub fn route(&self, file: &FileRef) -> VfsResult<Route> {
        let mount = self.registry.resolve(&file.path)?;
        let transport = self.transports.get(&mount.transport).cloned().ok_or_else(|| {
            VfsError::validation(format!(
                "mount '{}' uses unknown transport '{}'",
                mount.name, mount.transport
            ))
        })?;
        Ok((mount, transport))
    }

    /// Route for a mutating operation: fails on read-only mounts.
    fn route_writable(&self, file: &FileRef, op: &'static str) -> VfsResult<Route> {
        let (mount, transport) = self.route(file)?;
        if mount.read_only {
            tracing::debug!(op, path = %file.path, mount = %mount.name, "rejected on read-only mount");
            return Err(VfsError::read_only(&mount.name));
        }
        Ok((mount, transport))
    }

    fn emit(&self, kind: WatchKind, file: &FileRef) {
        self.watch.emit(WatchEvent::local(kind, file.clone()));
    }

    // ========================================================================
    // Reading
    // ========================================================================

    pub async fn read(&self, file: &FileRef, options: &Options) -> VfsResult<Vec<u8>> {
        let (_, transport) = self.route(file)?;
        transport.read(file, options).await
    }

    pub async fn exists(&self, file: &FileRef) -> VfsResult<bool> {
        let (_, transport) = self.route(file)?;
        transport.exists(file).await
    }

    pub async fn scandir(&self, dir: &FileRef, options: &Options) -> VfsResult<Vec<FileRef>> {
        let (_, transport) = self.route(dir)?;
        let listing = transport.scandir(dir, options).await?;
        listing
            .into_iter()
            .map(|data| FileRef::from_data(data, &self.mime))
            .collect()
    }

    pub async fn url(&self, file: &FileRef) -> VfsResult<String> {
        let (_, transport) = self.route(file)?;
        transport.url(file).await
    }

    pub async fn download(&self, file: &FileRef) -> VfsResult<Vec<u8>> {
        let (_, transport) = self.route(file)?;
        transport.download(file).await
    }

    // ========================================================================
    // Writing
    // ========================================================================

    pub async fn write(&self, file: &FileRef, data: &[u8], options: &Options) -> VfsResult<()> {
        let (_, transport) = self.route_writable(file, "write")?;
        transport.write(file, data, options).await?;
        self.emit(WatchKind::Write, file);
        Ok(())
    }

    pub async fn mkdir(&self, dir: &FileRef, options: &Options) -> VfsResult<()> {
        let (_, transport) = self.route_writable(dir, "mkdir")?;
        transport.mkdir(dir, options).await?;
        self.emit(WatchKind::Mkdir, dir);
        Ok(())
    }

    pub async fn unlink(&self, file: &FileRef, options: &Options) -> VfsResult<()> {
        let (_, transport) = self.route_writable(file, "unlink")?;
        transport.unlink(file, options).await?;
        self.emit(WatchKind::Delete, file);
        Ok(())
    }

    pub async fn delete(&self, file: &FileRef, options: &Options) -> VfsResult<()> {
        self.unlink(file, options).await
    }

    pub async fn trash(&self, file: &FileRef) -> VfsResult<()> {
        let (_, transport) = self.route_writable(file, "trash")?;
        transport.trash(file).await?;
        self.emit(WatchKind::Trash, file);
        Ok(())
    }

    pub async fn untrash(&self, file: &FileRef) -> VfsResult<()> {
        let (_, transport) = self.route_writable(file, "untrash")?;
        transport.untrash(file).await?;
        self.emit(WatchKind::Untrash, file);
        Ok(())
    }

    /// Copy `src` to `dest`. Only the destination must be writable.
    pub async fn copy(&self, src: &FileRef, dest: &FileRef, options: &Options) -> VfsResult<()> {
        let (src_mount, src_transport) = self.route(src)?;
        let (dest_mount, dest_transport) = self.route_writable(dest, "copy")?;

        if src_mount.transport == dest_mount.transport {
            src_transport.copy(src, dest, options).await?;
        } else {
            tracing::debug!(
                from = %src_mount.transport,
                to = %dest_mount.transport,
                "cross-transport copy"
            );
            let data = src_transport.read(src, options).await?;
            dest_transport.write(dest, &data, options).await?;
        }

        self.emit(WatchKind::Copy, dest);
        Ok(())
    }

    /// Move `src` to `dest`. Returns the reference for the new location.
    ///
    /// Both ends must be writable.
    pub async fn move_file(
        &self,
        src: &FileRef,
        dest: &FileRef,
        options: &Options,
    ) -> VfsResult<FileRef> {
        let (src_mount, src_transport) = self.route_writable(src, "move")?;
        let (dest_mount, dest_transport) = self.route_writable(dest, "move")?;

        if src_mount.transport == dest_mount.transport {
            src_transport.rename(src, dest, options).await?;
        } else {
            tracing::debug!(
                from = %src_mount.transport,
                to = %dest_mount.transport,
                "cross-transport move"
            );
            let data = src_transport.read(src, options).await?;
            dest_transport.write(dest, &data, options).await?;
            src_transport.unlink(src, options).await?;
        }

        let mut moved = dest.clone();
        moved.kind = src.kind;
        if moved.size.is_none() {
            moved.size = src.size;
        }
        self.emit(WatchKind::Move, &moved);
        Ok(moved)
    }

    pub async fn rename(
        &self,
        src: &FileRef,
        dest: &FileRef,
        options: &Options,
    ) -> VfsResult<FileRef> {
        self.move_file(src, dest, options).await
    }
}
