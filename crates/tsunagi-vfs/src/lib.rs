//! Tsunagi virtual filesystem
//!
//! Routes file operations on `scheme:///path` references to the transport
//! that owns the path:
//!
//! - [`MountRegistry`]: named mounts matched by prefix or regex, first match wins
//! - [`FileRef`]: file/directory value object with MIME inference
//! - [`Vfs`]: the dispatcher (read-only checks, cross-transport copy/move)
//! - [`Transport`]: per-protocol backends (`remote`, `web`, `memory`)
//! - [`WatchBus`]: local and server-pushed file change notifications

pub mod backends;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod file;
pub mod mime;
pub mod mount;
pub mod transport;
pub mod watch;

pub use backends::{MemoryTransport, RemoteTransport, WebTransport};
pub use dispatch::Vfs;
pub use error::{VfsError, VfsResult};
pub use file::{FileData, FileKind, FileRef};
pub use mime::MimeTable;
pub use mount::{Matcher, Mount, MountRegistry};
pub use transport::{Options, Transport};
pub use watch::{WatchBus, WatchEvent, WatchKind, WatchSource, spawn_forwarder};
