//! File references.
//!
//! A [`FileRef`] describes a file or directory somewhere in the mount
//! namespace (`home:///docs/a.txt`, `https://host/x.png`). It carries no
//! handles and performs no I/O: every operation forwards to a [`Vfs`].
//!
//! The MIME type is guessed once, when the reference is built, unless one
//! was given explicitly.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::dispatch::Vfs;
use crate::error::{VfsError, VfsResult};
use crate::mime::MimeTable;
use crate::transport::Options;

/// File or directory.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileKind {
    #[default]
    File,
    Dir,
}

/// Wire form of a file reference, as exchanged with servers and stored in
/// scandir listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shortcut: bool,
}

impl FileData {
    pub fn new(path: impl Into<String>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            ..Default::default()
        }
    }
}

/// A file or directory in the mount namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRef {
    pub path: String,
    pub filename: String,
    pub kind: FileKind,
    pub size: Option<u64>,
    pub mime: Option<String>,
    pub id: Option<String>,
    pub shortcut: bool,
}

impl FileRef {
    /// Reference a file at `path`. Fails on an empty path.
    pub fn new(path: impl Into<String>, mime: &MimeTable) -> VfsResult<Self> {
        Self::from_data(FileData::new(path, FileKind::File), mime)
    }

    /// Reference a directory at `path`. Fails on an empty path.
    pub fn dir(path: impl Into<String>) -> VfsResult<Self> {
        Self::from_data(FileData::new(path, FileKind::Dir), &MimeTable::empty())
    }

    /// Reference `path` with a hint: a MIME type (contains `/`) or a kind
    /// (`file`, `dir`).
    pub fn with_hint(path: impl Into<String>, hint: &str, mime: &MimeTable) -> VfsResult<Self> {
        let mut data = FileData::new(path, FileKind::File);
        if hint.contains('/') {
            data.mime = Some(hint.to_string());
        } else {
            data.kind = hint
                .parse()
                .map_err(|_| VfsError::validation(format!("unknown file kind '{hint}'")))?;
        }
        Self::from_data(data, mime)
    }

    /// Build from wire data, deriving what is missing.
    pub fn from_data(data: FileData, table: &MimeTable) -> VfsResult<Self> {
        if data.path.is_empty() {
            return Err(VfsError::validation("file reference needs a path"));
        }
        let filename = match data.filename {
            Some(name) if !name.is_empty() => name,
            _ => filename(&data.path).to_string(),
        };
        let mime = data.mime.or_else(|| {
            let skip = data.kind == FileKind::Dir || data.shortcut || data.path.ends_with('/');
            (!skip).then(|| table.guess(&data.path).to_string())
        });

        Ok(Self {
            path: data.path,
            filename,
            kind: data.kind,
            size: data.size,
            mime,
            id: data.id,
            shortcut: data.shortcut,
        })
    }

    /// Wire form of this reference.
    pub fn data(&self) -> FileData {
        FileData {
            path: self.path.clone(),
            filename: Some(self.filename.clone()),
            kind: self.kind,
            size: self.size,
            mime: self.mime.clone(),
            id: self.id.clone(),
            shortcut: self.shortcut,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    // ========================================================================
    // Operations (forwarded to the dispatcher)
    // ========================================================================

    pub async fn read(&self, vfs: &Vfs, options: &Options) -> VfsResult<Vec<u8>> {
        vfs.read(self, options).await
    }

    pub async fn write(&self, vfs: &Vfs, data: &[u8], options: &Options) -> VfsResult<()> {
        vfs.write(self, data, options).await
    }

    pub async fn copy_to(&self, vfs: &Vfs, dest: &FileRef, options: &Options) -> VfsResult<()> {
        vfs.copy(self, dest, options).await
    }

    /// Move to `dest`; on success this reference describes the new location.
    pub async fn move_to(&mut self, vfs: &Vfs, dest: &FileRef, options: &Options) -> VfsResult<()> {
        let moved = vfs.move_file(self, dest, options).await?;
        *self = moved;
        Ok(())
    }

    pub async fn rename(&mut self, vfs: &Vfs, dest: &FileRef, options: &Options) -> VfsResult<()> {
        self.move_to(vfs, dest, options).await
    }

    pub async fn unlink(&self, vfs: &Vfs, options: &Options) -> VfsResult<()> {
        vfs.unlink(self, options).await
    }

    pub async fn delete(&self, vfs: &Vfs, options: &Options) -> VfsResult<()> {
        self.unlink(vfs, options).await
    }

    pub async fn mkdir(&self, vfs: &Vfs, options: &Options) -> VfsResult<()> {
        vfs.mkdir(self, options).await
    }

    pub async fn exists(&self, vfs: &Vfs) -> VfsResult<bool> {
        vfs.exists(self).await
    }

    pub async fn scandir(&self, vfs: &Vfs, options: &Options) -> VfsResult<Vec<FileRef>> {
        vfs.scandir(self, options).await
    }

    pub async fn trash(&self, vfs: &Vfs) -> VfsResult<()> {
        vfs.trash(self).await
    }

    pub async fn untrash(&self, vfs: &Vfs) -> VfsResult<()> {
        vfs.untrash(self).await
    }

    pub async fn url(&self, vfs: &Vfs) -> VfsResult<String> {
        vfs.url(self).await
    }

    pub async fn download(&self, vfs: &Vfs) -> VfsResult<Vec<u8>> {
        vfs.download(self).await
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Last path segment, ignoring the `scheme://` prefix and trailing slashes.
///
/// `home:///x/y.txt` → `y.txt`, `home:///docs/` → `docs`, `home:///` → ``.
pub fn filename(path: &str) -> &str {
    let rest = match path.find("://") {
        Some(i) => &path[i + 3..],
        None => path,
    };
    rest.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}
