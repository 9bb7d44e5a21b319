//! In-memory transport.
//!
//! Backs scratch mounts like `tmp:///` and tests. All data is ephemeral.
//! Each `scheme:///` root is its own tree and always exists.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::constants::MEMORY_TRANSPORT;
use crate::error::{VfsError, VfsResult};
use crate::file::{FileData, FileKind, FileRef};
use crate::transport::{Options, Transport};

#[derive(Debug, Clone)]
enum Entry {
    File(Vec<u8>),
    Dir,
}

/// A parsed `scheme:///a/b` path with `.` and `..` resolved.
#[derive(Debug, Clone, PartialEq)]
struct Location {
    root: String,
    parts: Vec<String>,
}

impl Location {
    fn parse(path: &str) -> VfsResult<Self> {
        let (scheme, rest) = path
            .split_once("://")
            .ok_or_else(|| VfsError::validation(format!("not a mount path: {path}")))?;

        let mut parts = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s.to_string()),
            }
        }
        Ok(Self {
            root: format!("{scheme}:///"),
            parts,
        })
    }

    fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    fn key(&self) -> String {
        format!("{}{}", self.root, self.parts.join("/"))
    }

    /// Prefix shared by every descendant key.
    fn child_prefix(&self) -> String {
        if self.is_root() {
            self.root.clone()
        } else {
            format!("{}/", self.key())
        }
    }

    /// Keys of every proper ancestor below the root, outermost first.
    fn ancestor_keys(&self) -> impl Iterator<Item = String> + '_ {
        (1..self.parts.len()).map(|n| format!("{}{}", self.root, self.parts[..n].join("/")))
    }
}

/// In-memory transport.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create missing parent directories; fails if a parent is a file.
    fn ensure_parents(entries: &mut BTreeMap<String, Entry>, loc: &Location) -> VfsResult<()> {
        for key in loc.ancestor_keys() {
            match entries.get(&key) {
                Some(Entry::File(_)) => {
                    return Err(VfsError::validation(format!("not a directory: {key}")));
                }
                Some(Entry::Dir) => {}
                None => {
                    entries.insert(key, Entry::Dir);
                }
            }
        }
        Ok(())
    }

    /// The entry at `loc` plus all descendants, keyed relative to `loc`.
    fn subtree(entries: &BTreeMap<String, Entry>, loc: &Location) -> Vec<(String, Entry)> {
        let key = loc.key();
        let prefix = loc.child_prefix();
        let mut out = Vec::new();
        if let Some(entry) = entries.get(&key) {
            out.push((String::new(), entry.clone()));
        }
        out.extend(
            entries
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, e)| (format!("/{}", &k[prefix.len()..]), e.clone())),
        );
        out
    }

    fn remove_subtree(entries: &mut BTreeMap<String, Entry>, loc: &Location) {
        let prefix = loc.child_prefix();
        entries.remove(&loc.key());
        entries.retain(|k, _| !k.starts_with(&prefix));
    }

    /// Copy the subtree at `src` to `dest` inside one locked map.
    fn copy_locked(
        entries: &mut BTreeMap<String, Entry>,
        src: &Location,
        dest: &Location,
    ) -> VfsResult<()> {
        if src.is_root() || dest.is_root() {
            return Err(VfsError::validation("cannot copy a mount root"));
        }
        if dest.root == src.root && dest.parts.starts_with(&src.parts) {
            return Err(VfsError::validation(format!(
                "cannot copy {} into itself",
                src.key()
            )));
        }
        let tree = Self::subtree(entries, src);
        let Some((_, top)) = tree.first() else {
            return Err(VfsError::not_found(src.key()));
        };
        let dest_key = dest.key();
        match (top, entries.get(&dest_key)) {
            (Entry::File(_), Some(Entry::Dir)) => {
                return Err(VfsError::validation(format!("is a directory: {dest_key}")));
            }
            (Entry::Dir, Some(Entry::File(_))) => {
                return Err(VfsError::validation(format!("not a directory: {dest_key}")));
            }
            _ => {}
        }
        Self::ensure_parents(entries, dest)?;

        for (suffix, entry) in tree {
            entries.insert(format!("{dest_key}{suffix}"), entry);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        MEMORY_TRANSPORT
    }

    async fn read(&self, file: &FileRef, _options: &Options) -> VfsResult<Vec<u8>> {
        let loc = Location::parse(&file.path)?;
        match self.entries.read().get(&loc.key()) {
            Some(Entry::File(data)) => Ok(data.clone()),
            Some(Entry::Dir) => Err(VfsError::validation(format!("is a directory: {}", loc.key()))),
            None if loc.is_root() => Err(VfsError::validation(format!("is a directory: {}", loc.key()))),
            None => Err(VfsError::not_found(loc.key())),
        }
    }

    async fn exists(&self, file: &FileRef) -> VfsResult<bool> {
        let loc = Location::parse(&file.path)?;
        Ok(loc.is_root() || self.entries.read().contains_key(&loc.key()))
    }

    async fn scandir(&self, dir: &FileRef, _options: &Options) -> VfsResult<Vec<FileData>> {
        let loc = Location::parse(&dir.path)?;
        let entries = self.entries.read();
        if !loc.is_root() {
            match entries.get(&loc.key()) {
                Some(Entry::Dir) => {}
                Some(Entry::File(_)) => {
                    return Err(VfsError::validation(format!("not a directory: {}", loc.key())));
                }
                None => return Err(VfsError::not_found(loc.key())),
            }
        }

        let prefix = loc.child_prefix();
        let listing = entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(key, entry)| {
                let name = key[prefix.len()..].to_string();
                let (kind, size) = match entry {
                    Entry::File(data) => (FileKind::File, Some(data.len() as u64)),
                    Entry::Dir => (FileKind::Dir, None),
                };
                FileData {
                    filename: Some(name),
                    size,
                    ..FileData::new(key.clone(), kind)
                }
            })
            .collect();
        Ok(listing)
    }

    async fn url(&self, _file: &FileRef) -> VfsResult<String> {
        Err(VfsError::unsupported("url", MEMORY_TRANSPORT))
    }

    async fn write(&self, file: &FileRef, data: &[u8], _options: &Options) -> VfsResult<()> {
        let loc = Location::parse(&file.path)?;
        let key = loc.key();
        let mut entries = self.entries.write();
        if loc.is_root() || matches!(entries.get(&key), Some(Entry::Dir)) {
            return Err(VfsError::validation(format!("is a directory: {key}")));
        }
        Self::ensure_parents(&mut entries, &loc)?;
        entries.insert(key, Entry::File(data.to_vec()));
        Ok(())
    }

    async fn copy(&self, src: &FileRef, dest: &FileRef, _options: &Options) -> VfsResult<()> {
        let src = Location::parse(&src.path)?;
        let dest = Location::parse(&dest.path)?;
        Self::copy_locked(&mut self.entries.write(), &src, &dest)
    }

    async fn rename(&self, src: &FileRef, dest: &FileRef, _options: &Options) -> VfsResult<()> {
        let src = Location::parse(&src.path)?;
        let dest = Location::parse(&dest.path)?;
        if src == dest {
            return Ok(());
        }
        let mut entries = self.entries.write();
        Self::copy_locked(&mut entries, &src, &dest)?;
        Self::remove_subtree(&mut entries, &src);
        Ok(())
    }

    async fn unlink(&self, file: &FileRef, _options: &Options) -> VfsResult<()> {
        let loc = Location::parse(&file.path)?;
        if loc.is_root() {
            return Err(VfsError::validation("cannot remove a mount root"));
        }
        let mut entries = self.entries.write();
        if !entries.contains_key(&loc.key()) {
            return Err(VfsError::not_found(loc.key()));
        }
        Self::remove_subtree(&mut entries, &loc);
        Ok(())
    }

    async fn mkdir(&self, dir: &FileRef, _options: &Options) -> VfsResult<()> {
        let loc = Location::parse(&dir.path)?;
        let key = loc.key();
        let mut entries = self.entries.write();
        if loc.is_root() || entries.contains_key(&key) {
            return Err(VfsError::already_exists(key));
        }
        Self::ensure_parents(&mut entries, &loc)?;
        entries.insert(key, Entry::Dir);
        Ok(())
    }
}
