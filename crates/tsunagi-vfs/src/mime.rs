//! Extension to MIME type lookup.
//!
//! Extensions are matched case-sensitively and include the leading dot
//! (`.txt`, not `txt`). A miss falls back to [`DEFAULT_MIME`].

use std::collections::HashMap;

use crate::constants::{DEFAULT_MIME, DEFAULT_MIME_MAPPING};

/// Extension to MIME mapping.
#[derive(Debug, Clone)]
pub struct MimeTable {
    mapping: HashMap<String, String>,
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeTable {
    /// Table with the built-in mapping.
    pub fn new() -> Self {
        Self::empty().with_overrides(
            DEFAULT_MIME_MAPPING
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string())),
        )
    }

    /// Table with no mappings; every guess is the default type.
    pub fn empty() -> Self {
        Self {
            mapping: HashMap::new(),
        }
    }

    /// Merge entries over the current mapping. Later entries win.
    ///
    /// Keys without a leading dot get one.
    pub fn with_overrides<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (ext, mime) in entries {
            let ext = if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            };
            self.mapping.insert(ext, mime);
        }
        self
    }

    /// Look up an extension (with leading dot).
    pub fn lookup(&self, ext: &str) -> Option<&str> {
        self.mapping.get(ext).map(String::as_str)
    }

    /// MIME type for a file path, falling back to the default type.
    pub fn guess(&self, path: &str) -> &str {
        extension(path)
            .and_then(|ext| self.lookup(ext))
            .unwrap_or(DEFAULT_MIME)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Extension of the last path segment, including the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').map(|i| &name[i..])
}
