//! Mount registry with first-match routing.
//!
//! Mounts are tried in registration order and the first enabled one whose
//! matcher accepts the path owns it. The built-in `http` mount is always
//! registered first, so plain URLs can never be captured by a later mount.
//!
//! Registration rejects mounts an earlier mount would always shadow:
//!
//! - prefix `home:///docs/` after prefix `home:///`
//! - a pattern identical to an earlier pattern
//! - anything after a catch-all pattern (`.*`)
//! - prefix `https://cdn/` after a pattern like `^https?://` that matches the
//!   prefix and has no end assertion, so it matches every extension too

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use regex::Regex;

use crate::constants::{HTTP_MOUNT, HTTP_PATTERN, WEB_TRANSPORT};
use crate::error::{VfsError, VfsResult};

/// How a mount recognizes its paths.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Path starts with this string.
    Prefix(String),
    /// Path matches this regex.
    Pattern(Regex),
}

impl Matcher {
    /// Compile a regex matcher.
    pub fn pattern(source: &str) -> VfsResult<Self> {
        Regex::new(source)
            .map(Self::Pattern)
            .map_err(|e| VfsError::validation(format!("bad mount pattern '{source}': {e}")))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Pattern(re) => re.is_match(path),
        }
    }

    /// Returns true if every path `other` accepts is also accepted here.
    ///
    /// Conservative: only cases that can be decided syntactically.
    fn shadows(&self, other: &Matcher) -> bool {
        match (self, other) {
            (Self::Pattern(re), _) if is_catch_all(re) => true,
            (Self::Prefix(a), Self::Prefix(b)) => b.starts_with(a.as_str()),
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            (Self::Pattern(re), Self::Prefix(p)) => !has_end_assertion(re) && re.is_match(p),
            _ => false,
        }
    }

    fn validate(&self) -> VfsResult<()> {
        match self {
            Self::Prefix(p) if p.is_empty() => {
                Err(VfsError::validation("mount prefix must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prefix(p) => write!(f, "{p}*"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

fn is_catch_all(re: &Regex) -> bool {
    matches!(re.as_str(), "" | "^" | ".*" | "^.*" | "^.*$" | "(?s).*" | "^(?s).*")
}

/// Assertions that can hold at the end of a prefix but fail once it is extended.
fn has_end_assertion(re: &Regex) -> bool {
    let src = re.as_str();
    src.contains('$') || ["\\z", "\\Z", "\\b", "\\B"].iter().any(|a| src.contains(a))
}

/// A named mount point.
#[derive(Debug, Clone)]
pub struct Mount {
    pub name: String,
    /// Id of the transport that serves this mount.
    pub transport: String,
    /// Root path, e.g. `home:///`.
    pub root: String,
    pub matcher: Matcher,
    pub read_only: bool,
    pub enabled: bool,
    /// Shown in file browsers.
    pub visible: bool,
    /// Included in searches.
    pub searchable: bool,
    /// Built in; cannot be removed.
    pub special: bool,
}

impl Mount {
    /// A writable, visible, enabled mount matching paths under `root`.
    pub fn new(
        name: impl Into<String>,
        transport: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        let root = root.into();
        Self {
            name: name.into(),
            transport: transport.into(),
            matcher: Matcher::Prefix(root.clone()),
            root,
            read_only: false,
            enabled: true,
            visible: true,
            searchable: true,
            special: false,
        }
    }

    /// The built-in mount for `http://` and `https://` URLs.
    pub fn http() -> Self {
        Self {
            name: HTTP_MOUNT.to_string(),
            transport: WEB_TRANSPORT.to_string(),
            root: "http://".to_string(),
            matcher: Matcher::Pattern(
                Regex::new(HTTP_PATTERN).expect("HTTP_PATTERN is a valid regex"),
            ),
            read_only: true,
            enabled: true,
            visible: false,
            searchable: false,
            special: true,
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }
}

/// Routes paths to mounts.
///
/// Read-mostly: lookups take a shared lock and return an `Arc` snapshot, so
/// an operation that already resolved its mount is unaffected by a later
/// `remove` or `set_enabled`.
pub struct MountRegistry {
    mounts: RwLock<IndexMap<String, Arc<Mount>>>,
}

impl std::fmt::Debug for MountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRegistry")
            .field("mounts", &self.mounts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MountRegistry {
    /// Create a registry holding only the built-in `http` mount.
    pub fn new() -> Self {
        let http = Mount::http();
        let mut mounts = IndexMap::new();
        mounts.insert(http.name.clone(), Arc::new(http));
        Self {
            mounts: RwLock::new(mounts),
        }
    }

    /// Register a mount after all existing ones.
    pub fn add(&self, mount: Mount) -> VfsResult<()> {
        if mount.name.is_empty() {
            return Err(VfsError::validation("mount name must not be empty"));
        }
        mount.matcher.validate()?;

        let mut mounts = self.mounts.write();
        if mounts.contains_key(&mount.name) {
            return Err(VfsError::validation(format!(
                "mount '{}' already exists",
                mount.name
            )));
        }
        if let Some(earlier) = mounts
            .values()
            .find(|m| m.matcher.shadows(&mount.matcher))
        {
            return Err(VfsError::validation(format!(
                "mount '{}' ({}) is unreachable behind '{}' ({})",
                mount.name, mount.matcher, earlier.name, earlier.matcher
            )));
        }

        tracing::info!(
            name = %mount.name,
            transport = %mount.transport,
            matcher = %mount.matcher,
            read_only = mount.read_only,
            "mount added"
        );
        mounts.insert(mount.name.clone(), Arc::new(mount));
        Ok(())
    }

    /// First enabled mount whose matcher accepts `path`.
    pub fn resolve(&self, path: &str) -> VfsResult<Arc<Mount>> {
        let mounts = self.mounts.read();
        mounts
            .values()
            .find(|m| m.enabled && m.matches(path))
            .cloned()
            .ok_or_else(|| VfsError::no_mount(path))
    }

    /// Remove a mount. The built-in `http` mount cannot be removed.
    pub fn remove(&self, name: &str) -> VfsResult<Arc<Mount>> {
        let mut mounts = self.mounts.write();
        match mounts.get(name) {
            None => return Err(VfsError::not_found(format!("mount '{name}'"))),
            Some(m) if m.special => {
                return Err(VfsError::validation(format!(
                    "mount '{name}' is built in and cannot be removed"
                )));
            }
            Some(_) => {}
        }
        let removed = mounts
            .shift_remove(name)
            .ok_or_else(|| VfsError::not_found(format!("mount '{name}'")))?;
        tracing::info!(name, "mount removed");
        Ok(removed)
    }

    /// Enable or disable a mount in place.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> VfsResult<()> {
        let mut mounts = self.mounts.write();
        let slot = mounts
            .get_mut(name)
            .ok_or_else(|| VfsError::not_found(format!("mount '{name}'")))?;
        if slot.enabled != enabled {
            let mut updated = Mount::clone(slot);
            updated.enabled = enabled;
            *slot = Arc::new(updated);
            tracing::info!(name, enabled, "mount toggled");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mount>> {
        self.mounts.read().get(name).cloned()
    }

    /// All mounts in registration order.
    pub fn list(&self) -> Vec<Arc<Mount>> {
        self.mounts.read().values().cloned().collect()
    }

    /// Enabled mounts shown in file browsers.
    pub fn visible(&self) -> Vec<Arc<Mount>> {
        self.filtered(|m| m.enabled && m.visible)
    }

    /// Enabled mounts included in searches.
    pub fn searchable(&self) -> Vec<Arc<Mount>> {
        self.filtered(|m| m.enabled && m.searchable)
    }

    fn filtered(&self, keep: impl Fn(&Mount) -> bool) -> Vec<Arc<Mount>> {
        self.mounts
            .read()
            .values()
            .filter(|m| keep(m))
            .cloned()
            .collect()
    }
}
