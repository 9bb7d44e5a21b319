//! TOML configuration.
//!
//! Loaded from `<config_dir>/tsunagi/config.toml` unless a path is given.
//! A missing default file means built-in defaults; a missing explicit file
//! is an error.
//!
//! ```toml
//! [connection]
//! kind = "socket"                 # or "standalone"
//! url = "tcp://127.0.0.1:8000/"
//! fs_uri = "http://127.0.0.1:8000/FS"
//!
//! [mime]
//! ".rs" = "text/x-rust"
//!
//! [[mounts]]
//! name = "home"
//! transport = "remote"
//! root = "home:///"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsunagi_client::constants::DEFAULT_ENDPOINT;
use tsunagi_vfs::constants::{MEMORY_TRANSPORT, REMOTE_TRANSPORT};
use tsunagi_vfs::{Matcher, MimeTable, Mount, VfsResult};

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_FS_URI};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which [`Connection`](tsunagi_client::Connection) to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Socket,
    Standalone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    /// Socket endpoint, `tcp://host:port/path`.
    pub url: String,
    /// Base of download URLs for the remote transport.
    pub fs_uri: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            kind: ConnectionKind::default(),
            url: DEFAULT_ENDPOINT.to_string(),
            fs_uri: DEFAULT_FS_URI.to_string(),
        }
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    pub name: String,
    pub transport: String,
    pub root: String,
    /// Regex matcher; the root prefix is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub searchable: bool,
    #[serde(default = "yes")]
    pub enabled: bool,
}

impl MountConfig {
    pub fn new(name: &str, transport: &str, root: &str) -> Self {
        Self {
            name: name.to_string(),
            transport: transport.to_string(),
            root: root.to_string(),
            pattern: None,
            read_only: false,
            visible: true,
            searchable: true,
            enabled: true,
        }
    }

    /// Build the registry entry. Fails on a bad pattern.
    pub fn to_mount(&self) -> VfsResult<Mount> {
        let mut mount = Mount::new(&self.name, &self.transport, &self.root)
            .read_only(self.read_only)
            .visible(self.visible)
            .searchable(self.searchable)
            .enabled(self.enabled);
        if let Some(pattern) = &self.pattern {
            mount = mount.with_matcher(Matcher::pattern(pattern)?);
        }
        Ok(mount)
    }
}

fn default_mounts() -> Vec<MountConfig> {
    vec![
        MountConfig::new("home", REMOTE_TRANSPORT, "home:///"),
        MountConfig::new("tmp", MEMORY_TRANSPORT, "tmp:///"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Extension → MIME entries merged over the built-in table.
    #[serde(default)]
    pub mime: BTreeMap<String, String>,
    /// Replaces the default mounts when present.
    #[serde(default = "default_mounts")]
    pub mounts: Vec<MountConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            mime: BTreeMap::new(),
            mounts: default_mounts(),
        }
    }
}

impl Config {
    /// `<config_dir>/tsunagi/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the explicit path, else the default path if it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            _ => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Built-in MIME table with this config's entries merged over it.
    pub fn mime_table(&self) -> MimeTable {
        MimeTable::new().with_overrides(self.mime.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.connection.kind, ConnectionKind::Socket);
        assert_eq!(config.connection.url, DEFAULT_ENDPOINT);
        let names: Vec<_> = config.mounts.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["home", "tmp"]);
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            kind = "standalone"
            fs_uri = "https://desk.example/FS"

            [mime]
            ".rs" = "text/x-rust"
            "txt" = "text/x-notes"

            [[mounts]]
            name = "dist"
            transport = "remote"
            root = "osjs:///"
            read_only = true
            searchable = false

            [[mounts]]
            name = "shared"
            transport = "remote"
            root = "shared:///"
            pattern = "^(shared|group):///"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.kind, ConnectionKind::Standalone);
        assert_eq!(config.connection.url, DEFAULT_ENDPOINT);
        assert_eq!(config.mounts.len(), 2);
        assert!(config.mounts[0].read_only && config.mounts[0].visible);
        assert!(!config.mounts[0].searchable);

        let shared = config.mounts[1].to_mount().unwrap();
        assert!(shared.matches("group:///x"));

        let mime = config.mime_table();
        assert_eq!(mime.guess("main.rs"), "text/x-rust");
        assert_eq!(mime.guess("a.txt"), "text/x-notes");
        assert_eq!(mime.guess("a.png"), "image/png");
    }

    #[test]
    fn test_bad_pattern() {
        let mut mount = MountConfig::new("x", "remote", "x:///");
        mount.pattern = Some("(".into());
        assert!(mount.to_mount().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[connection]\nurl = \"tcp://10.0.0.1:9000/\"").unwrap();

        let config = Config::discover(Some(&path)).unwrap();
        assert_eq!(config.connection.url, "tcp://10.0.0.1:9000/");

        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        std::fs::write(&path, "connection = 3").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
