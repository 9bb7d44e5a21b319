//! CLI configuration constants.

/// Directory under the platform config dir holding tsunagi's files.
pub const CONFIG_DIR_NAME: &str = "tsunagi";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Server HTTP file endpoint used to build download URLs.
pub const DEFAULT_FS_URI: &str = "http://127.0.0.1:8000/FS";

/// Log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";
