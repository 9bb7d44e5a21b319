//! Tsunagi command-line client
//!
//! Loads a [`Config`], builds a [`Session`] (connection, mounts, transports)
//! and runs one [`Command`] against it.

pub mod commands;
pub mod config;
pub mod constants;
pub mod session;

pub use commands::{Cli, Command, execute};
pub use config::{Config, ConfigError, ConnectionConfig, ConnectionKind, MountConfig};
pub use session::{Session, SessionError, SessionResult};
