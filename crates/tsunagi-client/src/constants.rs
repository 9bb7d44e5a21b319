//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default socket endpoint for local development.
pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:8000/";

/// Delay before the first reconnect attempt after a lost connection.
pub const FIRST_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Delay before every reconnect attempt after the first one.
///
/// The policy is a flat two-tier schedule, not exponential.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(10_000);

/// Close status a server sends for an expected shutdown. No reconnect follows.
pub const CLOSE_DELIBERATE: u16 = 3001;

/// Close status reported when the stream ends without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Capacity of the event broadcast channel.
///
/// Slow subscribers lag rather than stall the socket pump.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Method prefix routed to the filesystem endpoint (`/FS/...`).
pub const FS_METHOD_PREFIX: &str = "FS:";

/// Broadcast action the server uses for filesystem change notifications.
pub const WATCH_ACTION: &str = "vfs:watch";

/// Server method that persists a settings pool.
pub const SETTINGS_METHOD: &str = "settings";

/// Quiet period before a settings save is sent.
///
/// Further saves to the same pool within the window restart it.
pub const SETTINGS_SAVE_DELAY: Duration = Duration::from_millis(250);
