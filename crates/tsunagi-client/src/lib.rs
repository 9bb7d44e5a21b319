//! Tsunagi connection library
//!
//! Turns an unreliable duplex socket into a request/response RPC channel
//! with in-order broadcast delivery and automatic reconnection.
//!
//! - [`Connection`]: the contract (`init`, `request`, `destroy`, events)
//! - [`SocketTransport`]: live server over a reconnecting socket
//! - [`StandaloneConnection`]: in-memory stand-in when there is no server
//! - [`SettingsStore`]: debounced settings saves over any connection

pub mod backoff;
pub mod connection;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod events;
pub mod settings;
pub mod socket;
pub mod standalone;
pub mod transport;

#[cfg(any(test, feature = "test-mock"))]
pub mod testing;

pub use backoff::Backoff;
pub use connection::{Completion, Connection, LocalHandler, completion};
pub use error::{ConnectionError, ConnectionResult, TransportError};
pub use events::{ConnectionEvent, ConnectionState, ServerMessage};
pub use settings::SettingsStore;
pub use socket::{Dialer, Socket, SocketFrame, TcpDialer};
pub use standalone::StandaloneConnection;
pub use transport::SocketTransport;
