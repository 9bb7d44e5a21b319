//! Transport implementations.

mod memory;
mod remote;
mod web;

pub use memory::MemoryTransport;
pub use remote::RemoteTransport;
pub use web::WebTransport;
