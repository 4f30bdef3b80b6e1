//! Realm connections.
//!
//! A [`Connection`] is the live link between two realms. Each side offers one
//! exports value; the handshake swaps them, so each side ends up with the
//! other's exports as its imports. Functions found in the exports are called
//! remotely: an imported function is a proxy that sends a `functionApply`
//! control message and resolves when the matching `functionReturn` comes back.
//!
//! Errors raised while handling messages after the handshake are published on
//! [`Connection::errors`] instead of being returned to anyone.

pub mod connection;
pub mod control;
pub mod error;
mod proxy;
mod table;

pub use connection::{connect, Connection, ConnectionConfig, ConnectionState};
pub use control::{ControlMessage, FunctionApply, FunctionReturn, FUNCTION_APPLY, FUNCTION_RETURN};
pub use error::{PeerError, Result};
