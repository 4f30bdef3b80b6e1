//! Live references and asynchronous calls between isolated realms.
//!
//! Two realms that can only exchange copied JSON messages connect, swap one
//! exports value each, and then use the other side's values as if they were
//! shared: repeated references stay identical and exported asynchronous
//! functions can be called remotely.
//!
//! # Crate Structure
//!
//! - [`transport`]: message transport contract and the in-memory realm pair
//! - [`frame`]: tagged channel multiplexing and byte-stream framing
//! - [`codec`]: value model and the reference-preserving dictionary codec
//! - [`peer`]: connections, handshake and remote function calls
//!
//! ```no_run
//! # async fn run() -> realmlink::peer::Result<()> {
//! use realmlink::codec::{Function, Value};
//! use realmlink::peer::{connect, ConnectionConfig};
//! use realmlink::transport::MemoryRealm;
//!
//! let (a, b) = MemoryRealm::pair("a", "b");
//! let add = Function::new_async(2, |args| async move {
//!     let sum: f64 = args.iter().filter_map(Value::as_number).sum();
//!     Ok(Value::from(sum))
//! });
//!
//! let (server, client) = tokio::join!(
//!     connect(ConnectionConfig::over(a, "b").with_exports(add)),
//!     connect(ConnectionConfig::over(b, "a")),
//! );
//! let (_server, client) = (server?, client?);
//! let add = client.imports().as_function().cloned();
//! # let _ = add;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use realmlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use realmlink_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use realmlink_codec::*;
}

/// Re-export connection types.
pub mod peer {
    pub use realmlink_peer::*;
}
