//! Realm transport abstraction.
//!
//! A transport is a duplex, message-oriented, origin-scoped channel between two
//! realms. Messages are structurally cloned: they are owned `serde_json::Value`s
//! that carry no identity and no functions.
//!
//! This is the lowest layer of realmlink. Everything else builds on top of the
//! [`Transport`] trait provided here.

pub mod error;
pub mod listeners;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use listeners::ListenerSet;
pub use memory::MemoryRealm;
pub use traits::{EventKind, Listener, ListenerId, MessageEvent, Transport, ANY_ORIGIN};
