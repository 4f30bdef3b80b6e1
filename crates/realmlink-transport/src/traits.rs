use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

/// Destination hint that matches any peer origin.
pub const ANY_ORIGIN: &str = "*";

/// Kind of event a listener is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Inbound messages from the peer realm.
    Message,
    /// Any other host event (e.g. `messageerror`).
    Other(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Message => f.write_str("message"),
            EventKind::Other(name) => f.write_str(name),
        }
    }
}

/// An event delivered to transport listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// The structurally-cloned message payload.
    pub data: Value,
}

impl MessageEvent {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

/// A callback invoked for every matching event.
pub type Listener = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Handle returned by [`Transport::subscribe`], used to unsubscribe.
///
/// Ids are unique for the lifetime of the process, so a wrapper transport can
/// hand out its own ids without colliding with the ones it wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a fresh listener id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A duplex, message-oriented, origin-scoped realm channel.
///
/// Implementations must deliver messages reliably and in order, and must
/// perform their own origin checks. The core never inspects the transport
/// beyond this contract.
pub trait Transport: Send + Sync {
    /// Send a message to the peer realm.
    ///
    /// `target_origin` is a destination hint passed through unchanged from the
    /// caller (e.g. a security-origin restriction, or [`ANY_ORIGIN`]).
    fn send(&self, message: Value, target_origin: &str) -> Result<()>;

    /// Register a listener for events of `kind`.
    fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId;

    /// Remove a listener previously registered for `kind`.
    ///
    /// Returns `false` if no such listener was registered.
    fn unsubscribe(&self, kind: &EventKind, id: ListenerId) -> bool;
}
