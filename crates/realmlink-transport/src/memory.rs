use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::listeners::ListenerSet;
use crate::traits::{EventKind, Listener, ListenerId, MessageEvent, Transport, ANY_ORIGIN};

#[derive(Clone)]
struct Target {
    origin: String,
    listeners: Arc<ListenerSet>,
}

/// In-process realm endpoint.
///
/// Each realm has an origin and dispatches the messages sent by its connected
/// peer to its own listeners. Delivery is synchronous and ordered: `send`
/// returns after every listener on the peer has run. A message sent while the
/// peer has no message listeners is dropped, as it would be by a host realm
/// that nobody listens to yet.
pub struct MemoryRealm {
    origin: String,
    listeners: Arc<ListenerSet>,
    target: Mutex<Option<Target>>,
}

impl MemoryRealm {
    /// Create an unconnected realm with the given origin.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            listeners: Arc::new(ListenerSet::new()),
            target: Mutex::new(None),
        }
    }

    /// Create two realms connected to each other.
    pub fn pair(origin_a: &str, origin_b: &str) -> (Arc<Self>, Arc<Self>) {
        let a = Self::new(origin_a);
        let b = Self::new(origin_b);
        a.connect(&b);
        b.connect(&a);
        (Arc::new(a), Arc::new(b))
    }

    /// Direct this realm's outgoing messages to `peer`.
    pub fn connect(&self, peer: &MemoryRealm) {
        debug!(from = %self.origin, to = %peer.origin, "connecting memory realm");
        *self.lock_target() = Some(Target {
            origin: peer.origin.clone(),
            listeners: peer.listeners.clone(),
        });
    }

    /// Detach from the peer. Subsequent sends fail with [`TransportError::Closed`].
    pub fn disconnect(&self) {
        debug!(origin = %self.origin, "disconnecting memory realm");
        *self.lock_target() = None;
    }

    /// This realm's origin.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Dispatch an event to this realm's own listeners.
    ///
    /// Used to raise host events (including non-message kinds) locally.
    pub fn dispatch(&self, kind: &EventKind, event: &MessageEvent) -> usize {
        self.listeners.dispatch(kind, event)
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.listeners.count(kind)
    }

    fn lock_target(&self) -> MutexGuard<'_, Option<Target>> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryRealm {
    fn send(&self, message: Value, target_origin: &str) -> Result<()> {
        let target = self.lock_target().clone().ok_or(TransportError::Closed)?;

        if target_origin != ANY_ORIGIN && target_origin != target.origin {
            return Err(TransportError::OriginMismatch {
                expected: target.origin,
                actual: target_origin.to_string(),
            });
        }

        let delivered = target
            .listeners
            .dispatch(&EventKind::Message, &MessageEvent::new(message));
        trace!(from = %self.origin, to = %target.origin, delivered, "message sent");
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.listeners.add(kind.clone(), listener);
        trace!(origin = %self.origin, %kind, id = id.get(), "listener added");
        id
    }

    fn unsubscribe(&self, kind: &EventKind, id: ListenerId) -> bool {
        let removed = self.listeners.remove(kind, id);
        trace!(origin = %self.origin, %kind, id = id.get(), removed, "listener removed");
        removed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn recorder() -> (Listener, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Arc::new(move |event: &MessageEvent| {
            sink.lock().unwrap().push(event.data.clone());
        });
        (listener, seen)
    }

    #[test]
    fn delivers_to_peer_in_order() {
        let (a, b) = MemoryRealm::pair("a", "b");
        let (listener, seen) = recorder();
        b.subscribe(EventKind::Message, listener);

        a.send(json!("first"), "b").unwrap();
        a.send(json!({"second": [1, 2]}), "b").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![json!("first"), json!({"second": [1, 2]})]
        );
    }

    #[test]
    fn does_not_echo_to_sender() {
        let (a, _b) = MemoryRealm::pair("a", "b");
        let (listener, seen) = recorder();
        a.subscribe(EventKind::Message, listener);

        a.send(json!(1), ANY_ORIGIN).unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn origin_mismatch_rejected() {
        let (a, _b) = MemoryRealm::pair("a", "b");
        let err = a.send(json!(1), "https://evil.example").unwrap_err();
        assert!(matches!(err, TransportError::OriginMismatch { .. }));
    }

    #[test]
    fn message_without_listener_is_dropped() {
        let (a, b) = MemoryRealm::pair("a", "b");
        a.send(json!("lost"), "b").unwrap();

        let (listener, seen) = recorder();
        b.subscribe(EventKind::Message, listener);
        a.send(json!("kept"), "b").unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!("kept")]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (a, b) = MemoryRealm::pair("a", "b");
        let (listener, seen) = recorder();
        let id = b.subscribe(EventKind::Message, listener);

        assert!(b.unsubscribe(&EventKind::Message, id));
        a.send(json!(1), "b").unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(b.listener_count(&EventKind::Message), 0);
    }

    #[test]
    fn disconnected_realm_fails_send() {
        let (a, _b) = MemoryRealm::pair("a", "b");
        a.disconnect();
        assert!(matches!(
            a.send(json!(1), "b"),
            Err(TransportError::Closed)
        ));
    }
}
