use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realmlink_transport::{EventKind, Listener, ListenerId, MessageEvent, Result, Transport};
use serde_json::Value;
use tracing::trace;

use crate::envelope::Envelope;

/// One tagged conversation over a shared transport.
///
/// Outgoing messages are wrapped in an [`Envelope`] carrying the tag. Message
/// listeners only see payloads of envelopes with the same tag; everything else
/// on the transport is ignored. Non-message event kinds pass straight through.
///
/// `Multiplexed` is itself a [`Transport`], so it can be handed to anything
/// that expects one (including another `Multiplexed`).
pub struct Multiplexed {
    transport: Arc<dyn Transport>,
    tag: String,
    // Ids handed out by this wrapper -> ids of the filters on the transport.
    filters: Mutex<HashMap<ListenerId, ListenerId>>,
}

impl Multiplexed {
    /// Wrap `transport` for the channel `tag`.
    pub fn new(transport: Arc<dyn Transport>, tag: impl Into<String>) -> Self {
        Self {
            transport,
            tag: tag.into(),
            filters: Mutex::new(HashMap::new()),
        }
    }

    /// The channel tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn lock_filters(&self) -> MutexGuard<'_, HashMap<ListenerId, ListenerId>> {
        self.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for Multiplexed {
    fn send(&self, message: Value, target_origin: &str) -> Result<()> {
        trace!(tag = %self.tag, "sending multiplexed message");
        self.transport
            .send(Envelope::new(self.tag.clone(), message).into_value(), target_origin)
    }

    fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        if kind != EventKind::Message {
            return self.transport.subscribe(kind, listener);
        }

        let tag = self.tag.clone();
        let filter: Listener = Arc::new(move |event: &MessageEvent| {
            if let Some(payload) = Envelope::open(&event.data, &tag) {
                listener(&MessageEvent::new(payload));
            }
        });

        let inner = self.transport.subscribe(EventKind::Message, filter);
        let outer = ListenerId::next();
        self.lock_filters().insert(outer, inner);
        outer
    }

    fn unsubscribe(&self, kind: &EventKind, id: ListenerId) -> bool {
        if kind != &EventKind::Message {
            return self.transport.unsubscribe(kind, id);
        }

        let Some(inner) = self.lock_filters().remove(&id) else {
            return false;
        };
        self.transport.unsubscribe(kind, inner)
    }
}
