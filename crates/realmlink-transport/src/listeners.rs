use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::traits::{EventKind, Listener, ListenerId, MessageEvent};

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

/// Ordered registry of event listeners.
///
/// Shared building block for transport implementations. Dispatch snapshots the
/// matching listeners before invoking them, so a listener may subscribe or
/// unsubscribe (itself included) while it runs.
#[derive(Default)]
pub struct ListenerSet {
    entries: Mutex<Vec<Registration>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind` and return its id.
    pub fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.lock().push(Registration { id, kind, listener });
        id
    }

    /// Remove the listener registered under `id` for `kind`.
    pub fn remove(&self, kind: &EventKind, id: ListenerId) -> bool {
        let mut entries = self.lock();
        match entries
            .iter()
            .position(|entry| entry.id == id && &entry.kind == kind)
        {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every listener registered for `kind`, in registration order.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, kind: &EventKind, event: &MessageEvent) -> usize {
        let matching: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|entry| &entry.kind == kind)
            .map(|entry| entry.listener.clone())
            .collect();

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    /// Number of listeners registered for `kind`.
    pub fn count(&self, kind: &EventKind) -> usize {
        self.lock().iter().filter(|entry| &entry.kind == kind).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = counter.clone();
        Arc::new(move |_event: &MessageEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn dispatch_only_matching_kind() {
        let set = ListenerSet::new();
        let messages = Arc::new(AtomicUsize::new(0));
        let others = Arc::new(AtomicUsize::new(0));
        set.add(EventKind::Message, counting(&messages));
        set.add(EventKind::Other("messageerror".into()), counting(&others));

        let invoked = set.dispatch(&EventKind::Message, &MessageEvent::new(json!(1)));

        assert_eq!(invoked, 1);
        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(others.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_requires_matching_kind() {
        let set = ListenerSet::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = set.add(EventKind::Message, counting(&counter));

        assert!(!set.remove(&EventKind::Other("x".into()), id));
        assert!(set.remove(&EventKind::Message, id));
        assert!(!set.remove(&EventKind::Message, id));
        assert_eq!(set.count(&EventKind::Message), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_dispatch() {
        let set = Arc::new(ListenerSet::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let set_for_listener = set.clone();
        let slot_for_listener = slot.clone();
        let id = set.add(
            EventKind::Message,
            Arc::new(move |_event: &MessageEvent| {
                if let Some(id) = *slot_for_listener.lock().unwrap() {
                    set_for_listener.remove(&EventKind::Message, id);
                }
            }),
        );
        *slot.lock().unwrap() = Some(id);

        assert_eq!(set.dispatch(&EventKind::Message, &MessageEvent::new(json!(null))), 1);
        assert_eq!(set.dispatch(&EventKind::Message, &MessageEvent::new(json!(null))), 0);
    }
}
