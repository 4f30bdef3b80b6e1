use std::collections::HashMap;
use std::sync::{Arc, Weak};

use realmlink_codec::{CallError, Function, FunctionExporter, FunctionImporter, Key, Value};
use tokio::sync::oneshot;
use tracing::trace;

use crate::connection::Shared;
use crate::proxy::RemoteFunction;

pub(crate) type Completion = oneshot::Sender<Result<Value, CallError>>;

pub(crate) enum Reference {
    /// An exported function, or the proxy for an imported one.
    Function(Function),
    /// A call waiting for its `functionReturn`.
    Pending(Completion),
}

/// Per-connection key table.
///
/// Function entries live as long as the connection; pending entries are
/// removed when their call settles.
#[derive(Default)]
pub(crate) struct KeyedReferences {
    function_keys: HashMap<usize, Key>,
    entries: HashMap<Key, Reference>,
}

impl KeyedReferences {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn mint_key(&self) -> Key {
        loop {
            let key = Key::generate();
            if !self.entries.contains_key(&key) {
                return key;
            }
        }
    }

    /// Function stored under `key`.
    pub(crate) fn function(&self, key: &Key) -> Option<Function> {
        match self.entries.get(key) {
            Some(Reference::Function(function)) => Some(function.clone()),
            _ => None,
        }
    }

    /// Register a pending call and return its return-value key.
    pub(crate) fn register_call(&mut self, completion: Completion) -> Key {
        let key = self.mint_key();
        self.entries
            .insert(key.clone(), Reference::Pending(completion));
        key
    }

    /// Remove and return the pending call for `key`.
    pub(crate) fn take_pending(&mut self, key: &Key) -> Option<Completion> {
        match self.entries.remove(key) {
            Some(Reference::Pending(completion)) => Some(completion),
            Some(other) => {
                self.entries.insert(key.clone(), other);
                None
            }
            None => None,
        }
    }

    /// Remove every pending call.
    pub(crate) fn drain_pending(&mut self) -> Vec<Completion> {
        let keys: Vec<Key> = self
            .entries
            .iter()
            .filter(|(_, reference)| matches!(reference, Reference::Pending(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter().filter_map(|key| self.take_pending(key)).collect()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|reference| matches!(reference, Reference::Pending(_)))
            .count()
    }

    pub(crate) fn function_count(&self) -> usize {
        self.entries.len() - self.pending_count()
    }

    /// Importer that creates proxies bound to `shared`.
    pub(crate) fn importer(&mut self, shared: Weak<Shared>) -> Importer<'_> {
        Importer {
            table: self,
            shared,
        }
    }
}

impl FunctionExporter for KeyedReferences {
    fn export(&mut self, function: &Function) -> Key {
        if let Some(key) = self.function_keys.get(&function.id()) {
            return key.clone();
        }
        let key = self.mint_key();
        trace!(%key, arity = function.arity(), "exporting function");
        self.function_keys.insert(function.id(), key.clone());
        self.entries
            .insert(key.clone(), Reference::Function(function.clone()));
        key
    }
}

pub(crate) struct Importer<'a> {
    table: &'a mut KeyedReferences,
    shared: Weak<Shared>,
}

impl FunctionImporter for Importer<'_> {
    fn import(&mut self, key: &Key, arity: usize) -> Function {
        if let Some(function) = self.table.function(key) {
            return function;
        }

        trace!(%key, arity, "importing function");
        let proxy = Function::from_callable(Arc::new(RemoteFunction::new(
            key.clone(),
            arity,
            self.shared.clone(),
        )));
        if !self.table.entries.contains_key(key) {
            self.table
                .entries
                .insert(key.clone(), Reference::Function(proxy.clone()));
        }
        proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Function {
        Function::new_async(0, |_| async { Ok(Value::Undefined) })
    }

    #[test]
    fn export_is_stable_per_function() {
        let mut table = KeyedReferences::new();
        let f = noop();
        let g = noop();

        let first = table.export(&f);
        assert_eq!(table.export(&f.clone()), first);
        assert_ne!(table.export(&g), first);
        assert_eq!(table.function(&first).map(|found| found.id()), Some(f.id()));
        assert_eq!(table.function_count(), 2);
    }

    #[test]
    fn pending_calls_settle_once() {
        let mut table = KeyedReferences::new();
        let (tx, _rx) = oneshot::channel();
        let key = table.register_call(tx);

        assert_eq!(table.pending_count(), 1);
        assert!(table.function(&key).is_none());
        assert!(table.take_pending(&key).is_some());
        assert!(table.take_pending(&key).is_none());
        assert_eq!(table.pending_count(), 0);
    }

    #[test]
    fn take_pending_leaves_functions_alone() {
        let mut table = KeyedReferences::new();
        let key = table.export(&noop());

        assert!(table.take_pending(&key).is_none());
        assert!(table.function(&key).is_some());
    }

    #[test]
    fn drain_removes_all_pending() {
        let mut table = KeyedReferences::new();
        table.export(&noop());
        for _ in 0..3 {
            let (tx, _rx) = oneshot::channel();
            table.register_call(tx);
        }

        assert_eq!(table.drain_pending().len(), 3);
        assert_eq!(table.pending_count(), 0);
        assert_eq!(table.function_count(), 1);
    }

    #[test]
    fn importer_reuses_proxies() {
        let mut table = KeyedReferences::new();
        let key = Key::from("remote");

        let first = table.importer(Weak::new()).import(&key, 2);
        let second = table.importer(Weak::new()).import(&key, 2);

        assert_eq!(first.id(), second.id());
        assert_eq!(first.arity(), 2);
    }
}
