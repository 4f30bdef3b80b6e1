use std::sync::Weak;

use realmlink_codec::{CallError, Callable, Invocation, Key, Value};

use crate::connection::Shared;

/// Local stand-in for a function exported by the peer realm.
///
/// Every call is a round trip: `functionApply` out, `functionReturn` back.
/// The proxy does not keep its connection alive; calling it after the
/// connection is gone fails with [`CallError::Disconnected`].
pub(crate) struct RemoteFunction {
    key: Key,
    arity: usize,
    shared: Weak<Shared>,
}

impl RemoteFunction {
    pub(crate) fn new(key: Key, arity: usize, shared: Weak<Shared>) -> Self {
        Self { key, arity, shared }
    }
}

impl Callable for RemoteFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn invoke(&self, args: Vec<Value>) -> Invocation {
        let Some(shared) = self.shared.upgrade() else {
            return Invocation::Ready(Err(CallError::Disconnected));
        };

        match shared.call_remote(&self.key, args) {
            Ok(completion) => Invocation::Pending(Box::pin(async move {
                completion.await.unwrap_or(Err(CallError::Disconnected))
            })),
            Err(err) => Invocation::Ready(Err(err)),
        }
    }
}
