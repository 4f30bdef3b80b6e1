use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use realmlink_codec::{
    decode, encode, encode_without_functions, CallError, Dictionary, ErrorValue, Invocation, Key,
    Value,
};
use realmlink_transport::{EventKind, Listener, ListenerId, MessageEvent, Transport};
use serde_json::Value as Json;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::control::{ControlMessage, FunctionApply, FunctionReturn};
use crate::error::{PeerError, Result};
use crate::table::{Completion, KeyedReferences};

/// Default number of buffered error events per subscriber.
pub const DEFAULT_ERROR_CAPACITY: usize = 64;

const SYNCHRONOUS_CALL_MESSAGE: &str = "Only asynchronous functions can be called across realms.";

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Exports sent, waiting for the peer's.
    Handshaking,
    /// Imports received; calls flow both ways.
    Connected,
    /// Closed locally. Nothing further is processed.
    Closed,
}

/// Configuration for [`connect`].
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Value offered to the peer. Functions inside it become callable remotely.
    pub exports: Value,
    /// Where messages from the peer arrive.
    pub input: Arc<dyn Transport>,
    /// Where messages to the peer are sent.
    pub output: Arc<dyn Transport>,
    /// Target origin passed to every send on `output`.
    pub output_origin: String,
    /// Give up on the handshake after this long. `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// Buffered error events per subscriber.
    pub error_capacity: usize,
}

impl ConnectionConfig {
    /// Configuration with separate input and output transports and
    /// `undefined` exports.
    pub fn new(
        input: Arc<dyn Transport>,
        output: Arc<dyn Transport>,
        output_origin: impl Into<String>,
    ) -> Self {
        Self {
            exports: Value::Undefined,
            input,
            output,
            output_origin: output_origin.into(),
            handshake_timeout: None,
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }

    /// Configuration using one transport for both directions.
    pub fn over(transport: Arc<dyn Transport>, output_origin: impl Into<String>) -> Self {
        Self::new(transport.clone(), transport, output_origin)
    }

    pub fn with_exports(mut self, exports: impl Into<Value>) -> Self {
        self.exports = exports.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn with_error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity;
        self
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("exports", &self.exports.inspect())
            .field("output_origin", &self.output_origin)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("error_capacity", &self.error_capacity)
            .finish_non_exhaustive()
    }
}

/// State shared by the connection handle, its pump task, in-flight calls
/// and the proxies it hands out.
pub(crate) struct Shared {
    output: Arc<dyn Transport>,
    output_origin: String,
    references: Mutex<KeyedReferences>,
    errors: broadcast::Sender<Arc<PeerError>>,
    state: Mutex<ConnectionState>,
}

impl Shared {
    fn lock_references(&self) -> MutexGuard<'_, KeyedReferences> {
        self.references.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.lock_state() = state;
    }

    fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Publish an error event.
    fn report(&self, err: PeerError) {
        warn!(origin = %self.output_origin, error = %err, "connection error");
        let _ = self.errors.send(Arc::new(err));
    }

    fn post(&self, dictionary: &Dictionary) -> Result<()> {
        let message = dictionary.to_json()?;
        self.output.send(message, &self.output_origin)?;
        Ok(())
    }

    fn post_exports(&self, exports: &Value) -> Result<()> {
        let dictionary = {
            let mut references = self.lock_references();
            encode(exports, Some(&mut *references))?
        };
        trace!(origin = %self.output_origin, entries = dictionary.len(), "posting exports");
        self.post(&dictionary)
    }

    fn post_control(&self, control: ControlMessage) {
        if self.is_closed() {
            debug!(kind = control.type_name(), "connection closed, dropping control message");
            return;
        }
        if let Err(err) = control.to_dictionary().and_then(|dictionary| self.post(&dictionary)) {
            self.report(err);
        }
    }

    fn decode_value(self: &Arc<Self>, dictionary: &Dictionary) -> Result<Value> {
        let mut references = self.lock_references();
        let mut importer = references.importer(Arc::downgrade(self));
        Ok(decode(dictionary, Some(&mut importer))?)
    }

    /// Send `functionApply` for `function_key` and return the completion.
    pub(crate) fn call_remote(
        &self,
        function_key: &Key,
        args: Vec<Value>,
    ) -> std::result::Result<oneshot::Receiver<std::result::Result<Value, CallError>>, CallError>
    {
        if self.is_closed() {
            return Err(CallError::Disconnected);
        }

        let args = match encode_without_functions(&Value::from(args)) {
            Ok(args) => args,
            Err(err) => {
                self.report(PeerError::Codec(err.clone()));
                return Err(CallError::Encode(err));
            }
        };

        let (completion, receiver) = oneshot::channel();
        let return_value_key = self.lock_references().register_call(completion);
        trace!(%function_key, %return_value_key, "calling remote function");

        let apply = ControlMessage::from(FunctionApply {
            args,
            function_key: function_key.clone(),
            return_value_key: return_value_key.clone(),
        });
        if let Err(err) = apply.to_dictionary().and_then(|dictionary| self.post(&dictionary)) {
            self.lock_references().take_pending(&return_value_key);
            let call_error = CallError::Protocol(err.to_string());
            self.report(err);
            return Err(call_error);
        }
        Ok(receiver)
    }

    /// Handle one inbound message after the handshake.
    fn handle_message(self: &Arc<Self>, message: Json) -> Result<()> {
        let dictionary = Dictionary::from_json(&message)?;
        match ControlMessage::from_dictionary(&dictionary)? {
            Some(control) => self.handle_control(control),
            None => {
                // Exports sent again by the peer.
                self.decode_value(&dictionary)?;
                trace!(origin = %self.output_origin, "discarded exports re-sync");
                Ok(())
            }
        }
    }

    fn handle_control(self: &Arc<Self>, control: ControlMessage) -> Result<()> {
        match control {
            ControlMessage::Apply(apply) => self.handle_apply(apply),
            ControlMessage::Return(ret) => self.handle_return(ret),
        }
    }

    fn handle_apply(self: &Arc<Self>, apply: FunctionApply) -> Result<()> {
        let FunctionApply {
            args,
            function_key,
            return_value_key,
        } = apply;

        let target = self.lock_references().function(&function_key);
        let Some(target) = target else {
            let err = PeerError::UnknownFunctionKey { key: function_key };
            self.reject_call(return_value_key, ErrorValue::new(err.to_string()).with_name("TypeError"));
            return Err(err);
        };

        let args = match decode(&args, None)
            .map_err(PeerError::from)
            .and_then(into_arguments)
        {
            Ok(args) => args,
            Err(err) => {
                self.reject_call(return_value_key, ErrorValue::new(err.to_string()));
                return Err(err);
            }
        };

        trace!(%function_key, %return_value_key, "applying exported function");
        match target.invoke(args) {
            Invocation::Pending(future) => {
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    let outcome = future.await;
                    shared.send_return(return_value_key, outcome);
                });
                Ok(())
            }
            Invocation::Ready(_) => {
                self.reject_call(
                    return_value_key,
                    ErrorValue::new(SYNCHRONOUS_CALL_MESSAGE).with_name("TypeError"),
                );
                Err(PeerError::SynchronousFunctionNotSupported)
            }
        }
    }

    fn handle_return(&self, ret: FunctionReturn) -> Result<()> {
        let key = ret.return_value_key.clone();
        let completion = self.lock_references().take_pending(&key);
        let Some(completion) = completion else {
            return Err(PeerError::UnknownReturnKey { key });
        };

        match decode_outcome(ret) {
            Ok(outcome) => {
                trace!(return_value_key = %key, resolved = outcome.is_ok(), "call settled");
                let _ = completion.send(outcome);
                Ok(())
            }
            Err(err) => {
                let _ = completion.send(Err(CallError::Protocol(err.to_string())));
                Err(err)
            }
        }
    }

    /// Answer a call with the outcome of the exported function.
    fn send_return(&self, return_value_key: Key, outcome: std::result::Result<Value, CallError>) {
        let encoded = match outcome {
            Ok(value) => encode_without_functions(&value)
                .map(|value| FunctionReturn::resolved(return_value_key.clone(), value)),
            Err(err) => {
                let reason = match err {
                    CallError::Rejected(reason) => reason,
                    other => Value::from(ErrorValue::new(other.to_string())),
                };
                encode_without_functions(&reason)
                    .map(|reason| FunctionReturn::rejected(return_value_key.clone(), reason))
            }
        };

        match encoded {
            Ok(ret) => self.post_control(ret.into()),
            Err(err) => {
                self.reject_call(return_value_key, ErrorValue::new(err.to_string()));
                self.report(err.into());
            }
        }
    }

    /// Settle a call with an error reason.
    fn reject_call(&self, return_value_key: Key, error: ErrorValue) {
        match encode_without_functions(&Value::from(error)) {
            Ok(reason) => self.post_control(FunctionReturn::rejected(return_value_key, reason).into()),
            Err(err) => self.report(err.into()),
        }
    }

    /// Mark closed and reject every pending call. Returns `false` if already closed.
    fn close(&self) -> bool {
        {
            let mut state = self.lock_state();
            if *state == ConnectionState::Closed {
                return false;
            }
            *state = ConnectionState::Closed;
        }

        let pending: Vec<Completion> = self.lock_references().drain_pending();
        for completion in pending {
            let _ = completion.send(Err(CallError::Disconnected));
        }
        true
    }
}

fn into_arguments(value: Value) -> Result<Vec<Value>> {
    value
        .as_array()
        .map(<[Value]>::to_vec)
        .ok_or_else(|| PeerError::MalformedControl("functionApply args must be an array".into()))
}

fn decode_outcome(ret: FunctionReturn) -> Result<std::result::Result<Value, CallError>> {
    Ok(match ret.into_outcome()? {
        Ok(value) => Ok(decode(&value, None)?),
        Err(reason) => Err(CallError::Rejected(decode(&reason, None)?)),
    })
}

/// A live connection to a peer realm.
///
/// Dropping the connection closes it.
pub struct Connection {
    shared: Arc<Shared>,
    input: Arc<dyn Transport>,
    listener_id: ListenerId,
    imports: Value,
    cancel: CancellationToken,
}

impl Connection {
    /// The peer's exports, decoded. Functions inside are remote proxies.
    pub fn imports(&self) -> &Value {
        &self.imports
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Subscribe to errors raised while handling messages.
    ///
    /// Only errors raised after subscribing are received.
    pub fn errors(&self) -> broadcast::Receiver<Arc<PeerError>> {
        self.shared.errors.subscribe()
    }

    /// Number of remote calls still waiting for their return.
    pub fn pending_calls(&self) -> usize {
        self.shared.lock_references().pending_count()
    }

    /// Number of functions known to this connection, exported or imported.
    pub fn function_count(&self) -> usize {
        self.shared.lock_references().function_count()
    }

    /// Stop listening to the peer and reject pending calls.
    pub fn close(&self) {
        if !self.shared.close() {
            return;
        }
        self.input.unsubscribe(&EventKind::Message, self.listener_id);
        self.cancel.cancel();
        debug!(origin = %self.shared.output_origin, "connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("output_origin", &self.shared.output_origin)
            .field("state", &self.state())
            .field("imports", &self.imports.inspect())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect to a peer realm.
///
/// Sends the exports, waits for the peer's exports (the imports), sends the
/// exports once more for a peer that was not yet listening, and then
/// processes messages in the background until closed. Errors before the
/// handshake completes, including unencodable exports, are returned.
pub async fn connect(config: ConnectionConfig) -> Result<Connection> {
    let ConnectionConfig {
        exports,
        input,
        output,
        output_origin,
        handshake_timeout,
        error_capacity,
    } = config;

    let (errors, _) = broadcast::channel(error_capacity.max(1));
    let shared = Arc::new(Shared {
        output,
        output_origin,
        references: Mutex::new(KeyedReferences::new()),
        errors,
        state: Mutex::new(ConnectionState::Handshaking),
    });

    let (inbound_tx, mut inbound) = mpsc::unbounded_channel::<Json>();
    let listener: Listener = Arc::new(move |event: &MessageEvent| {
        let _ = inbound_tx.send(event.data.clone());
    });
    let listener_id = input.subscribe(EventKind::Message, listener);
    debug!(origin = %shared.output_origin, "connection handshaking");

    let handshake = async {
        shared.post_exports(&exports)?;
        let imports = wait_for_imports(&shared, &mut inbound).await?;
        shared.post_exports(&exports)?;
        Ok::<_, PeerError>(imports)
    };
    let outcome = match handshake_timeout {
        Some(limit) => tokio::time::timeout(limit, handshake)
            .await
            .unwrap_or_else(|_| Err(PeerError::Timeout(limit))),
        None => handshake.await,
    };

    let imports = match outcome {
        Ok(imports) => imports,
        Err(err) => {
            input.unsubscribe(&EventKind::Message, listener_id);
            shared.set_state(ConnectionState::Closed);
            debug!(origin = %shared.output_origin, error = %err, "handshake failed");
            return Err(err);
        }
    };

    shared.set_state(ConnectionState::Connected);
    let cancel = CancellationToken::new();
    tokio::spawn(pump(shared.clone(), inbound, cancel.clone()));
    debug!(origin = %shared.output_origin, imports = %imports.inspect(), "connection established");

    Ok(Connection {
        shared,
        input,
        listener_id,
        imports,
        cancel,
    })
}

async fn wait_for_imports(
    shared: &Arc<Shared>,
    inbound: &mut mpsc::UnboundedReceiver<Json>,
) -> Result<Value> {
    loop {
        let message = inbound.recv().await.ok_or(PeerError::Closed)?;
        let dictionary = Dictionary::from_json(&message)?;
        match ControlMessage::from_dictionary(&dictionary)? {
            Some(control) => {
                if let Err(err) = shared.handle_control(control) {
                    shared.report(err);
                }
            }
            None => return shared.decode_value(&dictionary),
        }
    }
}

async fn pump(
    shared: Arc<Shared>,
    mut inbound: mpsc::UnboundedReceiver<Json>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        if let Err(err) = shared.handle_message(message) {
            shared.report(err);
        }
    }
    debug!(origin = %shared.output_origin, "connection pump stopped");
}

#[cfg(test)]
mod tests {
    use std::future;

    use realmlink_codec::{CodecError, Function, Symbol};
    use realmlink_transport::MemoryRealm;
    use tokio::time::{sleep, timeout};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn serialize(exports: Value) -> (Connection, Connection) {
        let (a, b) = MemoryRealm::pair("a", "b");
        let exporting = ConnectionConfig::over(a, "b").with_exports(exports);
        let importing = ConnectionConfig::over(b, "a");

        let (exporting, importing) = tokio::join!(connect(exporting), connect(importing));
        (exporting.unwrap(), importing.unwrap())
    }

    fn add() -> Function {
        Function::new_async(2, |args| async move {
            let a = args.first().and_then(Value::as_number).unwrap_or(f64::NAN);
            let b = args.get(1).and_then(Value::as_number).unwrap_or(f64::NAN);
            Ok(Value::from(a + b))
        })
    }

    fn imported_function(connection: &Connection) -> Function {
        connection
            .imports()
            .as_function()
            .cloned()
            .expect("imports should be a function")
    }

    async fn next_error(errors: &mut broadcast::Receiver<Arc<PeerError>>) -> Arc<PeerError> {
        timeout(WAIT, errors.recv())
            .await
            .expect("timed out waiting for an error event")
            .expect("error channel closed")
    }

    #[tokio::test]
    async fn serializes_values() {
        let values = [
            Value::array([Value::from(1), Value::from(2), Value::from(3)]),
            Value::from(true),
            Value::map([
                (Value::from("a"), Value::from(1)),
                (Value::from("b"), Value::from(2)),
                (Value::from("c"), Value::from(3)),
            ]),
            Value::Null,
            Value::from(42),
            Value::record([("a", Value::from(1)), ("b", Value::from(2)), ("c", Value::from(3))]),
            Value::set([Value::from(1), Value::from(2), Value::from(3)]),
            Value::Undefined,
        ];
        for exports in values {
            let (_exporting, importing) = serialize(exports.clone()).await;
            assert_eq!(importing.imports(), &exports);
        }
    }

    #[tokio::test]
    async fn creates_consistent_object_references() {
        let object = Value::record([("a", Value::from(1)), ("b", Value::from(2)), ("c", Value::from(3))]);
        let (_exporting, importing) = serialize(Value::array([object.clone(), object])).await;

        let items = importing.imports().as_array().unwrap();
        assert!(items[0].ptr_eq(&items[1]));
    }

    #[tokio::test]
    async fn serializes_errors() {
        let exports = Value::from(
            ErrorValue::new("message")
                .with_name("name")
                .with_property("extra", Value::from("extra")),
        );
        let (_exporting, importing) = serialize(exports.clone()).await;

        let error = importing.imports().as_error().unwrap();
        assert_eq!(error.message(), "message");
        assert_eq!(error.name(), "name");
        assert_eq!(importing.imports(), &exports);
    }

    #[tokio::test]
    async fn function_keeps_its_arity() {
        let (_exporting, importing) = serialize(add().into()).await;
        assert_eq!(imported_function(&importing).arity(), 2);
    }

    #[tokio::test]
    async fn function_returns_value() {
        let (_exporting, importing) = serialize(add().into()).await;
        let sum = imported_function(&importing)
            .call(vec![Value::from(1), Value::from(2)])
            .await
            .unwrap();

        assert_eq!(sum, Value::from(3));
        assert_eq!(importing.pending_calls(), 0);
    }

    #[tokio::test]
    async fn function_encodes_arguments() {
        let pair = Function::new_async(2, |args| async move { Ok(Value::from(args)) });
        let (_exporting, importing) = serialize(pair.into()).await;

        let object = Value::record(Vec::<(String, Value)>::new());
        let result = imported_function(&importing)
            .call(vec![object.clone(), object.clone()])
            .await
            .unwrap();

        let items = result.as_array().unwrap();
        assert!(!items[0].ptr_eq(&object));
        assert!(items[0].ptr_eq(&items[1]));
    }

    #[tokio::test]
    async fn function_throws_exception() {
        let tantrum = Function::new_async(0, |_| async {
            Err(Value::from(ErrorValue::new("a tantrum")))
        });
        let (_exporting, importing) = serialize(tantrum.into()).await;

        let err = imported_function(&importing).call(Vec::new()).await.unwrap_err();
        let reason = err.reason().and_then(Value::as_error).unwrap();
        assert_eq!(reason.message(), "a tantrum");
    }

    #[tokio::test]
    async fn fails_with_synchronous_functions() {
        let sync_add = Function::new_sync(2, |_| Ok(Value::from(0)));
        let (exporting, importing) = serialize(sync_add.into()).await;
        let mut errors = exporting.errors();

        let err = imported_function(&importing)
            .call(vec![Value::from(1), Value::from(2)])
            .await
            .unwrap_err();
        let reason = err.reason().and_then(Value::as_error).unwrap();
        assert_eq!(reason.message(), SYNCHRONOUS_CALL_MESSAGE);
        assert_eq!(reason.name(), "TypeError");

        let event = next_error(&mut errors).await;
        assert!(matches!(*event, PeerError::SynchronousFunctionNotSupported));
        assert_eq!(event.to_string(), SYNCHRONOUS_CALL_MESSAGE);
    }

    #[tokio::test]
    async fn allows_functions_only_within_exports() {
        let compose = Function::new_async(2, |_| async { Ok(Value::Undefined) });
        let (_exporting, importing) = serialize(compose.into()).await;
        let mut errors = importing.errors();

        let cos = Function::new_sync(1, |_| Ok(Value::Undefined));
        let sin = Function::new_sync(1, |_| Ok(Value::Undefined));
        let err = imported_function(&importing)
            .call(vec![cos.into(), sin.into()])
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Encode(_)));

        let event = next_error(&mut errors).await;
        assert!(event
            .to_string()
            .contains("Cannot encode functions outside of exports."));
    }

    #[tokio::test]
    async fn functions_have_consistent_identity() {
        let f = add();
        let (_exporting, importing) = serialize(Value::array([f.clone().into(), f.into()])).await;

        let items = importing.imports().as_array().unwrap();
        assert!(items[0].ptr_eq(&items[1]));
        assert_eq!(importing.function_count(), 1);
    }

    #[tokio::test]
    async fn rejects_unsupported_exports() {
        let (a, _b) = MemoryRealm::pair("a", "b");
        let config = ConnectionConfig::over(a.clone(), "b").with_exports(Symbol::new("description"));

        let err = connect(config).await.unwrap_err();
        assert!(matches!(err, PeerError::Codec(_)));
        assert_eq!(a.listener_count(&EventKind::Message), 0);
    }

    #[tokio::test]
    async fn handshake_survives_late_listener() {
        let (a, b) = MemoryRealm::pair("a", "b");
        let early = tokio::spawn(connect(
            ConnectionConfig::over(a.clone(), "b").with_exports(Value::from("early")),
        ));
        // The early side posts its exports to nobody.
        while a.listener_count(&EventKind::Message) == 0 {
            tokio::task::yield_now().await;
        }

        let late = connect(ConnectionConfig::over(b, "a").with_exports(Value::from("late")))
            .await
            .unwrap();
        let early = timeout(WAIT, early).await.unwrap().unwrap().unwrap();

        assert_eq!(early.imports(), &Value::from("late"));
        assert_eq!(late.imports(), &Value::from("early"));
    }

    #[tokio::test]
    async fn deeply_nested_messages_become_error_events() {
        let (a, b) = MemoryRealm::pair("a", "b");
        let (exporting, importing) = tokio::join!(
            connect(ConnectionConfig::over(a, "b").with_exports(add())),
            connect(ConnectionConfig::over(b.clone(), "a")),
        );
        let (exporting, importing) = (exporting.unwrap(), importing.unwrap());
        let mut errors = exporting.errors();

        let mut chain = serde_json::Map::new();
        for code in 0..20_000u32 {
            chain.insert(code.to_string(), serde_json::json!(["array", [code + 1]]));
        }
        b.send(Json::Object(chain), "a").unwrap();

        let event = next_error(&mut errors).await;
        assert!(matches!(
            &*event,
            PeerError::Codec(CodecError::TooDeep { .. })
        ));

        let sum = imported_function(&importing)
            .call(vec![Value::from(1), Value::from(2)])
            .await
            .unwrap();
        assert_eq!(sum, Value::from(3));
    }

    #[tokio::test]
    async fn handshake_times_out() {
        let (a, _b) = MemoryRealm::pair("a", "b");
        let config = ConnectionConfig::over(a.clone(), "b")
            .with_handshake_timeout(Duration::from_millis(20));

        let err = connect(config).await.unwrap_err();
        assert!(matches!(err, PeerError::Timeout(_)));
        assert_eq!(a.listener_count(&EventKind::Message), 0);
    }

    #[tokio::test]
    async fn close_rejects_pending_calls() {
        let never = Function::new_async(0, |_| future::pending::<std::result::Result<Value, Value>>());
        let (_exporting, importing) = serialize(never.into()).await;

        let call = match imported_function(&importing).invoke(Vec::new()) {
            Invocation::Pending(call) => call,
            Invocation::Ready(_) => panic!("remote calls are asynchronous"),
        };
        assert_eq!(importing.pending_calls(), 1);

        importing.close();
        assert_eq!(importing.state(), ConnectionState::Closed);
        assert!(matches!(
            timeout(WAIT, call).await.unwrap(),
            Err(CallError::Disconnected)
        ));
        assert_eq!(importing.pending_calls(), 0);
    }

    #[tokio::test]
    async fn calls_after_close_fail() {
        let (exporting, importing) = serialize(add().into()).await;
        assert_eq!(exporting.state(), ConnectionState::Connected);

        let f = imported_function(&importing);
        importing.close();
        importing.close();

        assert!(matches!(
            f.call(vec![Value::from(1), Value::from(2)]).await,
            Err(CallError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn proxies_outliving_the_connection_are_disconnected() {
        let (_exporting, importing) = serialize(add().into()).await;
        let f = imported_function(&importing);
        drop(importing);

        assert!(matches!(
            f.call(vec![Value::from(1), Value::from(2)]).await,
            Err(CallError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn concurrent_calls_settle_independently() {
        let delayed = Function::new_async(1, |args| async move {
            let millis = args.first().and_then(Value::as_number).unwrap_or(0.0);
            sleep(Duration::from_millis(millis as u64)).await;
            Ok(Value::from(millis))
        });
        let (_exporting, importing) = serialize(delayed.into()).await;
        let f = imported_function(&importing);

        let (slow, fast) = tokio::join!(
            f.call(vec![Value::from(40)]),
            f.call(vec![Value::from(1)])
        );
        assert_eq!(slow.unwrap(), Value::from(40));
        assert_eq!(fast.unwrap(), Value::from(1));
    }
}
