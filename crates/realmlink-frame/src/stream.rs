use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use realmlink_transport::{
    EventKind, Listener, ListenerId, ListenerSet, MessageEvent, Result, Transport,
    TransportError, ANY_ORIGIN,
};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::codec::{EnvelopeCodec, FrameConfig};

/// Event kind raised when an inbound frame cannot be decoded.
pub const MESSAGE_ERROR: &str = "messageerror";
/// Event kind raised once when the reader stops (end of stream or bad frame).
pub const CLOSE: &str = "close";

/// A [`Transport`] over any async byte stream.
///
/// Messages are framed with [`EnvelopeCodec`]. A reader task dispatches
/// inbound messages to listeners in arrival order; a writer task drains an
/// outbound queue so [`Transport::send`] never blocks. A frame that fails to
/// decode raises a `messageerror` event carrying the error text and stops the
/// reader, since the stream can no longer be trusted to be aligned.
///
/// Must be created from within a tokio runtime.
pub struct StreamTransport {
    remote_origin: String,
    listeners: Arc<ListenerSet>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    reader: JoinHandle<()>,
}

impl StreamTransport {
    /// Spawn reader and writer tasks over `io` with default framing.
    pub fn spawn<S>(io: S, remote_origin: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::spawn_with_config(io, remote_origin, FrameConfig::default())
    }

    /// Spawn reader and writer tasks over `io` with explicit framing config.
    pub fn spawn_with_config<S>(io: S, remote_origin: impl Into<String>, config: FrameConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let remote_origin = remote_origin.into();
        let (read_half, write_half) = tokio::io::split(io);
        let listeners = Arc::new(ListenerSet::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

        let mut framed_read = FramedRead::new(read_half, EnvelopeCodec::new(config.clone()));
        let reader_listeners = listeners.clone();
        let reader_origin = remote_origin.clone();
        let reader = tokio::spawn(async move {
            while let Some(next) = framed_read.next().await {
                match next {
                    Ok(message) => {
                        let delivered = reader_listeners
                            .dispatch(&EventKind::Message, &MessageEvent::new(message));
                        trace!(from = %reader_origin, delivered, "stream message received");
                    }
                    Err(err) => {
                        warn!(from = %reader_origin, error = %err, "dropping stream after bad frame");
                        reader_listeners.dispatch(
                            &EventKind::Other(MESSAGE_ERROR.to_string()),
                            &MessageEvent::new(Value::String(err.to_string())),
                        );
                        break;
                    }
                }
            }
            debug!(from = %reader_origin, "stream reader finished");
            reader_listeners.dispatch(
                &EventKind::Other(CLOSE.to_string()),
                &MessageEvent::new(Value::Null),
            );
        });

        let mut framed_write = FramedWrite::new(write_half, EnvelopeCodec::new(config));
        let writer_origin = remote_origin.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(err) = framed_write.send(message).await {
                    warn!(to = %writer_origin, error = %err, "stream write failed");
                    break;
                }
            }
            debug!(to = %writer_origin, "stream writer finished");
        });

        Self {
            remote_origin,
            listeners,
            outbound: Mutex::new(Some(tx)),
            reader,
        }
    }

    /// Origin of the realm on the other end of the stream.
    pub fn remote_origin(&self) -> &str {
        &self.remote_origin
    }

    /// Stop reading and close the outbound queue.
    ///
    /// Messages already queued are still flushed by the writer task.
    pub fn shutdown(&self) {
        self.reader.abort();
        if self.lock_outbound().take().is_some() {
            debug!(to = %self.remote_origin, "stream transport shut down");
        }
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.listeners.count(kind)
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Value>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for StreamTransport {
    fn send(&self, message: Value, target_origin: &str) -> Result<()> {
        if target_origin != ANY_ORIGIN && target_origin != self.remote_origin {
            return Err(TransportError::OriginMismatch {
                expected: self.remote_origin.clone(),
                actual: target_origin.to_string(),
            });
        }

        let guard = self.lock_outbound();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.listeners.add(kind, listener)
    }

    fn unsubscribe(&self, kind: &EventKind, id: ListenerId) -> bool {
        self.listeners.remove(kind, id)
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
