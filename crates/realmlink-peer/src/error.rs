use std::time::Duration;

use realmlink_codec::{CodecError, Key};
use realmlink_transport::TransportError;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A value or message could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A control message payload had the wrong shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An exported function was called remotely but did not return a future.
    #[error("Only asynchronous functions can be called across realms.")]
    SynchronousFunctionNotSupported,

    /// `functionApply` named a function this side never exported.
    #[error("no exported function for key {key}")]
    UnknownFunctionKey { key: Key },

    /// `functionReturn` named a call that is not pending.
    #[error("no pending call for key {key}")]
    UnknownReturnKey { key: Key },

    /// A control message was structurally invalid.
    #[error("malformed control message: {0}")]
    MalformedControl(String),

    /// The handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The input stopped delivering messages before the handshake completed.
    #[error("input closed before the handshake completed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PeerError>;
