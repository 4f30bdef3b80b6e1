/// Errors that can occur in realm transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The destination hint passed to `send` does not match the peer realm.
    #[error("target origin '{actual}' does not match peer origin '{expected}'")]
    OriginMismatch { expected: String, actual: String },

    /// The transport is not connected to a peer (or has been shut down).
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
