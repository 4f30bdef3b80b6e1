use crate::key::Key;
use crate::value::Value;

/// Errors that can occur while encoding or decoding dictionaries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    /// No registered descriptor accepts the value.
    #[error("don't know how to encode \"{value}\"")]
    UnencodableType { value: String },

    /// A function was reached while encoding without an exporter.
    #[error("Cannot encode functions outside of exports.")]
    FunctionNotExportable,

    /// A function entry was reached while decoding without an importer.
    #[error("cannot decode function {key} without an importer")]
    FunctionNotImportable { key: Key },

    /// The dictionary names a type that has no registered descriptor.
    #[error("don't know how to decode type {name:?}")]
    UnknownDecodedType { name: String },

    /// A code is referenced but has no entry in the dictionary.
    #[error("dictionary has no entry for code {code}")]
    MissingEntry { code: u32 },

    /// A code is reached again while it is still being decoded.
    #[error("code {code} refers back to itself")]
    CyclicReference { code: u32 },

    /// Values nest deeper than the codec will follow.
    #[error("values nest deeper than {limit} levels")]
    TooDeep { limit: usize },

    /// An entry's encoding does not have the shape its type requires.
    #[error("malformed {type_name} encoding: {reason}")]
    MalformedEncoding { type_name: String, reason: String },

    /// Encoding the root value failed.
    #[error("error while encoding {value}: {source}")]
    Encoding {
        value: String,
        #[source]
        source: Box<CodecError>,
    },

    /// The dictionary could not be converted from or to JSON.
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Json(err.to_string())
    }
}

impl CodecError {
    pub(crate) fn malformed(type_name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    /// The innermost error, looking through [`CodecError::Encoding`] wrappers.
    pub fn root_cause(&self) -> &CodecError {
        match self {
            CodecError::Encoding { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Ways a function call can fail.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The function threw (or the remote call was rejected) with this reason.
    #[error("call rejected: {}", .0.inspect())]
    Rejected(Value),

    /// The connection closed before the call settled.
    #[error("connection closed before the call settled")]
    Disconnected,

    /// The arguments could not be encoded.
    #[error("failed to encode call: {0}")]
    Encode(#[from] CodecError),

    /// The call could not be delivered.
    #[error("call failed: {0}")]
    Protocol(String),
}

impl CallError {
    /// The rejection reason, if the call was rejected.
    pub fn reason(&self) -> Option<&Value> {
        match self {
            CallError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}
