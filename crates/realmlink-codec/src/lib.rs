//! Reference-preserving value codec for realm messages.
//!
//! A [`Value`] graph is flattened into a [`Dictionary`]: every distinct value
//! gets an integer code (in depth-first pre-order, root = 0) and one entry
//! `[typeName, encoding]`, where containers refer to their children by code.
//! Shared references therefore survive the trip, and decoding rebuilds a graph
//! with the same sharing.
//!
//! Supported kinds are listed in the [`registry`], tested in priority order.
//! Functions are encoded as `{key, length}` through a [`FunctionExporter`]
//! and decoded through a [`FunctionImporter`]; without one, functions are
//! rejected.

pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod function;
pub mod key;
pub mod registry;
pub mod value;

pub use decoder::{decode, Decoder, FunctionImporter, MAX_DEPTH};
pub use dictionary::{Dictionary, Entry};
pub use encoder::{encode, encode_without_functions, Encoder, FunctionExporter};
pub use error::{CallError, CodecError, Result};
pub use function::{Callable, Function, Invocation};
pub use key::Key;
pub use registry::{descriptor_for, descriptor_named, Descriptor, Kind, REGISTRY};
pub use value::{inspect, ErrorValue, MapValue, Record, SetValue, Symbol, Value};
