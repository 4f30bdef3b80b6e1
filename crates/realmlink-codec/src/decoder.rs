use std::collections::{HashMap, HashSet};

use serde_json::Value as Json;
use tracing::trace;

use crate::dictionary::Dictionary;
use crate::error::{CodecError, Result};
use crate::function::Function;
use crate::key::Key;
use crate::registry::descriptor_named;
use crate::value::Value;

/// Deepest nesting of containers the codec encodes or decodes.
pub const MAX_DEPTH: usize = 512;

/// Resolves function keys found while decoding.
pub trait FunctionImporter {
    /// The function for `key`, creating a proxy of `arity` on first sight.
    fn import(&mut self, key: &Key, arity: usize) -> Function;
}

/// Single-use decoding context over one dictionary.
pub struct Decoder<'d, 'i> {
    dictionary: &'d Dictionary,
    decoded: HashMap<u32, Value>,
    in_progress: HashSet<u32>,
    importer: Option<&'i mut dyn FunctionImporter>,
}

impl<'d, 'i> Decoder<'d, 'i> {
    pub fn new(dictionary: &'d Dictionary, importer: Option<&'i mut dyn FunctionImporter>) -> Self {
        Self {
            dictionary,
            decoded: HashMap::new(),
            in_progress: HashSet::new(),
            importer,
        }
    }

    /// Decode the entry stored under `code`.
    ///
    /// Each code is decoded once; later references get the same value.
    /// Chains of more than [`MAX_DEPTH`] nested entries fail with
    /// [`CodecError::TooDeep`].
    pub fn decode_code(&mut self, code: u32) -> Result<Value> {
        if let Some(value) = self.decoded.get(&code) {
            return Ok(value.clone());
        }
        if self.in_progress.contains(&code) {
            return Err(CodecError::CyclicReference { code });
        }
        if self.in_progress.len() >= MAX_DEPTH {
            return Err(CodecError::TooDeep { limit: MAX_DEPTH });
        }
        self.in_progress.insert(code);

        let dictionary = self.dictionary;
        let entry = dictionary
            .get(code)
            .ok_or(CodecError::MissingEntry { code })?;
        let descriptor =
            descriptor_named(entry.type_name()).ok_or_else(|| CodecError::UnknownDecodedType {
                name: entry.type_name().to_string(),
            })?;

        let value = (descriptor.decode)(self, entry.encoding())?;
        self.in_progress.remove(&code);
        self.decoded.insert(code, value.clone());
        Ok(value)
    }

    /// Decode a child reference stored as a JSON code.
    pub fn decode_child(&mut self, code: &Json) -> Result<Value> {
        let code = code
            .as_u64()
            .and_then(|code| u32::try_from(code).ok())
            .ok_or_else(|| CodecError::malformed("code", format!("{code} is not a code")))?;
        self.decode_code(code)
    }

    /// Resolve a function key, if this context may decode functions.
    pub fn import_function(&mut self, key: &Key, arity: usize) -> Result<Function> {
        match self.importer.as_mut() {
            Some(importer) => Ok(importer.import(key, arity)),
            None => Err(CodecError::FunctionNotImportable { key: key.clone() }),
        }
    }
}

/// Decode a dictionary, starting at the root code.
pub fn decode(dictionary: &Dictionary, importer: Option<&mut dyn FunctionImporter>) -> Result<Value> {
    let mut decoder = Decoder::new(dictionary, importer);
    let value = decoder.decode_code(Dictionary::ROOT)?;
    trace!(entries = dictionary.len(), "decoded value");
    Ok(value)
}
