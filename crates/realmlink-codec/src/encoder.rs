use std::collections::HashMap;

use serde_json::Value as Json;
use tracing::trace;

use crate::decoder::MAX_DEPTH;
use crate::dictionary::{Dictionary, Entry};
use crate::error::{CodecError, Result};
use crate::function::Function;
use crate::key::Key;
use crate::registry::descriptor_for;
use crate::value::{inspect, IdentityKey, Value};

/// Assigns persistent keys to functions being encoded.
pub trait FunctionExporter {
    /// The key for `function`, minting one on first encounter.
    fn export(&mut self, function: &Function) -> Key;
}

/// Single-use encoding context: one reference map, one dictionary.
pub struct Encoder<'a> {
    codes: HashMap<IdentityKey, u32>,
    dictionary: Dictionary,
    depth: usize,
    exporter: Option<&'a mut dyn FunctionExporter>,
}

impl<'a> Encoder<'a> {
    pub fn new(exporter: Option<&'a mut dyn FunctionExporter>) -> Self {
        Self {
            codes: HashMap::new(),
            dictionary: Dictionary::new(),
            depth: 0,
            exporter,
        }
    }

    /// Encode `value` into the dictionary and return its code.
    ///
    /// A value already seen in this context reuses its code. New values get
    /// the next code before their children are visited. Nesting deeper than
    /// [`MAX_DEPTH`] fails with [`CodecError::TooDeep`].
    pub fn encode_value(&mut self, value: &Value) -> Result<u32> {
        let identity = value.identity_key();
        if let Some(code) = self.codes.get(&identity) {
            return Ok(*code);
        }

        let descriptor = descriptor_for(value).ok_or_else(|| CodecError::UnencodableType {
            value: inspect(value),
        })?;

        let code = u32::try_from(self.codes.len())
            .map_err(|_| CodecError::malformed(descriptor.name, "too many values"))?;
        self.codes.insert(identity, code);

        if self.depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let encoding = (descriptor.encode)(self, value);
        self.depth -= 1;
        let encoding = encoding?;
        self.dictionary
            .insert(code, Entry::new(descriptor.name, encoding));
        Ok(code)
    }

    /// Encode `value` and return its code as a JSON number.
    pub fn encode_child(&mut self, value: &Value) -> Result<Json> {
        self.encode_value(value).map(Json::from)
    }

    /// Key for `function`, if this context may encode functions.
    pub fn export_function(&mut self, function: &Function) -> Result<Key> {
        match self.exporter.as_mut() {
            Some(exporter) => Ok(exporter.export(function)),
            None => Err(CodecError::FunctionNotExportable),
        }
    }

    pub fn finish(self) -> Dictionary {
        self.dictionary
    }
}

/// Encode `value` into a fresh dictionary.
///
/// Functions are only accepted when `exporter` is given. Any failure is
/// reported as [`CodecError::Encoding`] naming the root value.
pub fn encode(value: &Value, exporter: Option<&mut dyn FunctionExporter>) -> Result<Dictionary> {
    let mut encoder = Encoder::new(exporter);
    match encoder.encode_value(value) {
        Ok(_) => {
            let dictionary = encoder.finish();
            trace!(entries = dictionary.len(), "encoded value");
            Ok(dictionary)
        }
        Err(source) => Err(CodecError::Encoding {
            value: inspect(value),
            source: Box::new(source),
        }),
    }
}

/// Encode `value` with no function table: functions are rejected.
pub fn encode_without_functions(value: &Value) -> Result<Dictionary> {
    encode(value, None)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::value::{ErrorValue, Symbol};

    struct CountingExporter {
        keys: HashMap<usize, Key>,
    }

    impl FunctionExporter for CountingExporter {
        fn export(&mut self, function: &Function) -> Key {
            let next = self.keys.len();
            self.keys
                .entry(function.id())
                .or_insert_with(|| Key::from(format!("key-{next}")))
                .clone()
        }
    }

    fn wire(value: &Value) -> Json {
        encode_without_functions(value).unwrap().to_json().unwrap()
    }

    #[test]
    fn primitives() {
        assert_eq!(wire(&Value::from(true)), json!({"0": ["boolean", true]}));
        assert_eq!(wire(&Value::Null), json!({"0": ["null", null]}));
        assert_eq!(wire(&Value::from(42)), json!({"0": ["number", 42]}));
        assert_eq!(wire(&Value::from(1.5)), json!({"0": ["number", 1.5]}));
        assert_eq!(wire(&Value::from(f64::NAN)), json!({"0": ["number", "NaN"]}));
        assert_eq!(
            wire(&Value::from(f64::NEG_INFINITY)),
            json!({"0": ["number", "-Infinity"]})
        );
        assert_eq!(wire(&Value::from("s")), json!({"0": ["string", "s"]}));
        assert_eq!(wire(&Value::Undefined), json!({"0": ["undefined", null]}));
    }

    #[test]
    fn codes_are_assigned_in_pre_order() {
        let value = Value::array([
            Value::array([Value::from("inner")]),
            Value::from("outer"),
        ]);
        assert_eq!(
            wire(&value),
            json!({
                "0": ["array", [1, 3]],
                "1": ["array", [2]],
                "2": ["string", "inner"],
                "3": ["string", "outer"],
            })
        );
    }

    #[test]
    fn shared_references_share_codes() {
        let object = Value::record([("a", Value::from(1))]);
        let value = Value::array([object.clone(), object]);
        assert_eq!(
            wire(&value),
            json!({
                "0": ["array", [1, 1]],
                "1": ["object", [["a", 2]]],
                "2": ["number", 1],
            })
        );
    }

    #[test]
    fn equal_primitives_share_codes() {
        let value = Value::array([Value::from("x"), Value::from("x"), Value::from(0.0), Value::from(-0.0)]);
        assert_eq!(
            wire(&value),
            json!({
                "0": ["array", [1, 1, 2, 2]],
                "1": ["string", "x"],
                "2": ["number", 0],
            })
        );
    }

    #[test]
    fn map_set_and_error_shapes() {
        let map = Value::map([(Value::from("k"), Value::from(true))]);
        assert_eq!(
            wire(&map),
            json!({"0": ["map", [[1, 2]]], "1": ["string", "k"], "2": ["boolean", true]})
        );

        let set = Value::set([Value::from(1), Value::from(2)]);
        assert_eq!(
            wire(&set),
            json!({"0": ["set", [1, 2]], "1": ["number", 1], "2": ["number", 2]})
        );

        let error = Value::from(ErrorValue::new("boom").with_property("extra", Value::from("x")));
        assert_eq!(
            wire(&error),
            json!({
                "0": ["error", {"message": 1, "pairs": [["extra", 2]]}],
                "1": ["string", "boom"],
                "2": ["string", "x"],
            })
        );
    }

    #[test]
    fn functions_need_an_exporter() {
        let f = Function::new_async(2, |_| async { Ok(Value::Undefined) });
        let err = encode_without_functions(&Value::array([f.into()])).unwrap_err();

        assert!(matches!(err.root_cause(), CodecError::FunctionNotExportable));
        assert!(err
            .to_string()
            .contains("Cannot encode functions outside of exports."));
    }

    #[test]
    fn functions_encode_key_and_length() {
        let f = Function::new_async(2, |_| async { Ok(Value::Undefined) });
        let value = Value::array([f.clone().into(), f.into()]);
        let mut exporter = CountingExporter {
            keys: HashMap::new(),
        };

        let dictionary = encode(&value, Some(&mut exporter)).unwrap();
        assert_eq!(
            dictionary.to_json().unwrap(),
            json!({
                "0": ["array", [1, 1]],
                "1": ["function", {"key": "key-0", "length": 2}],
            })
        );
        assert_eq!(exporter.keys.len(), 1);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut value = Value::Null;
        for _ in 1..MAX_DEPTH {
            value = Value::array([value]);
        }
        assert!(encode_without_functions(&value).is_ok());

        let err = encode_without_functions(&Value::array([value])).unwrap_err();
        assert!(matches!(err.root_cause(), CodecError::TooDeep { limit: MAX_DEPTH }));
    }

    #[test]
    fn symbols_are_unencodable() {
        let err = encode_without_functions(&Symbol::new("description").into()).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            CodecError::UnencodableType { value } if value == "Symbol(description)"
        ));
    }

    #[test]
    fn failure_names_the_root_value() {
        let value = Value::array([Value::from("This is a long string."), Symbol::anonymous().into()]);
        match encode_without_functions(&value).unwrap_err() {
            CodecError::Encoding { value, .. } => {
                assert_eq!(value, "[\"This is a long string.\"...")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
