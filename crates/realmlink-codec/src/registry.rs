//! The type registry.
//!
//! An ordered table of descriptors, one per encodable kind. The encoder picks
//! the first descriptor whose test accepts a value; the decoder looks one up
//! by the type name stored in the dictionary. Supporting another kind means
//! adding a [`Kind`] variant and a descriptor here; the engines in
//! [`encoder`](crate::encoder) and [`decoder`](crate::decoder) do not change.

use std::fmt;

use serde_json::{json, Map, Value as Json};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, Result};
use crate::key::Key;
use crate::value::{finite_number, ErrorValue, MapValue, Record, SetValue, Value};

/// Encodable kinds, in the order they are tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Boolean,
    Null,
    Number,
    String,
    Undefined,
    Array,
    Error,
    Function,
    Map,
    Set,
    Object,
}

impl Kind {
    /// Wire name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Null => "null",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Undefined => "undefined",
            Kind::Array => "array",
            Kind::Error => "error",
            Kind::Function => "function",
            Kind::Map => "map",
            Kind::Set => "set",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type EncodeFn = fn(&mut Encoder<'_>, &Value) -> Result<Json>;
pub type DecodeFn = fn(&mut Decoder<'_, '_>, &Json) -> Result<Value>;

/// How one kind is recognized, encoded and decoded.
pub struct Descriptor {
    pub kind: Kind,
    pub name: &'static str,
    pub test: fn(&Value) -> bool,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// All descriptors, in test order. `object` comes last.
pub static REGISTRY: [Descriptor; 11] = [
    Descriptor {
        kind: Kind::Boolean,
        name: "boolean",
        test: is_boolean,
        encode: encode_boolean,
        decode: decode_boolean,
    },
    Descriptor {
        kind: Kind::Null,
        name: "null",
        test: is_null,
        encode: encode_null,
        decode: decode_null,
    },
    Descriptor {
        kind: Kind::Number,
        name: "number",
        test: is_number,
        encode: encode_number,
        decode: decode_number,
    },
    Descriptor {
        kind: Kind::String,
        name: "string",
        test: is_string,
        encode: encode_string,
        decode: decode_string,
    },
    Descriptor {
        kind: Kind::Undefined,
        name: "undefined",
        test: is_undefined,
        encode: encode_null,
        decode: decode_undefined,
    },
    Descriptor {
        kind: Kind::Array,
        name: "array",
        test: is_array,
        encode: encode_array,
        decode: decode_array,
    },
    Descriptor {
        kind: Kind::Error,
        name: "error",
        test: is_error,
        encode: encode_error,
        decode: decode_error,
    },
    Descriptor {
        kind: Kind::Function,
        name: "function",
        test: is_function,
        encode: encode_function,
        decode: decode_function,
    },
    Descriptor {
        kind: Kind::Map,
        name: "map",
        test: is_map,
        encode: encode_map,
        decode: decode_map,
    },
    Descriptor {
        kind: Kind::Set,
        name: "set",
        test: is_set,
        encode: encode_set,
        decode: decode_set,
    },
    Descriptor {
        kind: Kind::Object,
        name: "object",
        test: is_object,
        encode: encode_object,
        decode: decode_object,
    },
];

/// First descriptor whose test accepts `value`.
pub fn descriptor_for(value: &Value) -> Option<&'static Descriptor> {
    REGISTRY.iter().find(|descriptor| (descriptor.test)(value))
}

/// Descriptor registered under `name`.
pub fn descriptor_named(name: &str) -> Option<&'static Descriptor> {
    REGISTRY.iter().find(|descriptor| descriptor.name == name)
}

// tests

fn is_boolean(value: &Value) -> bool {
    matches!(value, Value::Boolean(_))
}

fn is_null(value: &Value) -> bool {
    matches!(value, Value::Null)
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Number(_))
}

fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

fn is_undefined(value: &Value) -> bool {
    matches!(value, Value::Undefined)
}

fn is_array(value: &Value) -> bool {
    matches!(value, Value::Array(_))
}

fn is_error(value: &Value) -> bool {
    matches!(value, Value::Error(_))
}

fn is_function(value: &Value) -> bool {
    matches!(value, Value::Function(_))
}

fn is_map(value: &Value) -> bool {
    matches!(value, Value::Map(_))
}

fn is_set(value: &Value) -> bool {
    matches!(value, Value::Set(_))
}

fn is_object(value: &Value) -> bool {
    matches!(value, Value::Record(_))
}

// primitives

fn encode_boolean(_: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    value
        .as_bool()
        .map(Json::Bool)
        .ok_or_else(|| CodecError::malformed("boolean", "not a boolean"))
}

fn decode_boolean(_: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    encoding
        .as_bool()
        .map(Value::Boolean)
        .ok_or_else(|| CodecError::malformed("boolean", "expected a JSON boolean"))
}

fn encode_null(_: &mut Encoder<'_>, _: &Value) -> Result<Json> {
    Ok(Json::Null)
}

fn decode_null(_: &mut Decoder<'_, '_>, _: &Json) -> Result<Value> {
    Ok(Value::Null)
}

fn decode_undefined(_: &mut Decoder<'_, '_>, _: &Json) -> Result<Value> {
    Ok(Value::Undefined)
}

fn encode_number(_: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let n = value
        .as_number()
        .ok_or_else(|| CodecError::malformed("number", "not a number"))?;
    Ok(match finite_number(n) {
        Some(json) => json,
        None if n.is_nan() => Json::from("NaN"),
        None if n > 0.0 => Json::from("Infinity"),
        None => Json::from("-Infinity"),
    })
}

fn decode_number(_: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    let n = match encoding {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    };
    n.map(Value::Number)
        .ok_or_else(|| CodecError::malformed("number", format!("unexpected {encoding}")))
}

fn encode_string(_: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    value
        .as_str()
        .map(Json::from)
        .ok_or_else(|| CodecError::malformed("string", "not a string"))
}

fn decode_string(_: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    encoding
        .as_str()
        .map(Value::from)
        .ok_or_else(|| CodecError::malformed("string", "expected a JSON string"))
}

// containers

fn encode_codes<'v>(
    encoder: &mut Encoder<'_>,
    items: impl IntoIterator<Item = &'v Value>,
) -> Result<Json> {
    items
        .into_iter()
        .map(|item| encoder.encode_child(item))
        .collect::<Result<Vec<_>>>()
        .map(Json::Array)
}

fn list<'j>(type_name: &str, encoding: &'j Json) -> Result<&'j Vec<Json>> {
    encoding
        .as_array()
        .ok_or_else(|| CodecError::malformed(type_name, "expected a list"))
}

fn pair<'j>(type_name: &str, encoding: &'j Json) -> Result<(&'j Json, &'j Json)> {
    match encoding.as_array().map(Vec::as_slice) {
        Some([first, second]) => Ok((first, second)),
        _ => Err(CodecError::malformed(type_name, "expected a pair")),
    }
}

fn property_name<'j>(type_name: &str, encoding: &'j Json) -> Result<&'j str> {
    encoding
        .as_str()
        .ok_or_else(|| CodecError::malformed(type_name, "property names must be strings"))
}

fn encode_properties(encoder: &mut Encoder<'_>, record: &Record) -> Result<Json> {
    let mut pairs = Vec::with_capacity(record.len());
    for (key, value) in record.iter() {
        pairs.push(json!([key, encoder.encode_value(value)?]));
    }
    Ok(Json::Array(pairs))
}

fn decode_properties(decoder: &mut Decoder<'_, '_>, type_name: &str, encoding: &Json) -> Result<Record> {
    let mut record = Record::new();
    for entry in list(type_name, encoding)? {
        let (key, code) = pair(type_name, entry)?;
        let key = property_name(type_name, key)?;
        record.insert(key, decoder.decode_child(code)?);
    }
    Ok(record)
}

fn encode_array(encoder: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let items = value
        .as_array()
        .ok_or_else(|| CodecError::malformed("array", "not an array"))?;
    encode_codes(encoder, items)
}

fn decode_array(decoder: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    let items = list("array", encoding)?
        .iter()
        .map(|code| decoder.decode_child(code))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::from(items))
}

fn encode_set(encoder: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let set = value
        .as_set()
        .ok_or_else(|| CodecError::malformed("set", "not a set"))?;
    encode_codes(encoder, set.iter())
}

fn decode_set(decoder: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    let mut set = SetValue::new();
    for code in list("set", encoding)? {
        set.insert(decoder.decode_child(code)?);
    }
    Ok(Value::from(set))
}

fn encode_map(encoder: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let map = value
        .as_map()
        .ok_or_else(|| CodecError::malformed("map", "not a map"))?;
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map.iter() {
        let key = encoder.encode_value(key)?;
        let value = encoder.encode_value(value)?;
        pairs.push(json!([key, value]));
    }
    Ok(Json::Array(pairs))
}

fn decode_map(decoder: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    let mut map = MapValue::new();
    for entry in list("map", encoding)? {
        let (key, value) = pair("map", entry)?;
        let key = decoder.decode_child(key)?;
        let value = decoder.decode_child(value)?;
        map.insert(key, value);
    }
    Ok(Value::from(map))
}

fn encode_object(encoder: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let record = value
        .as_record()
        .ok_or_else(|| CodecError::malformed("object", "not a record"))?;
    encode_properties(encoder, record)
}

fn decode_object(decoder: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    Ok(Value::from(decode_properties(decoder, "object", encoding)?))
}

// error

fn encode_error(encoder: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let error = value
        .as_error()
        .ok_or_else(|| CodecError::malformed("error", "not an error"))?;
    let message = encoder.encode_value(&Value::from(error.message()))?;
    let pairs = encode_properties(encoder, error.properties())?;

    let mut encoding = Map::with_capacity(2);
    encoding.insert("message".to_string(), Json::from(message));
    encoding.insert("pairs".to_string(), pairs);
    Ok(Json::Object(encoding))
}

fn decode_error(decoder: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    let message_code = encoding
        .get("message")
        .ok_or_else(|| CodecError::malformed("error", "missing message"))?;
    let message = match decoder.decode_child(message_code)? {
        Value::String(s) => s.to_string(),
        Value::Undefined => String::new(),
        other => other.to_string(),
    };

    let properties = match encoding.get("pairs") {
        Some(pairs) => decode_properties(decoder, "error", pairs)?,
        None => Record::new(),
    };

    let error = properties
        .iter()
        .fold(ErrorValue::new(message), |error, (key, value)| {
            error.with_property(key, value.clone())
        });
    Ok(Value::from(error))
}

// function

fn encode_function(encoder: &mut Encoder<'_>, value: &Value) -> Result<Json> {
    let function = value
        .as_function()
        .ok_or_else(|| CodecError::malformed("function", "not a function"))?;
    let key = encoder.export_function(function)?;
    Ok(json!({ "key": key, "length": function.arity() }))
}

fn decode_function(decoder: &mut Decoder<'_, '_>, encoding: &Json) -> Result<Value> {
    let key = encoding
        .get("key")
        .and_then(Json::as_str)
        .ok_or_else(|| CodecError::malformed("function", "missing key"))?;
    let arity = encoding
        .get("length")
        .and_then(Json::as_u64)
        .and_then(|length| usize::try_from(length).ok())
        .unwrap_or(0);
    let function = decoder.import_function(&Key::from(key), arity)?;
    Ok(Value::Function(function))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::value::Symbol;

    #[test]
    fn registry_order() {
        let names: Vec<&str> = REGISTRY.iter().map(|descriptor| descriptor.name).collect();
        assert_eq!(
            names,
            vec![
                "boolean",
                "null",
                "number",
                "string",
                "undefined",
                "array",
                "error",
                "function",
                "map",
                "set",
                "object"
            ]
        );
        for descriptor in &REGISTRY {
            assert_eq!(descriptor.kind.name(), descriptor.name);
        }
    }

    #[test]
    fn descriptor_for_each_kind() {
        let cases = [
            (Value::from(true), Kind::Boolean),
            (Value::Null, Kind::Null),
            (Value::from(1), Kind::Number),
            (Value::from("s"), Kind::String),
            (Value::Undefined, Kind::Undefined),
            (Value::array([]), Kind::Array),
            (ErrorValue::new("e").into(), Kind::Error),
            (Function::new_sync(0, |_| Ok(Value::Undefined)).into(), Kind::Function),
            (Value::map([]), Kind::Map),
            (Value::set([]), Kind::Set),
            (Value::record(Vec::<(String, Value)>::new()), Kind::Object),
        ];
        for (value, kind) in cases {
            assert_eq!(descriptor_for(&value).map(|d| d.kind), Some(kind));
        }
    }

    #[test]
    fn symbols_have_no_descriptor() {
        assert!(descriptor_for(&Symbol::new("s").into()).is_none());
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(descriptor_named("map").map(|d| d.kind), Some(Kind::Map));
        assert!(descriptor_named("functionApply").is_none());
    }
}
