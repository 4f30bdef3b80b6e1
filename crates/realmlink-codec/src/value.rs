use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value as Json};

use crate::function::Function;

/// Number of characters kept by [`inspect`] before truncating.
const INSPECT_CUTOFF: usize = 25;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A value that can cross a realm boundary.
///
/// Composite values are shared through `Arc` and are read-only once built.
/// Cloning a `Value` clones the reference, not the contents, so identity is
/// preserved: see [`Value::ptr_eq`] and [`Value::same_value_zero`].
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<[Value]>),
    Record(Arc<Record>),
    Map(Arc<MapValue>),
    Set(Arc<SetValue>),
    Error(Arc<ErrorValue>),
    Function(Function),
    /// A unique token. Symbols have no wire encoding.
    Symbol(Symbol),
}

/// Key used to compare values by identity (composites) or by
/// SameValueZero (primitives).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IdentityKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(Arc<str>),
    Pointer(usize),
}

fn number_identity(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

fn arc_address<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

impl Value {
    /// Build an array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect::<Vec<_>>().into())
    }

    /// Build a record value from key/value pairs.
    pub fn record<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::from(pairs.into_iter().collect::<Record>())
    }

    /// Build a map value from key/value pairs.
    pub fn map(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::from(pairs.into_iter().collect::<MapValue>())
    }

    /// Build a set value.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::from(items.into_iter().collect::<SetValue>())
    }

    pub(crate) fn identity_key(&self) -> IdentityKey {
        match self {
            Value::Undefined => IdentityKey::Undefined,
            Value::Null => IdentityKey::Null,
            Value::Boolean(b) => IdentityKey::Boolean(*b),
            Value::Number(n) => IdentityKey::Number(number_identity(*n)),
            Value::String(s) => IdentityKey::String(s.clone()),
            Value::Array(a) => IdentityKey::Pointer(arc_address(a)),
            Value::Record(r) => IdentityKey::Pointer(arc_address(r)),
            Value::Map(m) => IdentityKey::Pointer(arc_address(m)),
            Value::Set(s) => IdentityKey::Pointer(arc_address(s)),
            Value::Error(e) => IdentityKey::Pointer(arc_address(e)),
            Value::Function(f) => IdentityKey::Pointer(f.id()),
            Value::Symbol(s) => IdentityKey::Pointer(s.id()),
        }
    }

    /// SameValueZero: composites are equal when they are the same reference,
    /// primitives when they hold the same value (`NaN` equals `NaN`, `+0`
    /// equals `-0`).
    pub fn same_value_zero(&self, other: &Value) -> bool {
        self.identity_key() == other.identity_key()
    }

    /// `true` when both values are the same composite reference.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.identity_key(), other.identity_key()) {
            (IdentityKey::Pointer(a), IdentityKey::Pointer(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(&**items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(&**record),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(map) => Some(&**map),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetValue> {
        match self {
            Value::Set(set) => Some(&**set),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Value::Error(error) => Some(&**error),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Convert a plain JSON document into a value.
    ///
    /// Objects become records (key order kept), numbers become `f64`.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json)),
            Json::Object(map) => {
                Value::record(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))))
            }
        }
    }

    /// Render the value as JSON the way `JSON.stringify` would.
    ///
    /// Non-finite numbers, `undefined`, functions and symbols become `null`
    /// (and are skipped as record properties); maps and sets become `{}`;
    /// errors become their own properties.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Undefined | Value::Function(_) | Value::Symbol(_) | Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Number(n) => finite_number(*n).unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => properties_to_json(record),
            Value::Map(_) | Value::Set(_) => Json::Object(Map::new()),
            Value::Error(error) => properties_to_json(&error.properties),
        }
    }

    /// Short rendering for diagnostics, truncated to 25 characters plus `...`.
    pub fn inspect(&self) -> String {
        inspect(self)
    }
}

/// Short rendering of `value` for diagnostics.
///
/// The JSON rendering is cut after 25 characters and suffixed with `...`.
/// Values with no JSON form render as `undefined`, `[Function: n]` or
/// `Symbol(description)`.
pub fn inspect(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > INSPECT_CUTOFF {
        let mut cut: String = rendered.chars().take(INSPECT_CUTOFF).collect();
        cut.push_str("...");
        cut
    } else {
        rendered
    }
}

fn is_json_hole(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Function(_) | Value::Symbol(_)
    )
}

fn properties_to_json(record: &Record) -> Json {
    let mut map = Map::new();
    for (key, value) in record.iter() {
        if !is_json_hole(value) {
            map.insert(key.to_string(), value.to_json());
        }
    }
    Json::Object(map)
}

/// Finite numbers as JSON, integral values without a fraction. `-0` keeps
/// its sign.
pub(crate) fn finite_number(n: f64) -> Option<Json> {
    if !n.is_finite() {
        return None;
    }
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER && !negative_zero {
        return Some(Json::from(n as i64));
    }
    Number::from_f64(n).map(Json::Number)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Function(function) => write!(f, "[Function: {}]", function.arity()),
            Value::Symbol(symbol) => write!(f, "{symbol:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Structural equality.
///
/// Composites compare element-wise (map and set entries in insertion order);
/// functions and symbols compare by identity; `NaN` equals `NaN`.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.id() == b.id(),
            (Value::Symbol(a), Value::Symbol(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value.into())
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(Arc::new(value))
    }
}

impl From<MapValue> for Value {
    fn from(value: MapValue) -> Self {
        Value::Map(Arc::new(value))
    }
}

impl From<SetValue> for Value {
    fn from(value: SetValue) -> Self {
        Value::Set(Arc::new(value))
    }
}

impl From<ErrorValue> for Value {
    fn from(value: ErrorValue) -> Self {
        Value::Error(Arc::new(value))
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Value::Symbol(value)
    }
}

/// A plain record: string keys in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// A copy of this record with `key` set to `value`.
    pub fn with_entry(&self, key: impl Into<String>, value: Value) -> Record {
        let mut copy = self.clone();
        copy.insert(key, value);
        copy
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// A map keyed by SameValueZero, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    entries: Vec<(Value, Value)>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.same_value_zero(key))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl FromIterator<(Value, Value)> for MapValue {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = MapValue::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// A set of values unique under SameValueZero, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetValue {
    items: Vec<Value>,
}

impl SetValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value`; returns `false` if it was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|item| item.same_value_zero(value))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}

impl FromIterator<Value> for SetValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = SetValue::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// An error: a message plus any number of named properties.
///
/// `name` is an ordinary property, as are ad hoc diagnostic fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorValue {
    message: String,
    properties: Record,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            properties: Record::new(),
        }
    }

    /// Set the `name` property.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_property("name", Value::from(name.into()))
    }

    /// Set an arbitrary property.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `name` property, or `"Error"` when it is absent or not a string.
    pub fn name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Error")
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &Record {
        &self.properties
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message)
        }
    }
}

struct SymbolInner {
    description: Option<String>,
}

/// A unique token compared by identity.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolInner>);

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Self(Arc::new(SymbolInner {
            description: Some(description.into()),
        }))
    }

    pub fn anonymous() -> Self {
        Self(Arc::new(SymbolInner { description: None }))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    pub(crate) fn id(&self) -> usize {
        arc_address(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or_default())
    }
}
