use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::Result;

/// One dictionary entry: `[typeName, encoding]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry(pub String, pub Json);

impl Entry {
    pub fn new(type_name: impl Into<String>, encoding: Json) -> Self {
        Self(type_name.into(), encoding)
    }

    pub fn type_name(&self) -> &str {
        &self.0
    }

    pub fn encoding(&self) -> &Json {
        &self.1
    }
}

/// Flat encoding of a value graph: code -> entry, root at code 0.
///
/// On the wire this is a JSON object with decimal string keys:
/// `{"0": ["array", [1, 1]], "1": ["number", 7]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary(BTreeMap<u32, Entry>);

impl Dictionary {
    pub const ROOT: u32 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: u32, entry: Entry) {
        self.0.insert(code, entry);
    }

    pub fn get(&self, code: u32) -> Option<&Entry> {
        self.0.get(&code)
    }

    pub fn root(&self) -> Option<&Entry> {
        self.get(Self::ROOT)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Entry)> {
        self.0.iter().map(|(code, entry)| (*code, entry))
    }

    /// Parse a transport message as a dictionary.
    pub fn from_json(message: &Json) -> Result<Self> {
        Ok(Self::deserialize(message)?)
    }

    /// Render the dictionary as a transport message.
    pub fn to_json(&self) -> Result<Json> {
        Ok(serde_json::to_value(self)?)
    }
}

impl FromIterator<(u32, Entry)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (u32, Entry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
