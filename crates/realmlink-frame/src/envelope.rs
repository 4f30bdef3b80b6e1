use serde_json::{Map, Value};

/// Envelope field carrying the channel tag.
pub const TAG_FIELD: &str = "type";
/// Envelope field carrying the payload.
pub const DATA_FIELD: &str = "data";

/// A multiplexed message: a payload tagged with its logical channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub tag: String,
    pub data: Value,
}

impl Envelope {
    /// Wrap `data` for the channel `tag`.
    pub fn new(tag: impl Into<String>, data: Value) -> Self {
        Self {
            tag: tag.into(),
            data,
        }
    }

    /// Render the envelope as a transport message.
    pub fn into_value(self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert(TAG_FIELD.to_string(), Value::String(self.tag));
        map.insert(DATA_FIELD.to_string(), self.data);
        Value::Object(map)
    }

    /// Extract the payload of `message` if it is an envelope for `tag`.
    ///
    /// Returns `None` for other tags and for messages that are not envelopes.
    /// An envelope without a `data` field carries `null`.
    pub fn open(message: &Value, tag: &str) -> Option<Value> {
        let object = message.as_object()?;
        match object.get(TAG_FIELD) {
            Some(Value::String(found)) if found == tag => {
                Some(object.get(DATA_FIELD).cloned().unwrap_or(Value::Null))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_shape() {
        let value = Envelope::new("realms", json!([1, 2])).into_value();
        assert_eq!(value, json!({"type": "realms", "data": [1, 2]}));
    }

    #[test]
    fn open_matching_tag() {
        let message = json!({"type": "realms", "data": {"0": ["number", 1]}});
        assert_eq!(
            Envelope::open(&message, "realms"),
            Some(json!({"0": ["number", 1]}))
        );
    }

    #[test]
    fn open_ignores_other_tags_and_plain_messages() {
        assert_eq!(
            Envelope::open(&json!({"type": "other", "data": 1}), "realms"),
            None
        );
        assert_eq!(Envelope::open(&json!("realms"), "realms"), None);
        assert_eq!(Envelope::open(&json!({"type": 7}), "realms"), None);
    }

    #[test]
    fn open_missing_data_is_null() {
        assert_eq!(
            Envelope::open(&json!({"type": "realms"}), "realms"),
            Some(Value::Null)
        );
    }
}
