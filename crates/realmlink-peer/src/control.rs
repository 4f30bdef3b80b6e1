use realmlink_codec::{Dictionary, Entry, Key};
use serde::{Deserialize, Serialize};

use crate::error::{PeerError, Result};

/// Control type: call an exported function.
pub const FUNCTION_APPLY: &str = "functionApply";
/// Control type: settle a pending call.
pub const FUNCTION_RETURN: &str = "functionReturn";

/// Whether `type_name` is reserved for control messages.
pub fn is_control_type(type_name: &str) -> bool {
    type_name == FUNCTION_APPLY || type_name == FUNCTION_RETURN
}

/// `functionApply` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionApply {
    /// Function-less dictionary of the argument array.
    pub args: Dictionary,
    pub function_key: Key,
    pub return_value_key: Key,
}

/// `functionReturn` payload. Exactly one of `value` and `reason` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionReturn {
    pub return_value_key: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Dictionary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Dictionary>,
}

impl FunctionReturn {
    pub fn resolved(return_value_key: Key, value: Dictionary) -> Self {
        Self {
            return_value_key,
            value: Some(value),
            reason: None,
        }
    }

    pub fn rejected(return_value_key: Key, reason: Dictionary) -> Self {
        Self {
            return_value_key,
            value: None,
            reason: Some(reason),
        }
    }

    /// `Ok(value)` or `Err(reason)`. A reason takes precedence over a value.
    pub fn into_outcome(self) -> Result<std::result::Result<Dictionary, Dictionary>> {
        match (self.value, self.reason) {
            (_, Some(reason)) => Ok(Err(reason)),
            (Some(value), None) => Ok(Ok(value)),
            (None, None) => Err(PeerError::MalformedControl(format!(
                "{FUNCTION_RETURN} for {} carries neither value nor reason",
                self.return_value_key
            ))),
        }
    }
}

/// A control message, carried as a dictionary whose root entry has a
/// reserved type.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Apply(FunctionApply),
    Return(FunctionReturn),
}

impl ControlMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            ControlMessage::Apply(_) => FUNCTION_APPLY,
            ControlMessage::Return(_) => FUNCTION_RETURN,
        }
    }

    /// `{"0": [type, payload]}`.
    pub fn to_dictionary(&self) -> Result<Dictionary> {
        let payload = match self {
            ControlMessage::Apply(apply) => serde_json::to_value(apply)?,
            ControlMessage::Return(ret) => serde_json::to_value(ret)?,
        };
        let mut dictionary = Dictionary::new();
        dictionary.insert(Dictionary::ROOT, Entry::new(self.type_name(), payload));
        Ok(dictionary)
    }

    /// Parse `dictionary` as a control message.
    ///
    /// Returns `Ok(None)` for ordinary value dictionaries.
    pub fn from_dictionary(dictionary: &Dictionary) -> Result<Option<Self>> {
        let Some(root) = dictionary.root() else {
            return Ok(None);
        };
        let message = match root.type_name() {
            FUNCTION_APPLY => ControlMessage::Apply(FunctionApply::deserialize(root.encoding())?),
            FUNCTION_RETURN => {
                ControlMessage::Return(FunctionReturn::deserialize(root.encoding())?)
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

impl From<FunctionApply> for ControlMessage {
    fn from(value: FunctionApply) -> Self {
        ControlMessage::Apply(value)
    }
}

impl From<FunctionReturn> for ControlMessage {
    fn from(value: FunctionReturn) -> Self {
        ControlMessage::Return(value)
    }
}
