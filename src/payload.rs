/*!
 * Decoded Table API responses
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record: field name to scalar or nested value
pub type Record = Map<String, Value>;

/// A decoded response body, kept exactly as the instance sent it.
///
/// Reads answer `{"result": [record, ...]}`; creates answer
/// `{"result": record}`. Nothing about the shape is enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePayload(Value);

impl RemotePayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The `result` member, if any
    pub fn result(&self) -> Option<&Value> {
        self.0.get("result")
    }

    /// Records of a read response; empty when `result` is not an array
    pub fn records(&self) -> &[Value] {
        self.result()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The single record of a create response
    pub fn record(&self) -> Option<&Record> {
        self.result().and_then(Value::as_object)
    }
}

/// Display text of a field, or `None` when the field is absent.
///
/// Reference fields (`{"link": ..., "value": ...}`) show their `value`;
/// `null` shows as an empty string.
pub fn field_text(record: &Value, field: &str) -> Option<String> {
    record.get(field).map(display_value)
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("value") {
            Some(inner) => display_value(inner),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}
