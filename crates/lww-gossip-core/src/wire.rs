//! Gossip wire format
//!
//! A gossip message is a JSON object `{"lww": [...]}`. Outbound items are
//! always positional `[key, ts, node_id, value]` arrays, ordered by key.
//! Inbound items may also be records `{"key", "ts", "node_id", "value"}`;
//! each one is normalized on its own so a bad item cannot spoil the batch.

use crate::error::ValidationError;
use crate::types::{Entry, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Body of `POST /gossip`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GossipPayload {
    /// Raw items; validated individually by [`normalize_item`]
    #[serde(default)]
    pub lww: Vec<Value>,
}

impl GossipPayload {
    /// Encode a full store snapshot
    pub fn from_snapshot(snapshot: HashMap<String, Entry>) -> Self {
        let mut entries: Vec<Entry> = snapshot.into_values().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self::from_entries(entries)
    }

    /// Encode entries as positional tuples, preserving their order
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let lww = entries
            .into_iter()
            .map(|e| json!([e.key, e.timestamp, e.node_id, e.value]))
            .collect();
        Self { lww }
    }

    pub fn len(&self) -> usize {
        self.lww.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lww.is_empty()
    }
}

/// Acknowledgement returned by `POST /gossip`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipAck {
    pub ok: bool,
}

impl GossipAck {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Normalize one inbound item, record or positional, into an [`Entry`].
pub fn normalize_item(item: &Value) -> Result<Entry, ValidationError> {
    match item {
        Value::Object(fields) => from_record(fields),
        Value::Array(elements) => from_tuple(elements),
        other => Err(ValidationError::NotAnEntry(describe(other))),
    }
}

fn from_record(fields: &Map<String, Value>) -> Result<Entry, ValidationError> {
    let field = |name: &'static str| fields.get(name).ok_or(ValidationError::MissingField(name));

    Ok(Entry {
        key: coerce_key(field("key")?)?,
        timestamp: coerce_timestamp(field("ts")?)?,
        node_id: coerce_node_id(field("node_id")?)?,
        value: coerce_value(field("value")?)?,
    })
}

fn from_tuple(elements: &[Value]) -> Result<Entry, ValidationError> {
    let [key, ts, node_id, value] = elements else {
        return Err(ValidationError::WrongArity(elements.len()));
    };

    Ok(Entry {
        key: coerce_key(key)?,
        timestamp: coerce_timestamp(ts)?,
        node_id: coerce_node_id(node_id)?,
        value: coerce_value(value)?,
    })
}

fn coerce_key(v: &Value) -> Result<String, ValidationError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(wrong_type("key", "a string", other)),
    }
}

fn coerce_timestamp(v: &Value) -> Result<i64, ValidationError> {
    let ts = coerce_integer("ts", v)?;
    i64::try_from(ts).map_err(|_| wrong_type("ts", "a 64-bit integer", v))
}

fn coerce_node_id(v: &Value) -> Result<NodeId, ValidationError> {
    let id = coerce_integer("node_id", v)?;
    NodeId::try_from(id).map_err(|_| wrong_type("node_id", "a non-negative integer", v))
}

/// Integers, floats truncated toward zero, or integer strings
fn coerce_integer(field: &'static str, v: &Value) -> Result<i128, ValidationError> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i as i128)
            } else if let Some(u) = n.as_u64() {
                Ok(u as i128)
            } else {
                let f = n.as_f64().ok_or(ValidationError::NonFinite(field))?;
                if !f.is_finite() {
                    return Err(ValidationError::NonFinite(field));
                }
                Ok(f.trunc() as i128)
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| wrong_type(field, "an integer", v)),
        other => Err(wrong_type(field, "an integer", other)),
    }
}

fn coerce_value(v: &Value) -> Result<f64, ValidationError> {
    let value = match v {
        Value::Number(n) => n.as_f64().ok_or(ValidationError::NonFinite("value"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| wrong_type("value", "a number", v))?,
        other => return Err(wrong_type("value", "a number", other)),
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite("value"))
    }
}

fn wrong_type(field: &'static str, expected: &'static str, found: &Value) -> ValidationError {
    ValidationError::WrongType {
        field,
        expected,
        found: describe(found),
    }
}

fn describe(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(a) => format!("array of {}", a.len()),
        Value::Object(_) => "object".to_string(),
    }
}
