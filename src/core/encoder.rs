//! Ultralight 2.0 payload encoding.
//!
//! An [`AttributeSet`] is rendered as `name|value` pairs joined by `|`, in
//! ascending name order:
//!
//! ```text
//! {"temp": 21.5, "hum": 60}  ->  hum|60|temp|21.5
//! ```
//!
//! Strings are written raw, numbers and booleans in their JSON form, null as
//! an empty value, and arrays or objects as compact JSON. Neither names nor
//! values are escaped, so a `|` inside either produces a payload the agent
//! will split differently.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sources::SourceError;

/// Pair and field separator of the Ultralight format.
pub const SEPARATOR: char = '|';

/// Attribute name to value mapping, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, Value>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from any value that serializes to a map.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Serialization`] if serialization fails or the
    /// value is not a map.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, SourceError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(other) => Err(SourceError::Serialization(format!(
                "expected a map of attributes, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(SourceError::Serialization(e.to_string())),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds every attribute of `other`, overwriting on name collision.
    pub fn extend(&mut self, other: AttributeSet) {
        self.0.extend(other.0);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for AttributeSet {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

/// Ultralight text ready to publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EncodedPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<EncodedPayload> for String {
    fn from(payload: EncodedPayload) -> Self {
        payload.0
    }
}

/// Encodes an attribute set as an Ultralight measure payload.
pub fn encode(attributes: &AttributeSet) -> EncodedPayload {
    let mut out = String::new();
    for (name, value) in attributes.iter() {
        if !out.is_empty() {
            out.push(SEPARATOR);
        }
        out.push_str(name);
        out.push(SEPARATOR);
        render_value(value, &mut out);
    }
    EncodedPayload(out)
}

fn render_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        // serde_json's Display is compact JSON, which is also the textual
        // form of numbers and booleans.
        other => out.push_str(&other.to_string()),
    }
}
