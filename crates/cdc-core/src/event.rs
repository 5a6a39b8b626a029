//! Change event data model.
//!
//! A [`ChangeEvent`] is the unit of input to the destination: one captured
//! row-level mutation against a source collection. Payloads are modelled as a
//! tagged union so that nothing downstream has to guess whether it is looking
//! at a decoded mapping or an opaque byte blob.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Field mapping used for keys and payloads. Insertion order is preserved.
pub type Fields = Map<String, Value>;

/// Errors raised while building change events from host input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("invalid operation {0:?}")]
    InvalidOperation(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Kind of row-level mutation carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operation {
    Snapshot,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snapshot" => Ok(Self::Snapshot),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(EventError::InvalidOperation(s.to_string())),
        }
    }
}

impl TryFrom<String> for Operation {
    type Error = EventError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.as_str().to_string()
    }
}

/// Post-image of a change event.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// Already-decoded key/value mapping
    Structured(Fields),
    /// Encoded bytes, expected to hold a JSON object
    Raw(Vec<u8>),
    /// No payload at all (typical for deletes)
    #[default]
    Absent,
}

impl Payload {
    /// Build a payload from its JSON wire form.
    ///
    /// Objects are structured data, strings are base64-encoded raw data and
    /// `null` means the payload is absent.
    pub fn from_json(value: Value) -> Result<Self, EventError> {
        match value {
            Value::Null => Ok(Self::Absent),
            Value::Object(map) => Ok(Self::Structured(map)),
            Value::String(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Self::Raw)
                .map_err(|e| EventError::InvalidPayload(format!("raw data is not base64: {e}"))),
            other => Err(EventError::InvalidPayload(format!(
                "expected an object, a base64 string or null, got {other}"
            ))),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<Fields> for Payload {
    fn from(fields: Fields) -> Self {
        Self::Structured(fields)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Structured(fields) => fields.serialize(serializer),
            Self::Raw(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Self::from_json(value.unwrap_or(Value::Null)).map_err(serde::de::Error::custom)
    }
}

/// One captured row-level mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Target collection (table) name
    pub collection: String,
    /// Mutation kind
    pub operation: Operation,
    /// Fields identifying the affected row
    pub key: Fields,
    /// Post-image payload
    pub after: Payload,
}

impl ChangeEvent {
    pub fn new(
        collection: impl Into<String>,
        operation: Operation,
        key: Fields,
        after: impl Into<Payload>,
    ) -> Self {
        Self {
            collection: collection.into(),
            operation,
            key,
            after: after.into(),
        }
    }
}

/// Fully-qualified record identifier, rendered as `table:key`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRef {
    pub table: String,
    pub key: Value,
}

impl RecordRef {
    pub fn new(table: impl Into<String>, key: Value) -> Self {
        Self {
            table: table.into(),
            key,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Value::String(s) => write!(f, "{}:{}", self.table, s),
            other => write!(f, "{}:{}", self.table, other),
        }
    }
}
