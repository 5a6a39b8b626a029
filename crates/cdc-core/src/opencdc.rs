//! OpenCDC record wire format.
//!
//! Hosts hand records over in the OpenCDC JSON shape:
//!
//! ```json
//! {
//!   "operation": "create",
//!   "metadata": {"opencdc.collection": "users"},
//!   "key": {"uid": 7},
//!   "payload": {"before": null, "after": {"uid": 7, "name": "Ann"}}
//! }
//! ```
//!
//! Only the fields the destination needs are modelled; everything else is
//! ignored on deserialization.

use crate::event::{ChangeEvent, EventError, Fields, Operation, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata key naming the collection a record belongs to.
pub const COLLECTION_METADATA_KEY: &str = "opencdc.collection";

/// Before/after images of an OpenCDC record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenCdcPayload {
    #[serde(default)]
    pub before: Payload,
    #[serde(default)]
    pub after: Payload,
}

/// An OpenCDC record as received from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenCdcRecord {
    /// Operation name; validated when converting to a [`ChangeEvent`]
    pub operation: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub key: Payload,
    #[serde(default)]
    pub payload: OpenCdcPayload,
}

impl OpenCdcRecord {
    /// Collection from metadata; empty when the host did not set one.
    pub fn collection(&self) -> &str {
        self.metadata
            .get(COLLECTION_METADATA_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl TryFrom<OpenCdcRecord> for ChangeEvent {
    type Error = EventError;

    fn try_from(record: OpenCdcRecord) -> Result<Self, Self::Error> {
        let operation: Operation = record.operation.parse()?;
        let collection = record.collection().to_string();
        let key = key_fields(record.key)?;

        Ok(ChangeEvent {
            collection,
            operation,
            key,
            after: record.payload.after,
        })
    }
}

/// Keys must resolve to a mapping. Raw keys are accepted when they hold a
/// JSON object.
fn key_fields(key: Payload) -> Result<Fields, EventError> {
    match key {
        Payload::Structured(fields) => Ok(fields),
        Payload::Absent => Ok(Fields::new()),
        Payload::Raw(bytes) if bytes.is_empty() => Ok(Fields::new()),
        Payload::Raw(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(EventError::InvalidKey(format!(
                "raw key must be a JSON object, got {other}"
            ))),
            Err(e) => Err(EventError::InvalidKey(format!(
                "raw key is not valid JSON: {e}"
            ))),
        },
    }
}
