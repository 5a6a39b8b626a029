//! Payload normalization.
//!
//! Every record that reaches the dispatcher is a plain field mapping holding
//! an `id` field, which is what SurrealDB uses as the record key.

use cdc_core::{ChangeEvent, Fields, Payload};
use serde_json::Value;

use crate::error::NormalizeError;

/// SurrealDB's primary key field.
pub const ID_FIELD: &str = "id";

/// A change event payload ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub fields: Fields,
}

impl NormalizedRecord {
    /// The resolved primary key value, if the record has one.
    pub fn id(&self) -> Option<&Value> {
        self.fields.get(ID_FIELD).filter(|v| !v.is_null())
    }
}

/// Decode a payload into a field mapping.
///
/// Structured payloads pass through. Raw bytes must hold a JSON object;
/// empty bytes and absent payloads become an empty mapping.
pub fn decode_payload(payload: &Payload) -> Result<Fields, NormalizeError> {
    match payload {
        Payload::Structured(fields) => Ok(fields.clone()),
        Payload::Absent => Ok(Fields::new()),
        Payload::Raw(bytes) if bytes.is_empty() => Ok(Fields::new()),
        Payload::Raw(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(NormalizeError::Decode(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(NormalizeError::Decode(e.to_string())),
        },
    }
}

/// Resolve which key field identifies the record.
///
/// `id` wins when present, otherwise the single key field is used, and an
/// empty key falls back to `id`. More than one field is a composite key,
/// which is not supported.
pub fn resolve_key_field(key: &Fields) -> Result<&str, NormalizeError> {
    if key.len() > 1 {
        return Err(NormalizeError::UnsupportedCompositeKey {
            fields: key.keys().cloned().collect(),
        });
    }
    Ok(key.keys().next().map(String::as_str).unwrap_or(ID_FIELD))
}

/// Normalize a change event into a record with an `id` field.
///
/// When the key field is not `id`, its value is copied into `id`; the
/// original field is removed only if `delete_old_key` is set. If the payload
/// does not carry the key field (deletes usually have no post-image) the
/// value from the event key is used instead. The event itself is untouched.
pub fn normalize(
    event: &ChangeEvent,
    delete_old_key: bool,
) -> Result<NormalizedRecord, NormalizeError> {
    let key_field = resolve_key_field(&event.key)?;
    let mut fields = decode_payload(&event.after)?;

    if key_field != ID_FIELD {
        match fields.get(key_field).cloned() {
            Some(value) => {
                fields.insert(ID_FIELD.to_string(), value);
                if delete_old_key {
                    fields.remove(key_field);
                }
            }
            None => {
                if let Some(value) = event.key.get(key_field) {
                    fields.insert(ID_FIELD.to_string(), value.clone());
                }
            }
        }
    } else if !fields.contains_key(ID_FIELD) {
        if let Some(value) = event.key.get(ID_FIELD) {
            fields.insert(ID_FIELD.to_string(), value.clone());
        }
    }

    Ok(NormalizedRecord { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_core::Operation;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {other:?}"),
        }
    }

    fn event(key: Value, after: Payload) -> ChangeEvent {
        ChangeEvent::new("users", Operation::Create, fields(key), after)
    }

    #[test]
    fn test_key_copied_to_id() {
        let e = event(
            json!({"uid": 7}),
            Payload::Structured(fields(json!({"uid": 7, "name": "Ann"}))),
        );
        let record = normalize(&e, false).unwrap();
        assert_eq!(
            Value::Object(record.fields),
            json!({"uid": 7, "name": "Ann", "id": 7})
        );
    }

    #[test]
    fn test_key_moved_to_id() {
        let e = event(
            json!({"uid": 7}),
            Payload::Structured(fields(json!({"uid": 7, "name": "Ann"}))),
        );
        let record = normalize(&e, true).unwrap();
        assert_eq!(Value::Object(record.fields), json!({"name": "Ann", "id": 7}));
    }

    #[test]
    fn test_id_key_is_noop() {
        let after = fields(json!({"id": 5, "status": "shipped"}));
        let e = event(json!({"id": 5}), Payload::Structured(after.clone()));
        assert_eq!(normalize(&e, true).unwrap().fields, after);
        assert_eq!(normalize(&e, false).unwrap().fields, after);
    }

    #[test]
    fn test_id_key_keeps_payload_id() {
        // The payload value wins over the key value when both are present
        let e = event(
            json!({"id": 5}),
            Payload::Structured(fields(json!({"id": 6}))),
        );
        assert_eq!(normalize(&e, false).unwrap().id(), Some(&json!(6)));
    }

    #[test]
    fn test_composite_key_rejected() {
        let e = event(
            json!({"order_id": 1, "line": 2}),
            Payload::Structured(fields(json!({"order_id": 1, "line": 2}))),
        );
        let err = normalize(&e, false).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::UnsupportedCompositeKey {
                fields: vec!["order_id".to_string(), "line".to_string()]
            }
        );
    }

    #[test]
    fn test_composite_key_with_id_still_rejected() {
        let e = event(json!({"id": 1, "tenant": 2}), Payload::Absent);
        assert!(matches!(
            normalize(&e, false),
            Err(NormalizeError::UnsupportedCompositeKey { .. })
        ));
    }

    #[test]
    fn test_empty_key_defaults_to_id() {
        let e = event(json!({}), Payload::Structured(fields(json!({"id": "a1"}))));
        let record = normalize(&e, false).unwrap();
        assert_eq!(record.id(), Some(&json!("a1")));
        assert_eq!(resolve_key_field(&Fields::new()).unwrap(), "id");
    }

    #[test]
    fn test_raw_payload_decoded() {
        let e = event(
            json!({"uid": 7}),
            Payload::Raw(br#"{"uid":7,"name":"Ann"}"#.to_vec()),
        );
        let record = normalize(&e, false).unwrap();
        assert_eq!(
            Value::Object(record.fields),
            json!({"uid": 7, "name": "Ann", "id": 7})
        );
    }

    #[test]
    fn test_empty_raw_payload_is_empty_mapping() {
        assert_eq!(decode_payload(&Payload::Raw(Vec::new())).unwrap(), Fields::new());
        assert_eq!(decode_payload(&Payload::Absent).unwrap(), Fields::new());
    }

    #[test]
    fn test_raw_payload_decode_errors() {
        assert!(matches!(
            decode_payload(&Payload::Raw(b"{not json".to_vec())),
            Err(NormalizeError::Decode(_))
        ));
        assert!(matches!(
            decode_payload(&Payload::Raw(b"[1,2,3]".to_vec())),
            Err(NormalizeError::Decode(_))
        ));
    }

    #[test]
    fn test_delete_without_payload_uses_key() {
        let e = ChangeEvent::new(
            "orders",
            Operation::Delete,
            fields(json!({"order_no": 9})),
            Payload::Absent,
        );
        let record = normalize(&e, true).unwrap();
        assert_eq!(Value::Object(record.fields), json!({"id": 9}));

        let e = ChangeEvent::new("orders", Operation::Delete, fields(json!({"id": 5})), fields(json!({})));
        assert_eq!(normalize(&e, false).unwrap().id(), Some(&json!(5)));
    }

    #[test]
    fn test_event_key_untouched() {
        let e = event(
            json!({"uid": 7}),
            Payload::Structured(fields(json!({"uid": 7}))),
        );
        let before = e.clone();
        normalize(&e, true).unwrap();
        assert_eq!(e, before);
    }

    #[test]
    fn test_missing_id_is_none() {
        let record = NormalizedRecord {
            fields: fields(json!({"id": null, "name": "x"})),
        };
        assert_eq!(record.id(), None);
    }
}
