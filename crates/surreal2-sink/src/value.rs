//! Conversion from cdc-core JSON values to SurrealDB v2 values.

use anyhow::{bail, Context, Result};
use cdc_core::{Fields, RecordRef};
use std::collections::BTreeMap;
use surrealdb::sql::{Array, Id, Number, Object, Strand, Thing, Value};

/// Convert a single JSON value to a SurrealQL value.
///
/// Integers outside the signed 64-bit range are rejected rather than widened
/// to a float, which would silently change record ids.
pub fn json_to_surreal(value: &serde_json::Value) -> Result<Value> {
    let value = match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(Number::from(i))
            } else if n.is_u64() {
                bail!("Integer {n} is out of range: only signed 64-bit integers are supported")
            } else if let Some(f) = n.as_f64() {
                Value::Number(Number::from(f))
            } else {
                bail!("Unsupported number {n}")
            }
        }
        serde_json::Value::String(s) => Value::Strand(Strand::from(s.clone())),
        serde_json::Value::Array(items) => Value::Array(Array::from(
            items
                .iter()
                .map(json_to_surreal)
                .collect::<Result<Vec<_>>>()?,
        )),
        serde_json::Value::Object(map) => Value::Object(fields_to_object(map)?),
    };
    Ok(value)
}

/// Convert a field mapping to a SurrealQL object.
pub fn fields_to_object(fields: &Fields) -> Result<Object> {
    let map = fields
        .iter()
        .map(|(k, v)| {
            json_to_surreal(v)
                .with_context(|| format!("Failed to convert field '{k}'"))
                .map(|value| (k.clone(), value))
        })
        .collect::<Result<BTreeMap<String, Value>>>()?;
    Ok(Object::from(map))
}

/// Convert a fully-qualified record reference to a SurrealDB Thing.
///
/// Returns an error for key types that cannot be a record ID - never falls
/// back silently.
pub fn record_ref_to_thing(record: &RecordRef) -> Result<Thing> {
    let id = match &record.key {
        serde_json::Value::String(s) => Id::from(s.clone()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Id::from(i),
            None => bail!(
                "Unsupported numeric record key {n} for table '{}': only integers are supported",
                record.table
            ),
        },
        other => bail!(
            "Unsupported record key {other} for table '{}'. Supported types: string, integer",
            record.table
        ),
    };
    Ok(Thing::from((record.table.as_str(), id)))
}

/// Render a table name as a SurrealQL identifier, escaping it when needed.
pub fn table_ident(table: &str) -> String {
    let plain = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        table.to_string()
    } else {
        format!("`{}`", table.replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_surreal_scalars() {
        assert_eq!(json_to_surreal(&json!(null)).unwrap(), Value::Null);
        assert_eq!(json_to_surreal(&json!(true)).unwrap(), Value::Bool(true));
        assert_eq!(
            json_to_surreal(&json!(42)).unwrap(),
            Value::Number(Number::from(42i64))
        );
        assert_eq!(
            json_to_surreal(&json!(1.5)).unwrap(),
            Value::Number(Number::from(1.5f64))
        );
        assert_eq!(
            json_to_surreal(&json!("Ann")).unwrap(),
            Value::Strand(Strand::from("Ann".to_string()))
        );
    }

    #[test]
    fn test_json_to_surreal_nested() {
        let value = json_to_surreal(&json!({"tags": ["a", "b"], "n": 1})).unwrap();
        match value {
            Value::Object(obj) => {
                assert_eq!(obj.len(), 2);
                assert!(matches!(obj.get("tags"), Some(Value::Array(a)) if a.len() == 2));
            }
            other => panic!("Expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_json_to_surreal_rejects_integers_beyond_i64() {
        assert_eq!(
            json_to_surreal(&json!(i64::MAX)).unwrap(),
            Value::Number(Number::from(i64::MAX))
        );
        assert!(json_to_surreal(&json!(u64::MAX)).is_err());
        assert!(json_to_surreal(&json!([1, u64::MAX])).is_err());

        let fields = match json!({"id": u64::MAX, "name": "Ann"}) {
            serde_json::Value::Object(map) => map,
            other => panic!("Expected object, got {other:?}"),
        };
        let err = fields_to_object(&fields).unwrap_err();
        assert!(format!("{err:#}").contains("'id'"), "{err:#}");
    }

    #[test]
    fn test_out_of_range_integer_rejected_for_ids_and_fields() {
        // Record keys and field values agree on what is representable
        let key = json!(u64::MAX);
        assert!(record_ref_to_thing(&RecordRef::new("users", key.clone())).is_err());
        assert!(json_to_surreal(&key).is_err());
    }

    #[test]
    fn test_record_ref_to_thing() {
        let thing = record_ref_to_thing(&RecordRef::new("orders", json!(5))).unwrap();
        assert_eq!(thing.tb, "orders");
        assert_eq!(thing.id, Id::from(5i64));

        let thing = record_ref_to_thing(&RecordRef::new("users", json!("ann"))).unwrap();
        assert_eq!(thing.id, Id::from("ann".to_string()));
    }

    #[test]
    fn test_record_ref_to_thing_unsupported() {
        assert!(record_ref_to_thing(&RecordRef::new("orders", json!(1.5))).is_err());
        assert!(record_ref_to_thing(&RecordRef::new("orders", json!(null))).is_err());
        assert!(record_ref_to_thing(&RecordRef::new("orders", json!([1]))).is_err());
    }

    #[test]
    fn test_table_ident() {
        assert_eq!(table_ident("users"), "users");
        assert_eq!(table_ident("wp_posts"), "wp_posts");
        assert_eq!(table_ident("order-items"), "`order-items`");
        assert_eq!(table_ident("1st"), "`1st`");
    }
}
