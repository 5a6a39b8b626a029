//! Batch classification.
//!
//! A batch arrives as an arbitrarily interleaved sequence of events for many
//! collections and operations. Classification partitions it into groups that
//! share identical write semantics.

use cdc_core::{ChangeEvent, Operation};
use indexmap::IndexMap;
use std::fmt;

use crate::error::{DestinationError, Result};
use crate::normalize::{normalize, NormalizedRecord};

/// Composite grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub collection: String,
    pub operation: Operation,
}

impl GroupKey {
    pub fn new(collection: impl Into<String>, operation: Operation) -> Self {
        Self {
            collection: collection.into(),
            operation,
        }
    }

    /// Key for the event at `position`; events without a collection are
    /// rejected rather than grouped under an empty name.
    fn for_event(position: usize, event: &ChangeEvent) -> Result<Self> {
        if event.collection.trim().is_empty() {
            return Err(DestinationError::MissingCollection { position });
        }
        Ok(Self::new(event.collection.clone(), event.operation))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.operation)
    }
}

/// Events grouped by (collection, operation), each tagged with its batch
/// position.
pub type EventGroups<'a> = IndexMap<GroupKey, Vec<(usize, &'a ChangeEvent)>>;

/// Normalized records grouped by (collection, operation).
pub type OperationGroups = IndexMap<GroupKey, Vec<NormalizedRecord>>;

/// Partition events into (collection, operation) groups.
///
/// Single stable pass. Groups are ordered by the first appearance of their
/// key in the batch, and each group keeps the relative input order, so a
/// delete followed by a re-create of the same row is dispatched in that
/// order.
pub fn classify(events: &[ChangeEvent]) -> Result<EventGroups<'_>> {
    let mut groups = EventGroups::new();
    for (position, event) in events.iter().enumerate() {
        let key = GroupKey::for_event(position, event)?;
        groups.entry(key).or_default().push((position, event));
    }
    Ok(groups)
}

/// Classify and normalize a batch.
///
/// Any event that cannot be grouped or normalized fails the whole batch
/// before anything is written.
pub fn prepare_batch(events: &[ChangeEvent], delete_old_key: bool) -> Result<OperationGroups> {
    classify(events)?
        .into_iter()
        .map(|(key, members)| {
            let records = members
                .into_iter()
                .map(|(position, event)| {
                    normalize(event, delete_old_key).map_err(|source| {
                        DestinationError::Normalize {
                            position,
                            collection: event.collection.clone(),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((key, records))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizeError;
    use cdc_core::{Fields, Payload};
    use serde_json::{json, Value};

    fn event(collection: &str, operation: Operation, id: i64) -> ChangeEvent {
        let mut key = Fields::new();
        key.insert("id".to_string(), json!(id));
        let mut after = Fields::new();
        after.insert("id".to_string(), json!(id));
        ChangeEvent::new(collection, operation, key, after)
    }

    fn ids(members: &[(usize, &ChangeEvent)]) -> Vec<i64> {
        members
            .iter()
            .map(|(_, e)| e.key["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_groups_preserve_input_order() {
        let batch = vec![
            event("users", Operation::Create, 1),
            event("orders", Operation::Update, 10),
            event("users", Operation::Create, 2),
            event("users", Operation::Delete, 3),
            event("orders", Operation::Update, 11),
            event("users", Operation::Create, 4),
        ];

        let groups = classify(&batch).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(
            ids(&groups[&GroupKey::new("users", Operation::Create)]),
            vec![1, 2, 4]
        );
        assert_eq!(
            ids(&groups[&GroupKey::new("orders", Operation::Update)]),
            vec![10, 11]
        );
        assert_eq!(ids(&groups[&GroupKey::new("users", Operation::Delete)]), vec![3]);

        let positions: Vec<usize> = groups[&GroupKey::new("users", Operation::Create)]
            .iter()
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(positions, vec![0, 2, 5]);
    }

    #[test]
    fn test_snapshot_and_create_are_separate_groups() {
        let batch = vec![
            event("users", Operation::Snapshot, 1),
            event("users", Operation::Create, 2),
        ];
        assert_eq!(classify(&batch).unwrap().len(), 2);
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let batch = vec![
            event("users", Operation::Delete, 1),
            event("users", Operation::Create, 1),
            event("accounts", Operation::Create, 1),
            event("users", Operation::Delete, 2),
            event("users", Operation::Update, 1),
        ];
        let groups = classify(&batch).unwrap();
        let keys: Vec<String> = groups.keys().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "users/delete",
                "users/create",
                "accounts/create",
                "users/update"
            ]
        );
    }

    #[test]
    fn test_missing_collection_rejected() {
        let batch = vec![
            event("users", Operation::Create, 1),
            event("", Operation::Create, 2),
        ];
        assert!(matches!(
            classify(&batch),
            Err(DestinationError::MissingCollection { position: 1 })
        ));
    }

    #[test]
    fn test_empty_batch() {
        assert!(classify(&[]).unwrap().is_empty());
        assert!(prepare_batch(&[], false).unwrap().is_empty());
    }

    #[test]
    fn test_prepare_batch_normalizes() {
        let mut key = Fields::new();
        key.insert("uid".to_string(), json!(7));
        let mut after = Fields::new();
        after.insert("uid".to_string(), json!(7));
        after.insert("name".to_string(), json!("Ann"));
        let batch = vec![ChangeEvent::new("users", Operation::Create, key, after)];

        let groups = prepare_batch(&batch, true).unwrap();
        let records = &groups[&GroupKey::new("users", Operation::Create)];
        assert_eq!(
            Value::Object(records[0].fields.clone()),
            json!({"name": "Ann", "id": 7})
        );
    }

    #[test]
    fn test_prepare_batch_keeps_group_order() {
        let batch = vec![
            event("users", Operation::Delete, 1),
            event("users", Operation::Create, 1),
        ];
        let groups = prepare_batch(&batch, false).unwrap();
        let ops: Vec<Operation> = groups.keys().map(|k| k.operation).collect();
        assert_eq!(ops, vec![Operation::Delete, Operation::Create]);
    }

    #[test]
    fn test_prepare_batch_fails_on_composite_key() {
        let mut key = Fields::new();
        key.insert("a".to_string(), json!(1));
        key.insert("b".to_string(), json!(2));
        let batch = vec![
            event("users", Operation::Create, 1),
            ChangeEvent::new("lines", Operation::Update, key, Payload::Absent),
        ];

        match prepare_batch(&batch, false) {
            Err(DestinationError::Normalize {
                position,
                collection,
                source: NormalizeError::UnsupportedCompositeKey { fields },
            }) => {
                assert_eq!(position, 1);
                assert_eq!(collection, "lines");
                assert_eq!(fields, vec!["a", "b"]);
            }
            other => panic!("Expected composite key error, got {other:?}"),
        }
    }
}
