//! Write dispatch.
//!
//! Maps each (collection, operation) group onto storage commands:
//!
//! | Operation        | Command                          |
//! |------------------|----------------------------------|
//! | snapshot, create | one bulk insert for the group    |
//! | update           | one merge per record             |
//! | delete           | one delete per record            |
//!
//! The store has multi-row insert but no multi-row upsert, update or delete,
//! hence the asymmetry.

use cdc_core::{Fields, Operation, RecordRef};
use surreal_sink::SurrealSink;
use tracing::{debug, error, trace};

use crate::classify::{GroupKey, OperationGroups};
use crate::config::WriteFailurePolicy;
use crate::error::WriteError;
use crate::normalize::{NormalizedRecord, ID_FIELD};

/// A failed storage command and the records it covered.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    pub collection: String,
    pub operation: Operation,
    pub records: Vec<Fields>,
    pub error: WriteError,
}

/// Outcome of dispatching one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Records whose command succeeded
    pub succeeded: usize,
    pub failures: Vec<FailedWrite>,
    /// Set when the fail policy stopped dispatch early
    pub aborted: bool,
}

impl DispatchReport {
    pub fn failed_records(&self) -> usize {
        self.failures.iter().map(|f| f.records.len()).sum()
    }

    pub fn first_error(&self) -> Option<&WriteError> {
        self.failures.first().map(|f| &f.error)
    }

    fn record_failure(&mut self, key: &GroupKey, records: Vec<Fields>, error: WriteError) {
        error!("Failed to process records: {error}");
        self.failures.push(FailedWrite {
            collection: key.collection.clone(),
            operation: key.operation,
            records,
            error,
        });
    }
}

/// Dispatch every group to the sink.
///
/// Under [`WriteFailurePolicy::Fail`] dispatch stops at the first failed
/// command; otherwise failures are recorded and dispatch carries on with the
/// next record or group.
pub async fn dispatch<S: SurrealSink + ?Sized>(
    sink: &S,
    groups: &OperationGroups,
    policy: WriteFailurePolicy,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (key, records) in groups {
        debug!("Dispatching {} records for {}", records.len(), key);
        let keep_going = match key.operation {
            Operation::Snapshot | Operation::Create => {
                insert_group(sink, key, records, policy, &mut report).await
            }
            Operation::Update => {
                write_each(sink, key, RecordCommand::Update, records, policy, &mut report).await
            }
            Operation::Delete => {
                write_each(sink, key, RecordCommand::Delete, records, policy, &mut report).await
            }
        };
        if !keep_going {
            report.aborted = true;
            break;
        }
    }

    report
}

/// Returns false when dispatch must stop.
async fn insert_group<S: SurrealSink + ?Sized>(
    sink: &S,
    key: &GroupKey,
    records: &[NormalizedRecord],
    policy: WriteFailurePolicy,
    report: &mut DispatchReport,
) -> bool {
    let payloads: Vec<Fields> = records.iter().map(|r| r.fields.clone()).collect();
    trace!("Bulk inserting {} records into {}", payloads.len(), key.collection);

    match sink.insert_records(&key.collection, &payloads).await {
        Ok(()) => {
            report.succeeded += payloads.len();
            true
        }
        Err(e) => {
            let error = WriteError {
                operation: key.operation,
                target: key.collection.clone(),
                message: format!("{e:#}"),
            };
            report.record_failure(key, payloads, error);
            policy != WriteFailurePolicy::Fail
        }
    }
}

/// Single-record commands; the store has no multi-row form for these.
#[derive(Debug, Clone, Copy)]
enum RecordCommand {
    Update,
    Delete,
}

/// Returns false when dispatch must stop.
async fn write_each<S: SurrealSink + ?Sized>(
    sink: &S,
    key: &GroupKey,
    command: RecordCommand,
    records: &[NormalizedRecord],
    policy: WriteFailurePolicy,
    report: &mut DispatchReport,
) -> bool {
    for record in records {
        if let Err(error) = write_one(sink, key, command, record).await {
            report.record_failure(key, vec![record.fields.clone()], error);
            if policy == WriteFailurePolicy::Fail {
                return false;
            }
        } else {
            report.succeeded += 1;
        }
    }
    true
}

async fn write_one<S: SurrealSink + ?Sized>(
    sink: &S,
    key: &GroupKey,
    command: RecordCommand,
    record: &NormalizedRecord,
) -> Result<(), WriteError> {
    let operation = key.operation;
    let id = record.id().cloned().ok_or_else(|| WriteError {
        operation,
        target: key.collection.clone(),
        message: format!("record has no '{ID_FIELD}' value"),
    })?;
    let target = RecordRef::new(key.collection.clone(), id);

    let result = match command {
        RecordCommand::Update => {
            // The id is carried by the target; leaving it in the content
            // conflicts with the update.
            let mut content = record.fields.clone();
            content.remove(ID_FIELD);
            trace!("Updating {target}");
            sink.update_record(&target, &content).await
        }
        RecordCommand::Delete => {
            trace!("Deleting {target}");
            sink.delete_record(&target).await
        }
    };

    result.map_err(|e| WriteError {
        operation,
        target: target.to_string(),
        message: format!("{e:#}"),
    })
}
