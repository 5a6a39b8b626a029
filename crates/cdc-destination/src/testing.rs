//! In-memory sink for exercising the pipeline without a SurrealDB server.

use anyhow::{bail, Result};
use cdc_core::{Fields, RecordRef};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use surreal_sink::SurrealSink;

/// A storage command as issued by the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommand {
    Insert { table: String, records: Vec<Value> },
    Update { target: String, content: Value },
    Delete { target: String },
    Query(String),
    Close,
}

impl SinkCommand {
    pub fn insert(table: &str, records: Vec<Value>) -> Self {
        Self::Insert {
            table: table.to_string(),
            records,
        }
    }

    pub fn update(target: &str, content: Value) -> Self {
        Self::Update {
            target: target.to_string(),
            content,
        }
    }

    pub fn delete(target: &str) -> Self {
        Self::Delete {
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    commands: Vec<SinkCommand>,
    fail_on: BTreeSet<String>,
}

/// Records every command it receives.
///
/// Commands can be made to fail with [`RecordingSink::fail_on`]: inserts
/// match on the table name, updates and deletes on `table:key`, and queries
/// on any substring of the statement text. Failed commands are still
/// recorded. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<State>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_on(&self, target: &str) {
        self.state().fail_on.insert(target.to_string());
    }

    pub fn commands(&self) -> Vec<SinkCommand> {
        self.state().commands.clone()
    }

    pub fn clear(&self) {
        self.state().commands.clear();
    }

    fn record(&self, command: SinkCommand, failed: bool, target: &str) -> Result<()> {
        self.state().commands.push(command);
        if failed {
            bail!("injected failure for {target}");
        }
        Ok(())
    }

    fn should_fail(&self, target: &str) -> bool {
        self.state().fail_on.contains(target)
    }
}

#[async_trait::async_trait]
impl SurrealSink for RecordingSink {
    async fn insert_records(&self, table: &str, records: &[Fields]) -> Result<()> {
        let command = SinkCommand::Insert {
            table: table.to_string(),
            records: records.iter().cloned().map(Value::Object).collect(),
        };
        self.record(command, self.should_fail(table), table)
    }

    async fn update_record(&self, record: &RecordRef, content: &Fields) -> Result<()> {
        let target = record.to_string();
        let command = SinkCommand::Update {
            target: target.clone(),
            content: Value::Object(content.clone()),
        };
        self.record(command, self.should_fail(&target), &target)
    }

    async fn delete_record(&self, record: &RecordRef) -> Result<()> {
        let target = record.to_string();
        let command = SinkCommand::Delete {
            target: target.clone(),
        };
        self.record(command, self.should_fail(&target), &target)
    }

    async fn query(&self, statements: &str) -> Result<()> {
        let failed = self
            .state()
            .fail_on
            .iter()
            .any(|pattern| statements.contains(pattern.as_str()));
        self.record(SinkCommand::Query(statements.to_string()), failed, "query")
    }

    async fn close(&self) -> Result<()> {
        self.record(SinkCommand::Close, false, "close")
    }
}
