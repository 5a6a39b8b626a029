//! Implementation of SurrealSink for SurrealDB v2.

use anyhow::Result;
use cdc_core::{Fields, RecordRef};
use surreal_sink::SurrealSink;
use surrealdb::engine::any::Any;
use surrealdb::sql::{Array, Value};
use surrealdb::Surreal;

use crate::connect::{surreal_connect, SurrealOpts};
use crate::value::{fields_to_object, record_ref_to_thing, table_ident};

/// Wrapper around Surreal<Any> that implements SurrealSink.
pub struct Surreal2Sink {
    client: Surreal<Any>,
}

impl Surreal2Sink {
    /// Create a new Surreal2Sink from an existing Surreal connection.
    pub fn new(client: Surreal<Any>) -> Self {
        Self { client }
    }

    /// Connect, select namespace/database and authenticate.
    pub async fn connect(opts: &SurrealOpts) -> Result<Self> {
        Ok(Self::new(surreal_connect(opts).await?))
    }

    /// Get a reference to the underlying Surreal client.
    pub fn inner(&self) -> &Surreal<Any> {
        &self.client
    }
}

#[async_trait::async_trait]
impl SurrealSink for Surreal2Sink {
    async fn insert_records(&self, table: &str, records: &[Fields]) -> Result<()> {
        // Multi-row INSERT has no ON DUPLICATE KEY UPDATE form, so one
        // conflicting id fails the whole statement.
        let query = format!("INSERT INTO {} $records", table_ident(table));
        let content = Value::Array(Array::from(
            records
                .iter()
                .map(|r| fields_to_object(r).map(Value::Object))
                .collect::<Result<Vec<_>>>()?,
        ));

        tracing::trace!(
            "Executing SurrealDB query: {} ({} records)",
            query,
            records.len()
        );

        self.client
            .query(query)
            .bind(("records", content))
            .await?
            .check()?;

        tracing::trace!(
            "Successfully inserted {} records into {}",
            records.len(),
            table
        );
        Ok(())
    }

    async fn update_record(&self, record: &RecordRef, content: &Fields) -> Result<()> {
        let thing = record_ref_to_thing(record)?;
        let content = Value::Object(fields_to_object(content)?);
        let query = "UPDATE $record_id MERGE $content";
        tracing::trace!("Executing SurrealDB query: {} for record: {}", query, record);

        self.client
            .query(query)
            .bind(("record_id", thing))
            .bind(("content", content))
            .await?
            .check()?;

        tracing::trace!("Successfully updated record: {}", record);
        Ok(())
    }

    async fn delete_record(&self, record: &RecordRef) -> Result<()> {
        let thing = record_ref_to_thing(record)?;
        let query = "DELETE $record_id";
        tracing::trace!("Executing SurrealDB query: {} for record: {}", query, record);

        self.client
            .query(query)
            .bind(("record_id", thing))
            .await?
            .check()?;

        tracing::trace!("Successfully deleted record: {}", record);
        Ok(())
    }

    async fn query(&self, statements: &str) -> Result<()> {
        tracing::trace!("Executing SurrealDB query: {}", statements);
        self.client.query(statements).await?.check()?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.invalidate().await?;
        tracing::debug!("SurrealDB session invalidated");
        Ok(())
    }
}
