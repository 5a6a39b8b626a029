//! SurrealSink trait definition.
//!
//! The storage engine supports multi-row insert but has no batched
//! update or delete, so the trait mirrors that asymmetry: one bulk insert
//! call per table and one call per record for everything else.

use anyhow::Result;
use cdc_core::{Fields, RecordRef};

/// Storage command executor for SurrealDB.
///
/// # Usage Pattern
///
/// The destination is generic over the sink for zero-cost dispatch:
///
/// ```ignore
/// pub async fn dispatch<S: SurrealSink>(sink: &S, groups: &OperationGroups) {
///     sink.insert_records("users", &records).await?;
/// }
/// ```
#[async_trait::async_trait]
pub trait SurrealSink: Send + Sync {
    /// Insert all records into `table` with a single command.
    ///
    /// Records carry their own `id` field. Fails as a whole if any record
    /// conflicts with an existing one.
    async fn insert_records(&self, table: &str, records: &[Fields]) -> Result<()>;

    /// Merge `content` into the record identified by `record`.
    async fn update_record(&self, record: &RecordRef, content: &Fields) -> Result<()>;

    /// Delete the record identified by `record`.
    async fn delete_record(&self, record: &RecordRef) -> Result<()>;

    /// Execute raw SurrealQL statements (used for schema definitions).
    async fn query(&self, statements: &str) -> Result<()>;

    /// Invalidate the session and release the connection.
    async fn close(&self) -> Result<()>;
}
