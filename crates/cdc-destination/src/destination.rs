//! Destination lifecycle: configure, open, write, teardown.

use cdc_core::{ChangeEvent, Fields, Operation, RelationSchema};
use std::collections::BTreeMap;
use std::time::Instant;
use surreal2_sink::Surreal2Sink;
use surreal_sink::SurrealSink;
use tracing::{debug, info, warn};

use crate::classify::prepare_batch;
use crate::config::{DestinationConfig, WriteFailurePolicy};
use crate::dispatch::dispatch;
use crate::error::{DestinationError, Result, WriteError};
use crate::relations::{apply_relations, RelationReport};

/// A record the storage rejected, handed back under the dead-letter policy.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub collection: String,
    pub operation: Operation,
    /// Normalized payload as it was sent
    pub record: Fields,
    pub error: WriteError,
}

/// Outcome of one `write` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    /// Events accepted from the host
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Empty unless the dead-letter policy is configured
    pub dead_letters: Vec<DeadLetter>,
}

/// A SurrealDB CDC destination bound to an open session.
pub struct Destination<S: SurrealSink> {
    config: DestinationConfig,
    sink: S,
    relations: RelationReport,
}

impl<S: SurrealSink> std::fmt::Debug for Destination<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("url", &self.config.url)
            .field("namespace", &self.config.namespace)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl Destination<Surreal2Sink> {
    /// Validate host options.
    pub fn configure(options: &BTreeMap<String, String>) -> Result<DestinationConfig> {
        Ok(DestinationConfig::from_options(options)?)
    }

    /// Connect to SurrealDB and prepare the destination.
    pub async fn open(config: DestinationConfig) -> Result<Self> {
        info!(
            "Opening SurrealDB destination at {} ({}/{})",
            config.url, config.namespace, config.database
        );
        let sink = Surreal2Sink::connect(&config.surreal_opts())
            .await
            .map_err(|e| DestinationError::Connection(format!("{e:#}")))?;
        Self::open_with_sink(config, sink).await
    }
}

impl<S: SurrealSink> Destination<S> {
    /// Prepare the destination on an already connected sink.
    ///
    /// Loads the relation schema (a missing or unparseable file is fatal)
    /// and applies it. Individual relation failures are logged and reported
    /// through [`Destination::relations`].
    pub async fn open_with_sink(config: DestinationConfig, sink: S) -> Result<Self> {
        let schema = RelationSchema::from_file(&config.relations_schema).map_err(|source| {
            DestinationError::Schema {
                path: config.relations_schema.display().to_string(),
                source,
            }
        })?;
        debug!(
            "Loaded {} relations from {}",
            schema.relations.len(),
            config.relations_schema.display()
        );

        let relations = apply_relations(&sink, &schema.relations).await;
        if !relations.is_clean() {
            warn!(
                "{} of {} relations could not be applied",
                relations.failures.len(),
                schema.relations.len()
            );
        }

        Ok(Self {
            config,
            sink,
            relations,
        })
    }

    pub fn config(&self) -> &DestinationConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Result of applying the relation schema during open.
    pub fn relations(&self) -> &RelationReport {
        &self.relations
    }

    /// Write a batch of change events.
    ///
    /// Events are classified and normalized up front; a malformed event fails
    /// the batch before anything is written. Failed storage commands are then
    /// handled according to the configured [`WriteFailurePolicy`].
    pub async fn write(&self, events: &[ChangeEvent]) -> Result<WriteReport> {
        if events.is_empty() {
            debug!("Empty batch, nothing to write");
            return Ok(WriteReport::default());
        }

        let start = Instant::now();
        let policy = self.config.write_failure_policy;
        let groups = prepare_batch(events, self.config.delete_old_key)?;
        let dispatched = dispatch(&self.sink, &groups, policy).await;

        if dispatched.aborted {
            if let Some(error) = dispatched.first_error() {
                return Err(DestinationError::Write {
                    written: dispatched.succeeded,
                    source: error.clone(),
                });
            }
        }

        let failed = dispatched.failed_records();
        let dead_letters = if policy == WriteFailurePolicy::DeadLetter {
            dispatched
                .failures
                .into_iter()
                .flat_map(|failure| {
                    let collection = failure.collection;
                    let operation = failure.operation;
                    let error = failure.error;
                    failure.records.into_iter().map(move |record| DeadLetter {
                        collection: collection.clone(),
                        operation,
                        record,
                        error: error.clone(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        info!(
            "Processed {} records in {} groups in {:?} ({} failed)",
            events.len(),
            groups.len(),
            start.elapsed(),
            failed
        );

        Ok(WriteReport {
            processed: events.len(),
            succeeded: dispatched.succeeded,
            failed,
            dead_letters,
        })
    }

    /// Invalidate and close the SurrealDB session.
    pub async fn teardown(self) -> Result<()> {
        info!("Tearing down SurrealDB destination");
        self.sink
            .close()
            .await
            .map_err(|e| DestinationError::Teardown(format!("{e:#}")))
    }
}
