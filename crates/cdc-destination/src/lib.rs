//! SurrealDB CDC destination
//!
//! Applies batches of change-data-capture events to SurrealDB:
//!
//! 1. classify the batch into (collection, operation) groups
//! 2. normalize each payload so it carries an `id` field
//! 3. dispatch each group as bulk inserts or per-record updates and deletes
//!
//! On open, a declarative relation schema is compiled into SurrealDB events
//! that materialize graph edges whenever a row is created.
//!
//! ```ignore
//! use surreal_cdc_destination::Destination;
//!
//! let config = Destination::configure(&options)?;
//! let destination = Destination::open(config).await?;
//! let report = destination.write(&events).await?;
//! destination.teardown().await?;
//! ```

pub mod classify;
pub mod config;
pub mod destination;
pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod relations;

#[doc(hidden)]
pub mod testing;

pub use classify::{classify, prepare_batch, EventGroups, GroupKey, OperationGroups};
pub use config::{DestinationConfig, WriteFailurePolicy, DEFAULT_RELATIONS_SCHEMA};
pub use destination::{DeadLetter, Destination, WriteReport};
pub use dispatch::{dispatch, DispatchReport, FailedWrite};
pub use error::{
    ConfigError, DestinationError, NormalizeError, RelationCompileError, Result, WriteError,
};
pub use normalize::{normalize, NormalizedRecord, ID_FIELD};
pub use relations::{apply_relations, compile_relation, CompiledRelation, RelationReport};

// Re-export the storage seam and data model for hosts
pub use cdc_core::{ChangeEvent, Operation, Payload, RelationSchema, RelationSpec};
pub use surreal_sink::SurrealSink;
