//! Core types for the surreal-cdc-sink framework.
//!
//! This crate provides the data model shared by the destination pipeline
//! and the SurrealDB sink implementations:
//!
//! - [`ChangeEvent`] - One captured row-level mutation
//! - [`Operation`] - The kind of mutation (snapshot, create, update, delete)
//! - [`Payload`] - Post-image as a structured mapping, raw bytes, or absent
//! - [`RecordRef`] - Fully-qualified `table:key` record identifier
//! - [`RelationSchema`] - Declarative graph relations loaded from YAML
//!
//! # Architecture
//!
//! ```text
//! cdc-core (this crate)
//!    │
//!    ├─── surreal-sink            (storage command trait, uses Fields/RecordRef)
//!    ├─── surreal2-sink           (SurrealDB v2 implementation)
//!    └─── surreal-cdc-destination (normalize, classify, dispatch, relations)
//! ```

pub mod event;
pub mod opencdc;
pub mod relation;

pub use event::{ChangeEvent, EventError, Fields, Operation, Payload, RecordRef};
pub use opencdc::{OpenCdcPayload, OpenCdcRecord, COLLECTION_METADATA_KEY};
pub use relation::{RelationSchema, RelationSpec, RelationTrigger, SchemaError};
