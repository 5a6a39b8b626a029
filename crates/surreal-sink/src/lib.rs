//! SurrealDB sink trait abstraction.
//!
//! This crate defines the `SurrealSink` trait: the opaque storage command
//! executor the CDC destination writes through. `surreal2-sink` implements
//! it on top of the SurrealDB SDK, and the destination's test harness
//! implements it with an in-memory recorder.
//!
//! The trait speaks cdc-core types (`Fields`, `RecordRef`) so the pipeline
//! never touches SDK types directly.

mod traits;

pub use traits::SurrealSink;
