//! SurrealDB v2 connection and write utilities
//!
//! Provides the connect-with-retries helper and `Surreal2Sink`, the
//! `SurrealSink` implementation backed by the SurrealDB v2 SDK.

mod connect;
mod sink_impl;
mod value;

pub use connect::{
    surreal_connect, websocket_endpoint, SurrealOpts, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_DELAY_SECS,
};
pub use sink_impl::Surreal2Sink;
pub use value::{fields_to_object, json_to_surreal, record_ref_to_thing, table_ident};

// Re-export SurrealDB types for use by the destination
pub use surrealdb::engine::any::Any as SurrealEngine;
pub use surrealdb::Surreal;
