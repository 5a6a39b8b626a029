//! Relation schema definitions.
//!
//! A relation schema declares graph edges that SurrealDB should materialize
//! whenever a row is created in a trigger table. It is loaded once from a
//! YAML file:
//!
//! ```yaml
//! relations:
//!   - name: authored
//!     trigger:
//!       table: posts
//!       inField: author_id
//!       outField: id
//!     inTable: users
//!     outTable: posts
//! ```
//!
//! Individual entries default missing fields to empty strings so that one
//! malformed relation is reported on its own instead of failing the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for relation schema loading.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse schema: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

// ============================================================================
// Relation Types
// ============================================================================

/// The table and fields whose creation fires a relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTrigger {
    /// Table the event is defined on
    #[serde(default)]
    pub table: String,

    /// Field holding the `in` side of the edge
    #[serde(default, rename = "inField")]
    pub in_field: String,

    /// Field holding the `out` side of the edge
    #[serde(default, rename = "outField")]
    pub out_field: String,
}

/// A named graph relation materialized by a generated event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Relation (edge table) name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub trigger: RelationTrigger,

    /// Table referenced by `inField` values
    #[serde(default, rename = "inTable")]
    pub in_table: String,

    /// Table referenced by `outField` values
    #[serde(default, rename = "outTable")]
    pub out_table: String,
}

impl RelationSpec {
    pub fn new(
        name: impl Into<String>,
        trigger_table: impl Into<String>,
        in_field: impl Into<String>,
        out_field: impl Into<String>,
        in_table: impl Into<String>,
        out_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            trigger: RelationTrigger {
                table: trigger_table.into(),
                in_field: in_field.into(),
                out_field: out_field.into(),
            },
            in_table: in_table.into(),
            out_table: out_table.into(),
        }
    }
}

/// Full relation schema file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSchema {
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
}

impl RelationSchema {
    /// Load schema from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse schema from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let schema: RelationSchema = serde_yaml::from_str(yaml)?;
        Ok(schema)
    }

    /// Get all relation names in the schema.
    pub fn relation_names(&self) -> Vec<&str> {
        self.relations.iter().map(|r| r.name.as_str()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
