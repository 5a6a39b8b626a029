//! Relation schema compiler.
//!
//! Each [`RelationSpec`] becomes two SurrealQL definitions: an event on the
//! trigger table that relates the referenced records whenever a row is
//! created, and a unique index on the edge table so a pair is related at most
//! once. Both definitions use `IF NOT EXISTS`, so applying a schema again is
//! a no-op.

use cdc_core::RelationSpec;
use surreal_sink::SurrealSink;
use tracing::{debug, error, info};

use crate::error::RelationCompileError;

/// Generated definitions for one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRelation {
    pub name: String,
    /// `DEFINE EVENT` statement
    pub event: String,
    /// `DEFINE INDEX` statement
    pub index: String,
}

impl CompiledRelation {
    /// Both statements as one query.
    pub fn to_surrealql(&self) -> String {
        format!("{} {}", self.event, self.index)
    }
}

/// Outcome of applying a relation schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationReport {
    /// Names of relations whose definitions were applied
    pub applied: Vec<String>,
    pub failures: Vec<RelationCompileError>,
}

impl RelationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate(spec: &RelationSpec) -> Result<(), RelationCompileError> {
    let checks = [
        ("name", spec.name.as_str()),
        ("trigger table", spec.trigger.table.as_str()),
        ("inField", spec.trigger.in_field.as_str()),
        ("outField", spec.trigger.out_field.as_str()),
        ("inTable", spec.in_table.as_str()),
        ("outTable", spec.out_table.as_str()),
    ];
    for (field, value) in checks {
        if !is_identifier(value) {
            return Err(RelationCompileError::InvalidIdentifier {
                relation: spec.name.clone(),
                field,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Generate the definitions for a relation.
///
/// Pure; the text is stable for a given spec. Every name must be a plain
/// identifier since it is interpolated into SurrealQL.
pub fn compile_relation(spec: &RelationSpec) -> Result<CompiledRelation, RelationCompileError> {
    validate(spec)?;

    let name = &spec.name;
    let trigger = &spec.trigger.table;
    let in_field = &spec.trigger.in_field;
    let out_field = &spec.trigger.out_field;
    let in_table = &spec.in_table;
    let out_table = &spec.out_table;

    let event = format!(
        "DEFINE EVENT IF NOT EXISTS {in_table}_{name}_{out_table}_relation ON TABLE {trigger} \
         WHEN $event = 'CREATE' AND $after.{in_field} != NONE AND $after.{in_field} != NULL \
         THEN {{ \
         LET $in = IF type::is::record($after.{in_field}) {{ $after.{in_field} }} \
         ELSE {{ type::thing('{in_table}', $after.{in_field}) }}; \
         LET $out = IF type::is::record($after.{out_field}) {{ $after.{out_field} }} \
         ELSE {{ type::thing('{out_table}', $after.{out_field}) }}; \
         RELATE $in->{name}->$out; \
         }};"
    );
    let index = format!(
        "DEFINE INDEX IF NOT EXISTS {name}_unique_relationship ON TABLE {name} COLUMNS in, out UNIQUE;"
    );

    Ok(CompiledRelation {
        name: name.clone(),
        event,
        index,
    })
}

/// Compile and apply every relation.
///
/// Failures are logged and collected; one bad relation never stops the rest.
pub async fn apply_relations<S: SurrealSink + ?Sized>(
    sink: &S,
    specs: &[RelationSpec],
) -> RelationReport {
    let mut report = RelationReport::default();

    for spec in specs {
        let compiled = match compile_relation(spec) {
            Ok(compiled) => compiled,
            Err(e) => {
                error!("Failed to create relation event: {e}");
                report.failures.push(e);
                continue;
            }
        };

        debug!("Applying relation '{}'", compiled.name);
        match sink.query(&compiled.to_surrealql()).await {
            Ok(()) => report.applied.push(compiled.name),
            Err(e) => {
                let e = RelationCompileError::Apply {
                    relation: compiled.name,
                    message: format!("{e:#}"),
                };
                error!("Failed to create relation event: {e}");
                report.failures.push(e);
            }
        }
    }

    info!(
        "Applied {} relations ({} failed)",
        report.applied.len(),
        report.failures.len()
    );
    report
}
