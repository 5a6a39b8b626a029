//! surreal-cdc-sink
//!
//! Command-line host for the SurrealDB CDC destination. It reads OpenCDC
//! records as JSON lines and drives the destination lifecycle, and it can
//! print or apply the SurrealQL generated from a relation schema.
//!
//! # CLI Usage
//!
//! ```bash
//! # Apply a stream of OpenCDC records
//! surreal-cdc-sink write --input changes.jsonl \
//!   --surreal-endpoint ws://localhost:8000 \
//!   --namespace shop --database shop --scope root
//!
//! # Read records from stdin, settings from a file
//! cat changes.jsonl | surreal-cdc-sink write --input - --config sink.toml
//!
//! # Print the definitions generated for a relation schema
//! surreal-cdc-sink relations --relations-schema relations_schema.yaml --dry-run
//! ```
//!
//! Settings resolve in this order, later wins: built-in defaults, the
//! `--config` TOML file, environment variables, command-line flags.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use surreal_cdc_destination::config;

pub mod input;

pub use input::OpenCdcReader;

/// Defaults applied before the config file and flags.
pub const DEFAULT_OPTIONS: &[(&str, &str)] = &[
    (config::URL, "ws://localhost:8000"),
    (config::USERNAME, "root"),
    (config::PASSWORD, "root"),
];

#[derive(Parser, Clone, Debug, Default)]
pub struct DestinationOpts {
    /// TOML file with destination options (same keys as the plugin options)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// SurrealDB endpoint URL
    #[arg(long, env = "SURREAL_ENDPOINT")]
    pub surreal_endpoint: Option<String>,

    /// SurrealDB username
    #[arg(long, env = "SURREAL_USERNAME")]
    pub surreal_username: Option<String>,

    /// SurrealDB password
    #[arg(long, env = "SURREAL_PASSWORD")]
    pub surreal_password: Option<String>,

    /// Target SurrealDB namespace
    #[arg(long, env = "SURREAL_NAMESPACE")]
    pub namespace: Option<String>,

    /// Target SurrealDB database
    #[arg(long, env = "SURREAL_DATABASE")]
    pub database: Option<String>,

    /// SurrealDB access scope
    #[arg(long, env = "SURREAL_SCOPE")]
    pub scope: Option<String>,

    /// Remove the original key field after copying it to `id`
    #[arg(long)]
    pub delete_old_key: bool,

    /// Relation schema file (default: relations_schema.yaml)
    #[arg(long, value_name = "PATH")]
    pub relations_schema: Option<PathBuf>,

    /// What to do when a write fails: skip, fail or dead-letter
    #[arg(long)]
    pub write_failure_policy: Option<String>,

    /// Connection attempts before giving up
    #[arg(long)]
    pub connect_retries: Option<u32>,

    /// Seconds between connection attempts
    #[arg(long)]
    pub connect_retry_delay_secs: Option<u64>,
}

impl DestinationOpts {
    /// Build the destination option map.
    pub fn to_options(&self) -> Result<BTreeMap<String, String>> {
        let mut options: BTreeMap<String, String> = DEFAULT_OPTIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if let Some(path) = &self.config {
            options.extend(load_options_file(path)?);
        }

        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                options.insert(key.to_string(), value);
            }
        };
        set(config::URL, self.surreal_endpoint.clone());
        set(config::USERNAME, self.surreal_username.clone());
        set(config::PASSWORD, self.surreal_password.clone());
        set(config::NAMESPACE, self.namespace.clone());
        set(config::DATABASE, self.database.clone());
        set(config::SCOPE, self.scope.clone());
        set(
            config::DELETE_OLD_KEY,
            self.delete_old_key.then(|| "true".to_string()),
        );
        set(
            config::RELATIONS_SCHEMA,
            self.relations_schema
                .as_ref()
                .map(|p| p.display().to_string()),
        );
        set(
            config::WRITE_FAILURE_POLICY,
            self.write_failure_policy.clone(),
        );
        set(
            config::CONNECT_RETRIES,
            self.connect_retries.map(|v| v.to_string()),
        );
        set(
            config::CONNECT_RETRY_DELAY_SECS,
            self.connect_retry_delay_secs.map(|v| v.to_string()),
        );

        Ok(options)
    }
}

/// Read a flat TOML table of destination options.
pub fn load_options_file(path: &std::path::Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {path:?}"))?;
    parse_options(&content).with_context(|| format!("Failed to parse config file {path:?}"))
}

/// Parse a flat TOML table into string options.
///
/// Unlike a host option map, a config file is written by hand, so keys that
/// are not destination options are rejected.
pub fn parse_options(content: &str) -> Result<BTreeMap<String, String>> {
    let table: BTreeMap<String, toml::Value> = toml::from_str(content)?;
    let mut options = BTreeMap::new();
    for (key, value) in table {
        if !config::OPTION_KEYS.contains(&key.as_str()) {
            bail!(
                "Unknown option '{key}'. Expected one of: {}",
                config::OPTION_KEYS.join(", ")
            );
        }
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => bail!("Option '{key}' must be a scalar, got {}", other.type_str()),
        };
        options.insert(key, value);
    }
    Ok(options)
}
