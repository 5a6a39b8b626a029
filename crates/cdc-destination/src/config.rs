//! Destination configuration.
//!
//! The host hands configuration over as a flat string map (the plugin
//! `configure` call). [`DestinationConfig::from_options`] validates it and
//! fills in defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use surreal2_sink::{SurrealOpts, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
use tracing::warn;

use crate::error::ConfigError;

pub const URL: &str = "url";
pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const NAMESPACE: &str = "namespace";
pub const DATABASE: &str = "database";
pub const SCOPE: &str = "scope";
pub const DELETE_OLD_KEY: &str = "delete_old_key";
pub const RELATIONS_SCHEMA: &str = "relations_schema";
pub const WRITE_FAILURE_POLICY: &str = "write_failure_policy";
pub const CONNECT_RETRIES: &str = "connect_retries";
pub const CONNECT_RETRY_DELAY_SECS: &str = "connect_retry_delay_secs";

/// Every option key the destination recognizes.
pub const OPTION_KEYS: &[&str] = &[
    URL,
    USERNAME,
    PASSWORD,
    NAMESPACE,
    DATABASE,
    SCOPE,
    DELETE_OLD_KEY,
    RELATIONS_SCHEMA,
    WRITE_FAILURE_POLICY,
    CONNECT_RETRIES,
    CONNECT_RETRY_DELAY_SECS,
];

/// Relation schema file read at open when none is configured.
pub const DEFAULT_RELATIONS_SCHEMA: &str = "relations_schema.yaml";

/// What to do when a single insert/update/delete command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFailurePolicy {
    /// Log the failure and keep going; the batch still counts as processed
    #[default]
    Skip,
    /// Stop at the first failure and fail the batch
    Fail,
    /// Keep going and hand the failed records back to the caller
    DeadLetter,
}

impl fmt::Display for WriteFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
            Self::DeadLetter => write!(f, "dead-letter"),
        }
    }
}

impl FromStr for WriteFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            "dead-letter" | "dead_letter" | "dlq" => Ok(Self::DeadLetter),
            _ => Err(ConfigError::InvalidValue {
                key: WRITE_FAILURE_POLICY.to_string(),
                value: s.to_string(),
                reason: "expected 'skip', 'fail' or 'dead-letter'".to_string(),
            }),
        }
    }
}

/// Validated destination configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationConfig {
    /// SurrealDB endpoint URL
    pub url: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    /// Access scope; carried for the host, root sign-in does not use it
    pub scope: String,
    /// Remove the original key field after copying its value to `id`
    pub delete_old_key: bool,
    pub relations_schema: PathBuf,
    pub write_failure_policy: WriteFailurePolicy,
    pub connect_retries: u32,
    pub connect_retry_delay_secs: u64,
}

impl DestinationConfig {
    /// Validate a host option map.
    ///
    /// Required: `url`, `username`, `password`, `namespace`, `database`,
    /// `scope`. Keys outside [`OPTION_KEYS`] belong to the host and are
    /// ignored with a warning.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        for unknown in options
            .keys()
            .filter(|k| !OPTION_KEYS.contains(&k.as_str()))
        {
            warn!("Ignoring unknown destination option '{unknown}'");
        }

        let required = |key: &str| -> Result<String, ConfigError> {
            match options.get(key).map(|v| v.trim()) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(ConfigError::MissingOption(key.to_string())),
            }
        };
        let optional = |key: &str| options.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let delete_old_key = match optional(DELETE_OLD_KEY) {
            Some(v) => parse_value::<bool>(DELETE_OLD_KEY, v)?,
            None => false,
        };
        let write_failure_policy = match optional(WRITE_FAILURE_POLICY) {
            Some(v) => v.parse()?,
            None => WriteFailurePolicy::default(),
        };
        let connect_retries = match optional(CONNECT_RETRIES) {
            Some(v) => parse_value::<u32>(CONNECT_RETRIES, v)?,
            None => DEFAULT_RETRY_ATTEMPTS,
        };
        let connect_retry_delay_secs = match optional(CONNECT_RETRY_DELAY_SECS) {
            Some(v) => parse_value::<u64>(CONNECT_RETRY_DELAY_SECS, v)?,
            None => DEFAULT_RETRY_DELAY_SECS,
        };

        Ok(Self {
            url: required(URL)?,
            username: required(USERNAME)?,
            password: required(PASSWORD)?,
            namespace: required(NAMESPACE)?,
            database: required(DATABASE)?,
            scope: required(SCOPE)?,
            delete_old_key,
            relations_schema: optional(RELATIONS_SCHEMA)
                .unwrap_or(DEFAULT_RELATIONS_SCHEMA)
                .into(),
            write_failure_policy,
            connect_retries,
            connect_retry_delay_secs,
        })
    }

    /// Connection options for the SurrealDB sink.
    pub fn surreal_opts(&self) -> SurrealOpts {
        SurrealOpts {
            surreal_endpoint: self.url.clone(),
            surreal_username: self.username.clone(),
            surreal_password: self.password.clone(),
            namespace: self.namespace.clone(),
            database: self.database.clone(),
            max_retries: self.connect_retries,
            retry_delay_secs: self.connect_retry_delay_secs,
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
