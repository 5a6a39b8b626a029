use std::time::Duration;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;

/// Default number of connection retry attempts
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
/// Default delay between retry attempts in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// SurrealDB connection options
#[derive(Clone, Debug)]
pub struct SurrealOpts {
    pub surreal_endpoint: String,
    pub surreal_username: String,
    pub surreal_password: String,
    pub namespace: String,
    pub database: String,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl SurrealOpts {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        namespace: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            surreal_endpoint: endpoint.into(),
            surreal_username: username.into(),
            surreal_password: password.into(),
            namespace: namespace.into(),
            database: database.into(),
            max_retries: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

/// Convert http(s) endpoints to their WebSocket equivalents.
pub fn websocket_endpoint(endpoint: &str) -> String {
    endpoint
        .replace("http://", "ws://")
        .replace("https://", "wss://")
}

/// Connect to SurrealDB with retries.
///
/// Connection failures are retried up to `opts.max_retries` times, waiting
/// `opts.retry_delay_secs` seconds between attempts. This handles transient
/// connection issues when the server is still starting up.
pub async fn surreal_connect(opts: &SurrealOpts) -> anyhow::Result<Surreal<Any>> {
    let endpoint = websocket_endpoint(&opts.surreal_endpoint);
    let attempts = opts.max_retries.max(1);

    tracing::debug!(
        "Connecting to SurrealDB at {} (namespace: {}, database: {})",
        endpoint,
        opts.namespace,
        opts.database
    );

    let mut last_error = None;

    for attempt in 1..=attempts {
        match try_connect(&endpoint, opts).await {
            Ok(surreal) => {
                if attempt > 1 {
                    tracing::info!(
                        "Successfully connected to SurrealDB after {} attempts",
                        attempt
                    );
                }
                return Ok(surreal);
            }
            Err(e) => {
                if attempt < attempts {
                    tracing::warn!(
                        "Failed to connect to SurrealDB at '{}' (attempt {}/{}): {}. Retrying in {}s...",
                        endpoint,
                        attempt,
                        attempts,
                        e,
                        opts.retry_delay_secs
                    );
                    tokio::time::sleep(Duration::from_secs(opts.retry_delay_secs)).await;
                }
                last_error = Some(e);
            }
        }
    }

    let last_error = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt made".to_string());
    Err(anyhow::anyhow!(
        "Failed to connect to SurrealDB at '{endpoint}' after {attempts} attempts. Last error: {last_error}"
    ))
}

/// Attempt a single connection: connect, select namespace/database, sign in.
async fn try_connect(endpoint: &str, opts: &SurrealOpts) -> anyhow::Result<Surreal<Any>> {
    let surreal = surrealdb::engine::any::connect(endpoint)
        .await
        .map_err(|e| anyhow::anyhow!("SurrealDB connection to '{endpoint}' failed: {e}"))?;

    let ns = &opts.namespace;
    let db = &opts.database;
    surreal.use_ns(ns).use_db(db).await.map_err(|e| {
        anyhow::anyhow!("SurrealDB failed to select namespace '{ns}' / database '{db}': {e}")
    })?;

    let username = &opts.surreal_username;
    surreal
        .signin(surrealdb::opt::auth::Root {
            username,
            password: &opts.surreal_password,
        })
        .await
        .map_err(|e| {
            anyhow::anyhow!("SurrealDB authentication failed (user: '{username}'): {e}")
        })?;

    Ok(surreal)
}
