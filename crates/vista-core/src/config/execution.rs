//! Query execution and allow-list caching configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;

/// Limits applied by the database execution path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Server-side statement timeout in milliseconds.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Run every guarded query inside a read-only transaction.
    #[serde(default = "default_true")]
    pub read_only: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: default_statement_timeout_ms(),
            max_connections: default_max_connections(),
            read_only: true,
        }
    }
}

impl ExecutionConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.statement_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution.statement_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "execution.max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expiry settings for cached table allow-lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCacheConfig {
    /// Seconds before a cached allow-list is refreshed.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl SchemaCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_statement_timeout_ms() -> u64 {
    10_000
}

fn default_max_connections() -> u32 {
    5
}

fn default_ttl_seconds() -> u64 {
    300
}
