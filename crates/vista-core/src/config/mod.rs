//! Configuration types for Data Vista.
//!
//! A single `vista.yaml` file configures the SQL guard, the upstream database
//! connection, allow-list caching and query execution limits. Every section is
//! optional; an empty document yields a strict, Postgres-flavoured default.
//!
//! ```yaml
//! guard:
//!   dialect: postgresql
//!   max_rows: 500
//!   limit_policy: clamp
//! upstream:
//!   credentials_env: DATABASE_URL
//! execution:
//!   statement_timeout_ms: 10000
//! ```

pub mod execution;
pub mod guard;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use execution::{ExecutionConfig, SchemaCacheConfig};
pub use guard::{GuardConfig, LimitPolicy, SqlDialect};
pub use upstream::UpstreamConfig;

/// Complete Data Vista configuration loaded from a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VistaConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// SQL guard policy.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Upstream database connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Allow-list cache settings.
    #[serde(default)]
    pub schema_cache: SchemaCacheConfig,

    /// Query execution limits.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown SQL dialect '{0}' (expected postgresql, mysql or sqlite)")]
    UnknownDialect(String),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl VistaConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content and validate it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml maps an empty document to unit, not to an empty mapping
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.guard.validate()?;
        self.execution.validate()
    }
}
