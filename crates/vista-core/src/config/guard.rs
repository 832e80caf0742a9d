//! SQL guard configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// Target SQL engine for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    #[serde(alias = "postgres", alias = "pg")]
    Postgresql,
    Mysql,
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl SqlDialect {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Postgresql => "postgresql",
            SqlDialect::Mysql => "mysql",
            SqlDialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::Postgresql),
            "mysql" => Ok(SqlDialect::Mysql),
            "sqlite" | "sqlite3" => Ok(SqlDialect::Sqlite),
            other => Err(ConfigError::UnknownDialect(other.to_string())),
        }
    }
}

/// What to do with a statement that already carries an explicit row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    /// Keep any explicit limit, even one above the configured maximum.
    #[default]
    Preserve,
    /// Lower an explicit limit that exceeds the maximum.
    Clamp,
    /// Reject statements whose explicit limit exceeds the maximum.
    Reject,
}

/// Guard policy for one data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Target SQL dialect.
    #[serde(default)]
    pub dialect: SqlDialect,

    /// Maximum rows an accepted query may return.
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    /// Treatment of explicit limits above `max_rows`.
    #[serde(default)]
    pub limit_policy: LimitPolicy,

    /// Strip trailing semicolons before the multi-statement check.
    /// Default: false (any `;` rejects)
    #[serde(default)]
    pub allow_trailing_semicolon: bool,

    /// Additional verbs to block on top of the dialect vocabulary.
    #[serde(default)]
    pub extra_forbidden_keywords: Vec<String>,

    /// Schema used to qualify unqualified table names during allow-list checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            max_rows: default_max_rows(),
            limit_policy: LimitPolicy::default(),
            allow_trailing_semicolon: false,
            extra_forbidden_keywords: Vec::new(),
            default_schema: None,
        }
    }
}

impl GuardConfig {
    /// Create a configuration for the given dialect with default limits.
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Set the row cap.
    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Set the explicit-limit policy.
    pub fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    /// Set the schema used for unqualified names.
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Row cap with the lower bound of one row applied.
    pub fn effective_max_rows(&self) -> u64 {
        self.max_rows.max(1)
    }

    /// Reject settings that can only come from a programmer error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for keyword in &self.extra_forbidden_keywords {
            let is_word = !keyword.is_empty()
                && keyword
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !is_word {
                return Err(ConfigError::Invalid(format!(
                    "extra_forbidden_keywords entry '{}' is not a single SQL word",
                    keyword
                )));
            }
        }

        if let Some(schema) = &self.default_schema {
            if schema.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "default_schema must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn default_max_rows() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgresql".parse::<SqlDialect>().unwrap(), SqlDialect::Postgresql);
        assert_eq!("Postgres".parse::<SqlDialect>().unwrap(), SqlDialect::Postgresql);
        assert_eq!("MYSQL".parse::<SqlDialect>().unwrap(), SqlDialect::Mysql);
        assert_eq!("sqlite3".parse::<SqlDialect>().unwrap(), SqlDialect::Sqlite);
        assert!(matches!(
            "oracle".parse::<SqlDialect>(),
            Err(ConfigError::UnknownDialect(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_dialect_serde_aliases() {
        let dialect: SqlDialect = serde_yaml::from_str("pg").unwrap();
        assert_eq!(dialect, SqlDialect::Postgresql);
        assert_eq!(serde_yaml::to_string(&SqlDialect::Mysql).unwrap().trim(), "mysql");
    }

    #[test]
    fn test_effective_max_rows_is_at_least_one() {
        assert_eq!(GuardConfig::default().with_max_rows(0).effective_max_rows(), 1);
        assert_eq!(GuardConfig::default().with_max_rows(50).effective_max_rows(), 50);
    }

    #[test]
    fn test_validate_keywords() {
        let mut config = GuardConfig::default();
        config.extra_forbidden_keywords = vec!["purge".to_string(), "do_thing".to_string()];
        assert!(config.validate().is_ok());

        config.extra_forbidden_keywords.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_blank_schema() {
        let config = GuardConfig::default().with_default_schema("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
