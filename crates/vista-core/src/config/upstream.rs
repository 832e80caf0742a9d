//! Upstream database connection configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the upstream Postgres connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Hostname of the upstream Postgres server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the upstream Postgres server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name to connect to.
    #[serde(default = "default_database")]
    pub database: String,

    /// Username for upstream connection.
    #[serde(default = "default_username")]
    pub username: String,

    /// Password for upstream connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable containing the full DATABASE_URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_env: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            username: default_username(),
            password: None,
            credentials_env: None,
        }
    }
}

impl UpstreamConfig {
    /// Build a PostgreSQL connection string from this configuration.
    ///
    /// The variable named by `credentials_env` wins when it is set.
    pub fn connection_string(&self) -> String {
        if let Some(env_var) = &self.credentials_env {
            if let Ok(url) = std::env::var(env_var) {
                return url;
            }
        }

        match &self.password {
            Some(password) => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.username, password, self.host, self.port, self.database
            ),
            None => format!(
                "postgresql://{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_username() -> String {
    "postgres".to_string()
}
