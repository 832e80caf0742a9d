//! CLI command implementations for Data Vista.

pub mod check;
pub mod limit;
pub mod run;
pub mod tables;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use vista_core::{GuardConfig, SqlDialect, VistaConfig};

/// Config file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "vista.yaml";

/// Guard settings that override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GuardArgs {
    /// Target SQL dialect (postgresql, mysql, sqlite)
    #[arg(long)]
    pub dialect: Option<SqlDialect>,

    /// Row cap applied to accepted statements
    #[arg(long)]
    pub max_rows: Option<u64>,

    /// Schema used for unqualified table names
    #[arg(long)]
    pub default_schema: Option<String>,

    /// Accept a single trailing semicolon
    #[arg(long, default_value_t = false)]
    pub allow_trailing_semicolon: bool,
}

impl GuardArgs {
    pub fn apply(&self, mut config: GuardConfig) -> GuardConfig {
        if let Some(dialect) = self.dialect {
            config.dialect = dialect;
        }
        if let Some(max_rows) = self.max_rows {
            config.max_rows = max_rows;
        }
        if let Some(schema) = &self.default_schema {
            config.default_schema = Some(schema.clone());
        }
        if self.allow_trailing_semicolon {
            config.allow_trailing_semicolon = true;
        }
        config
    }
}

/// The statement to work on, inline or from a file.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SqlInput {
    /// SQL text
    #[arg(long)]
    pub sql: Option<String>,

    /// File containing the SQL text
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl SqlInput {
    pub fn read(&self) -> Result<String> {
        match (&self.sql, &self.file) {
            (Some(sql), _) => Ok(sql.clone()),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read SQL from {:?}", path)),
            (None, None) => anyhow::bail!("Either --sql or --file is required"),
        }
    }
}

/// Load `path`, else `./vista.yaml` when it exists, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<VistaConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::debug!("No vista.yaml found, using defaults");
                return Ok(VistaConfig::default());
            }
            fallback
        }
    };

    VistaConfig::from_file(&path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}
