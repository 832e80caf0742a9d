//! `vista tables` command implementation.

use anyhow::{Context, Result};
use vista_core::VistaConfig;

pub async fn run(config: &VistaConfig, schema: &str) -> Result<()> {
    let pool = vista_adapter_pg::connect(&config.upstream, &config.execution)
        .await
        .context("Failed to connect to upstream database")?;

    let tables = vista_adapter_pg::list_tables(&pool, schema)
        .await
        .with_context(|| format!("Failed to list tables in schema '{}'", schema))?;

    if tables.is_empty() {
        println!("No tables in schema '{}'", schema);
    }
    for table in &tables {
        println!("{}.{}", schema, table);
    }

    pool.close().await;
    Ok(())
}
