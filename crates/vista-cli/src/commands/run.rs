//! `vista run` command implementation.
//!
//! Introspects the schema allow-list, guards the statement and runs it in a
//! read-only transaction. Rows are printed as JSON on stdout.

use anyhow::{Context, Result};
use vista_adapter_pg::{ExecutionError, GuardedExecutor, PgSchemaSource, QueryOutput};
use vista_core::VistaConfig;
use vista_guard::SqlGuard;
use vista_schema::{CachedSchemaSource, SchemaSource};

use super::GuardArgs;

/// Returns false when the guard rejected the statement.
pub async fn run(
    config: &VistaConfig,
    args: &GuardArgs,
    schema: &str,
    sql: &str,
) -> Result<bool> {
    let guard = SqlGuard::new(args.apply(config.guard.clone()))?;

    let pool = vista_adapter_pg::connect(&config.upstream, &config.execution)
        .await
        .context("Failed to connect to upstream database")?;

    let source =
        CachedSchemaSource::from_config(PgSchemaSource::new(pool.clone()), &config.schema_cache);
    let tables = source
        .allowed_tables(schema)
        .await
        .with_context(|| format!("Failed to load allowed tables for schema '{}'", schema))?;

    let executor = GuardedExecutor::new(pool.clone(), guard, config.execution.clone());
    let result = executor.execute(sql, &tables, Some(schema)).await;
    pool.close().await;

    match result {
        Ok(output) => {
            println!("{}", render(&output)?);
            Ok(true)
        }
        Err(ExecutionError::Rejected(rejection)) => {
            eprintln!("REJECTED {}", rejection);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

pub fn render(output: &QueryOutput) -> Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_output() {
        let output = QueryOutput {
            statement: "select id from orders LIMIT 2".to_string(),
            columns: vec!["id".to_string()],
            rows: vec![json!({"id": 1}), json!({"id": 2})],
            truncated: true,
        };
        let value: serde_json::Value = serde_json::from_str(&render(&output).unwrap()).unwrap();
        assert_eq!(value["rows"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["truncated"], true);
    }
}
