//! Tests against a live Postgres.
//!
//! Skipped unless VISTA_TEST_DATABASE_URL is set.
//!
//! Run with: VISTA_TEST_DATABASE_URL=postgresql://... cargo test --package vista-adapter-pg --test postgres

use sqlx::PgPool;
use vista_adapter_pg::{ExecutionError, GuardedExecutor, list_tables};
use vista_core::{ExecutionConfig, GuardConfig, LimitPolicy};
use vista_guard::{AllowedTableSet, SqlGuard};

async fn pool() -> Option<PgPool> {
    let url = std::env::var("VISTA_TEST_DATABASE_URL").ok()?;
    Some(PgPool::connect(&url).await.expect("connect to test database"))
}

fn executor(pool: PgPool, max_rows: u64, policy: LimitPolicy) -> GuardedExecutor {
    let guard = SqlGuard::new(
        GuardConfig::default()
            .with_max_rows(max_rows)
            .with_limit_policy(policy),
    )
    .expect("valid guard config");
    GuardedExecutor::new(pool, guard, ExecutionConfig::default())
}

fn series() -> AllowedTableSet {
    ["generate_series"].into_iter().collect()
}

#[tokio::test]
async fn test_row_cap_is_appended() {
    let Some(pool) = pool().await else { return };
    let executor = executor(pool, 5, LimitPolicy::Preserve);

    let output = executor
        .execute("select n from generate_series(1, 50) as g(n)", &series(), None)
        .await
        .unwrap();

    assert_eq!(output.row_count(), 5);
    assert!(!output.truncated);
    assert_eq!(output.columns, vec!["n".to_string()]);
    assert_eq!(output.rows[0]["n"], 1);
    assert!(output.statement.ends_with("LIMIT 5"));
}

#[tokio::test]
async fn test_preserved_limit_is_truncated_client_side() {
    let Some(pool) = pool().await else { return };
    let executor = executor(pool, 10, LimitPolicy::Preserve);

    let output = executor
        .execute(
            "select n from generate_series(1, 50) as g(n) limit 40",
            &series(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(output.row_count(), 10);
    assert!(output.truncated);
}

#[tokio::test]
async fn test_transaction_is_read_only() {
    let Some(pool) = pool().await else { return };
    let executor = executor(pool, 1, LimitPolicy::Preserve);
    let tables: AllowedTableSet = ["pg_settings"].into_iter().collect();

    let output = executor
        .execute(
            "select setting from pg_settings where name = 'transaction_read_only'",
            &tables,
            None,
        )
        .await
        .unwrap();

    assert_eq!(output.rows[0]["setting"], "on");
}

#[tokio::test]
async fn test_rejection_is_reported() {
    let Some(pool) = pool().await else { return };
    let executor = executor(pool, 10, LimitPolicy::Preserve);

    let err = executor
        .execute("select pg_sleep(60)", &series(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Rejected(_)));
}

#[tokio::test]
async fn test_list_tables_of_missing_schema_is_empty() {
    let Some(pool) = pool().await else { return };
    let tables = list_tables(&pool, "vista_schema_that_does_not_exist").await.unwrap();
    assert!(tables.is_empty());
}
