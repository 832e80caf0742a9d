//! Read-only execution of guarded statements.

use std::time::Duration;

use futures::TryStreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row};
use vista_core::ExecutionConfig;
use vista_guard::{AllowedTableSet, Rejection, SqlGuard};

/// Extra client-side wait beyond the server statement timeout.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("statement rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query did not finish within {0:?}")]
    Timeout(Duration),
}

impl ExecutionError {
    /// Message safe to show to the author of the statement.
    pub fn public_message(&self) -> &'static str {
        match self {
            ExecutionError::Rejected(rejection) => rejection.public_message(),
            ExecutionError::Database(_) => "query failed",
            ExecutionError::Timeout(_) => "query timed out",
        }
    }
}

/// Rows returned by a guarded statement.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    /// The statement as sent to the database, row cap included.
    pub statement: String,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    /// More rows were available than the cap allows.
    pub truncated: bool,
}

impl QueryOutput {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Runs statements only after the guard accepts them, each in its own
/// read-only transaction that is always rolled back. Never retries.
#[derive(Debug, Clone)]
pub struct GuardedExecutor {
    pool: PgPool,
    guard: SqlGuard,
    execution: ExecutionConfig,
}

impl GuardedExecutor {
    pub fn new(pool: PgPool, guard: SqlGuard, execution: ExecutionConfig) -> Self {
        Self {
            pool,
            guard,
            execution,
        }
    }

    pub fn guard(&self) -> &SqlGuard {
        &self.guard
    }

    /// Guard, then run `sql` with `search_schema` as the search path.
    pub async fn execute(
        &self,
        sql: &str,
        tables: &AllowedTableSet,
        search_schema: Option<&str>,
    ) -> Result<QueryOutput, ExecutionError> {
        let statement = self.guard.prepare(sql, tables).into_result()?;
        let max_rows = self.guard.config().effective_max_rows();
        let deadline = self.execution.statement_timeout() + CLIENT_TIMEOUT_GRACE;

        match tokio::time::timeout(deadline, self.run(statement, search_schema, max_rows)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = deadline.as_millis() as u64,
                    "Guarded query abandoned after client timeout"
                );
                Err(ExecutionError::Timeout(deadline))
            }
        }
    }

    async fn run(
        &self,
        statement: String,
        search_schema: Option<&str>,
        max_rows: u64,
    ) -> Result<QueryOutput, ExecutionError> {
        let mut tx = self.pool.begin().await?;

        if self.execution.read_only {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(format!("{}ms", self.execution.statement_timeout_ms))
            .execute(&mut *tx)
            .await?;

        if let Some(schema) = search_schema {
            sqlx::query("SELECT set_config('search_path', quote_ident($1), true)")
                .bind(schema)
                .execute(&mut *tx)
                .await?;
        }

        let mut columns = Vec::new();
        let mut rows = Vec::new();
        let mut truncated = false;
        {
            let mut stream = sqlx::query(&statement).fetch(&mut *tx);
            while let Some(row) = stream.try_next().await? {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                if rows.len() as u64 >= max_rows {
                    truncated = true;
                    break;
                }
                rows.push(row_to_json(&row));
            }
        }

        tx.rollback().await?;

        tracing::debug!(
            rows = rows.len(),
            truncated,
            search_schema = search_schema.unwrap_or_default(),
            "Guarded query finished"
        );

        Ok(QueryOutput {
            statement,
            columns,
            rows,
            truncated,
        })
    }
}

/// Decode the first Rust type the column accepts. NULLs of a known type
/// become JSON null.
macro_rules! decode_as {
    ($row:expr, $idx:expr, $($ty:ty),+ $(,)?) => {
        $(
            if let Ok(value) = $row.try_get::<Option<$ty>, _>($idx) {
                return value.map_or(Value::Null, |v| json!(v));
            }
        )+
    };
}

fn column_value(row: &PgRow, idx: usize) -> Value {
    decode_as!(
        row,
        idx,
        i64,
        i32,
        i16,
        f64,
        f32,
        bool,
        String,
        uuid::Uuid,
        chrono::DateTime<chrono::Utc>,
        chrono::NaiveDateTime,
        chrono::NaiveDate,
        chrono::NaiveTime,
        Vec<String>,
        Vec<i64>,
        Vec<i32>,
    );

    if let Ok(Some(value)) = row.try_get::<Option<Value>, _>(idx) {
        return value;
    }

    // numeric, bytea and friends
    Value::Null
}

fn row_to_json(row: &PgRow) -> Value {
    let mut obj = serde_json::Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        obj.insert(column.name().to_string(), column_value(row, idx));
    }
    Value::Object(obj)
}
