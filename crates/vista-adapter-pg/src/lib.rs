//! Postgres collaborators for the SQL guard: allow-list introspection and
//! read-only execution of guarded statements.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use vista_core::{ExecutionConfig, UpstreamConfig};

pub mod executor;
pub mod introspect;

pub use executor::{ExecutionError, GuardedExecutor, QueryOutput};
pub use introspect::{PgSchemaSource, list_tables};

/// Open a connection pool sized by the execution limits.
pub async fn connect(
    upstream: &UpstreamConfig,
    execution: &ExecutionConfig,
) -> Result<PgPool, sqlx::Error> {
    tracing::debug!(
        host = %upstream.host,
        port = upstream.port,
        database = %upstream.database,
        max_connections = execution.max_connections,
        "Connecting to upstream Postgres"
    );
    PgPoolOptions::new()
        .max_connections(execution.max_connections)
        .connect(&upstream.connection_string())
        .await
}
