use async_trait::async_trait;
use sqlx::{PgPool, Row};
use vista_guard::{AllowedTableSet, TableName};
use vista_schema::SchemaSource;

/// Base tables and views visible in `schema`, ordered by name.
pub async fn list_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        select table_name
        from information_schema.tables
        where table_schema = $1
          and table_type in ('BASE TABLE', 'VIEW')
        order by table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| row.get::<String, _>("table_name"))
        .collect())
}

/// Build the allow-list for one schema from introspected table names.
pub(crate) fn allow_list(schema: &str, tables: &[String]) -> AllowedTableSet {
    let mut set = AllowedTableSet::new().with_default_schema(schema);
    for table in tables {
        set.insert_name(TableName::from_parts([schema, table.as_str()]));
    }
    set
}

/// Allow-lists read from the live catalog, one schema per data source.
///
/// Pair it with `CachedSchemaSource` so the catalog is not queried per statement.
#[derive(Debug, Clone)]
pub struct PgSchemaSource {
    pool: PgPool,
}

impl PgSchemaSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaSource for PgSchemaSource {
    async fn allowed_tables(&self, data_source: &str) -> anyhow::Result<AllowedTableSet> {
        let tables = list_tables(&self.pool, data_source).await?;
        if tables.is_empty() {
            tracing::warn!(schema = data_source, "Schema has no visible tables");
        }
        Ok(allow_list(data_source, &tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::SqlDialect;
    use vista_guard::referenced_tables;

    #[test]
    fn test_allow_list_is_schema_qualified() {
        let set = allow_list("sales", &["orders".to_string(), "Customers".to_string()]);

        assert_eq!(set.default_schema(), Some("sales"));
        assert_eq!(set.len(), 2);
        assert!(set.contains("orders"));
        assert!(set.contains("sales.customers"));
        assert!(!set.contains("public.orders"));
        assert!(set.resolves(&TableName::parse("SALES.ORDERS"), None));
    }

    #[test]
    fn test_catalog_names_are_not_split_on_dots() {
        let set = allow_list("sales", &["odd.name".to_string()]);

        assert_eq!(
            set.iter().next(),
            Some(&TableName::from_parts(["sales", "odd.name"]))
        );
        let quoted = referenced_tables(SqlDialect::Postgresql, r#"select * from "odd.name""#)
            .expect("parses");
        assert!(set.resolves(&quoted[0], None));
        // schema `odd`, table `name`
        assert!(!set.contains("odd.name"));
        assert!(!set.contains("sales.odd"));
    }

    #[test]
    fn test_empty_schema_allows_nothing() {
        assert!(allow_list("empty", &[]).is_empty());
    }
}
