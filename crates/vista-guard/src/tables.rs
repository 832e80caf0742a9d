//! Table allow-lists and relation extraction.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

use sqlparser::ast::{ObjectName, ObjectNamePart, Query, Statement, Visit, Visitor};
use sqlparser::parser::Parser;
use vista_core::SqlDialect;

use crate::error::GuardError;
use crate::lexer;

/// A lowercased, possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    parts: Vec<String>,
}

impl TableName {
    /// Parse `table`, `schema.table` or `"Schema"."Table"` text.
    pub fn parse(name: &str) -> Self {
        Self {
            parts: name
                .split('.')
                .map(|part| unquote(part.trim()).to_lowercase())
                .filter(|part| !part.is_empty())
                .collect(),
        }
    }

    /// Build a name from already-split parts, such as catalog columns.
    /// A `.` inside a part stays part of the identifier.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            parts: parts
                .into_iter()
                .map(|part| part.as_ref().to_lowercase())
                .filter(|part| !part.is_empty())
                .collect(),
        }
    }

    pub(crate) fn from_object_name(name: &ObjectName) -> Self {
        Self {
            parts: name
                .0
                .iter()
                .map(|part| match part {
                    ObjectNamePart::Identifier(ident) => ident.value.to_lowercase(),
                    #[allow(unreachable_patterns)]
                    other => other.to_string().to_lowercase(),
                })
                .collect(),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// The unqualified table part.
    pub fn table(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Qualify an unqualified name with `schema`.
    pub fn qualified_with(&self, schema: Option<&str>) -> Self {
        match schema {
            Some(schema) if !self.is_qualified() => Self {
                parts: vec![unquote(schema.trim()).to_lowercase(), self.table().to_string()],
            },
            _ => self.clone(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

fn unquote(part: &str) -> &str {
    for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
        if part.len() >= 2 && part.starts_with(open) && part.ends_with(close) {
            return &part[1..part.len() - 1];
        }
    }
    part
}

/// Ordered set of tables a tenant's queries may reference.
///
/// An empty set allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedTableSet {
    entries: Vec<TableName>,
    default_schema: Option<String>,
}

impl AllowedTableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema used to qualify unqualified names on both sides of a lookup.
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    /// Add a table, keeping insertion order. Returns false for duplicates.
    pub fn insert(&mut self, table: &str) -> bool {
        self.insert_name(TableName::parse(table))
    }

    /// Like [`insert`](Self::insert), for a name that is already split.
    pub fn insert_name(&mut self, name: TableName) -> bool {
        if self.entries.contains(&name) {
            return false;
        }
        self.entries.push(name);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableName> {
        self.entries.iter()
    }

    /// Whether a table name, as written in SQL, resolves to an entry.
    pub fn contains(&self, table: &str) -> bool {
        self.resolves(&TableName::parse(table), None)
    }

    /// Resolve a reference, qualifying unqualified names with the set's own
    /// default schema or, failing that, `fallback_schema`.
    pub fn resolves(&self, reference: &TableName, fallback_schema: Option<&str>) -> bool {
        let schema = self.default_schema.as_deref().or(fallback_schema);
        let wanted = reference.qualified_with(schema);
        self.entries
            .iter()
            .any(|entry| entry.qualified_with(schema) == wanted)
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowedTableSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for table in iter {
            set.insert(table.as_ref());
        }
        set
    }
}

/// Collects every relation a statement reads, leaving out references to
/// common table expressions that are in scope at the point of use.
#[derive(Debug, Default)]
pub(crate) struct RelationCollector {
    depth: usize,
    scopes: Vec<CteScope>,
    relations: Vec<TableName>,
}

#[derive(Debug)]
struct CteScope {
    /// Query depth of the WITH clause owner.
    depth: usize,
    names: Vec<String>,
    recursive: bool,
    /// Number of CTE bodies visited so far.
    defined: usize,
}

impl RelationCollector {
    pub(crate) fn collect(statement: &Statement) -> Vec<TableName> {
        let mut collector = Self::default();
        let _ = statement.visit(&mut collector);

        let mut seen = HashSet::new();
        collector
            .relations
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    fn is_cte_in_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| {
            let inside_definitions = self.depth > scope.depth && scope.defined < scope.names.len();
            // a non-recursive CTE sees only the ones defined before it
            let visible = if inside_definitions {
                scope.defined + usize::from(scope.recursive)
            } else {
                scope.names.len()
            };
            scope.names.iter().take(visible).any(|n| n == name)
        })
    }
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.depth += 1;
        if let Some(with) = &query.with {
            self.scopes.push(CteScope {
                depth: self.depth,
                names: with
                    .cte_tables
                    .iter()
                    .map(|cte| cte.alias.name.value.to_lowercase())
                    .collect(),
                recursive: with.recursive,
                defined: 0,
            });
        }
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        if self
            .scopes
            .last()
            .is_some_and(|scope| scope.depth == self.depth)
        {
            self.scopes.pop();
        }
        self.depth = self.depth.saturating_sub(1);

        let depth = self.depth;
        if let Some(owner) = self.scopes.last_mut() {
            if owner.depth == depth && owner.defined < owner.names.len() {
                owner.defined += 1;
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let name = TableName::from_object_name(relation);
        if name.is_qualified() || !self.is_cte_in_scope(name.table()) {
            self.relations.push(name);
        }
        ControlFlow::Continue(())
    }
}

/// List the real tables a single statement reads, in order of appearance.
pub fn referenced_tables(dialect: SqlDialect, sql: &str) -> Result<Vec<TableName>, GuardError> {
    let parser_dialect = lexer::parser_dialect(dialect);
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| GuardError::Parse(e.to_string()))?;

    Ok(statements.iter().flat_map(RelationCollector::collect).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tables(sql: &str) -> Vec<String> {
        referenced_tables(SqlDialect::Postgresql, sql)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_table_name_parse() {
        assert_eq!(TableName::parse("Public.Orders").to_string(), "public.orders");
        assert_eq!(TableName::parse(r#""Sales"."Q1""#).to_string(), "sales.q1");
        assert_eq!(TableName::parse("`orders`").to_string(), "orders");
        assert!(TableName::parse("a.b").is_qualified());
        assert_eq!(TableName::parse("a.b").table(), "b");
    }

    #[test]
    fn test_allowed_set_keeps_order_and_dedupes() {
        let mut set: AllowedTableSet = ["orders", "customers"].into_iter().collect();
        assert!(!set.insert("ORDERS"));
        assert!(set.insert("products"));
        let names: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["orders", "customers", "products"]);
    }

    #[test]
    fn test_resolution_is_case_insensitive() {
        let set: AllowedTableSet = ["Orders"].into_iter().collect();
        assert!(set.contains("orders"));
        assert!(set.contains("ORDERS"));
        assert!(set.contains(r#""orders""#));
        assert!(!set.contains("public.orders"));
    }

    #[test]
    fn test_resolution_with_default_schema() {
        let set: AllowedTableSet = ["tenant_a.orders", "customers"].into_iter().collect();
        let set = set.with_default_schema("tenant_a");
        assert!(set.contains("orders"));
        assert!(set.contains("tenant_a.orders"));
        assert!(set.contains("tenant_a.customers"));
        assert!(!set.contains("tenant_b.orders"));
    }

    #[test]
    fn test_fallback_schema_only_when_set_has_none() {
        let set: AllowedTableSet = ["analytics.events"].into_iter().collect();
        let reference = TableName::parse("events");
        assert!(set.resolves(&reference, Some("analytics")));
        assert!(!set.resolves(&reference, None));
    }

    #[test]
    fn test_extracts_from_and_join() {
        assert_eq!(
            tables("SELECT * FROM orders o JOIN users u ON o.user_id = u.id, regions r"),
            vec!["orders", "users", "regions"]
        );
    }

    #[test]
    fn test_extracts_nested_relations() {
        assert_eq!(
            tables(
                "SELECT * FROM (SELECT id FROM orders) sub \
                 WHERE id IN (SELECT order_id FROM refunds) \
                 UNION SELECT id FROM archive.orders"
            ),
            vec!["orders", "refunds", "archive.orders"]
        );
    }

    #[test]
    fn test_cte_names_are_exempt() {
        assert_eq!(
            tables("WITH recent AS (SELECT * FROM orders) SELECT * FROM recent JOIN users ON true"),
            vec!["orders", "users"]
        );
    }

    #[test]
    fn test_later_ctes_see_earlier_ones() {
        assert_eq!(
            tables(
                "WITH a AS (SELECT * FROM orders), b AS (SELECT * FROM a) \
                 SELECT * FROM b"
            ),
            vec!["orders"]
        );
    }

    #[test]
    fn test_non_recursive_cte_cannot_shadow_itself() {
        // the inner `secrets` is the real table
        assert_eq!(
            tables("WITH secrets AS (SELECT * FROM secrets) SELECT * FROM secrets"),
            vec!["secrets"]
        );
    }

    #[test]
    fn test_recursive_cte_sees_itself() {
        assert_eq!(
            tables(
                "WITH RECURSIVE tree AS (SELECT id FROM nodes UNION ALL \
                 SELECT n.id FROM nodes n JOIN tree t ON n.parent = t.id) SELECT * FROM tree"
            ),
            vec!["nodes"]
        );
    }

    #[test]
    fn test_cte_scope_ends_with_its_query() {
        assert_eq!(
            tables(
                "SELECT * FROM (WITH x AS (SELECT 1 AS v) SELECT * FROM x) s \
                 JOIN x ON true"
            ),
            vec!["x"]
        );
    }

    #[test]
    fn test_qualified_names_are_never_ctes() {
        assert_eq!(
            tables("WITH orders AS (SELECT 1) SELECT * FROM public.orders"),
            vec!["public.orders"]
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            referenced_tables(SqlDialect::Postgresql, "SELECT * FROM ("),
            Err(GuardError::Parse(_))
        ));
    }
}
