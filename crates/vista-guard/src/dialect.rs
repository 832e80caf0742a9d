//! Per-dialect guard vocabulary.

use std::collections::BTreeSet;

use vista_core::SqlDialect;

/// Verbs that mutate data, schema, permissions or session state, or that run
/// procedures and bulk I/O. Blocked as standalone words in every dialect.
const BASE_FORBIDDEN_KEYWORDS: &[&str] = &[
    // data mutation
    "insert", "update", "delete", "merge",
    // schema mutation
    "create", "alter", "drop", "truncate",
    // permissions
    "grant", "revoke",
    // session and configuration
    "set", "reset", "show", "listen", "unlisten", "notify",
    // procedural
    "call", "execute",
    // bulk I/O and maintenance
    "copy", "vacuum", "analyze", "explain",
    // SELECT INTO creates tables, INTO OUTFILE writes files
    "into",
];

const POSTGRES_FORBIDDEN_KEYWORDS: &[&str] = &[
    "refresh", "reindex", "cluster", "discard", "prepare", "deallocate", "checkpoint",
];

const MYSQL_FORBIDDEN_KEYWORDS: &[&str] =
    &["rename", "lock", "unlock", "flush", "optimize", "handler"];

const SQLITE_FORBIDDEN_KEYWORDS: &[&str] = &["attach", "detach", "pragma", "reindex"];

const POSTGRES_FORBIDDEN_FUNCTIONS: &[&str] = &[
    "set_config",
    "pg_sleep",
    "nextval",
    "setval",
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_read_file",
    "pg_read_binary_file",
    "pg_ls_dir",
    "lo_import",
    "lo_export",
    "dblink",
    "dblink_exec",
    // run SQL passed as text, past the allow-list
    "query_to_xml",
    "query_to_xmlschema",
    "query_to_xml_and_xmlschema",
    "table_to_xml",
    "table_to_xmlschema",
    "table_to_xml_and_xmlschema",
    "cursor_to_xml",
    "cursor_to_xmlschema",
    // session-level locks outlive the transaction
    "pg_advisory_lock",
    "pg_try_advisory_lock",
    "pg_advisory_lock_shared",
    "pg_try_advisory_lock_shared",

    "lo_get",
    "lo_unlink",
    "lo_create",
    "lo_creat",
    "pg_notify",
];

const MYSQL_FORBIDDEN_FUNCTIONS: &[&str] = &["sleep", "benchmark", "load_file", "get_lock"];

const SQLITE_FORBIDDEN_FUNCTIONS: &[&str] = &["load_extension"];

/// Keyword and function vocabulary for one target engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectPolicy {
    dialect: SqlDialect,
    keywords: BTreeSet<String>,
    functions: BTreeSet<String>,
}

impl DialectPolicy {
    /// Build the built-in policy for a dialect.
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        let (extra_keywords, functions) = match dialect {
            SqlDialect::Postgresql => (POSTGRES_FORBIDDEN_KEYWORDS, POSTGRES_FORBIDDEN_FUNCTIONS),
            SqlDialect::Mysql => (MYSQL_FORBIDDEN_KEYWORDS, MYSQL_FORBIDDEN_FUNCTIONS),
            SqlDialect::Sqlite => (SQLITE_FORBIDDEN_KEYWORDS, SQLITE_FORBIDDEN_FUNCTIONS),
        };

        Self {
            dialect,
            keywords: BASE_FORBIDDEN_KEYWORDS
                .iter()
                .chain(extra_keywords)
                .map(|k| k.to_string())
                .collect(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Add configured verbs on top of the built-in vocabulary.
    pub fn with_extra_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords
            .extend(keywords.into_iter().map(|k| k.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Check a lowercase word against the keyword blocklist.
    pub fn is_forbidden_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    /// Check a lowercase function name against the function blocklist.
    pub fn is_forbidden_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(String::as_str)
    }

    /// MySQL runs the body of `/*! ... */` comments as code.
    pub fn executes_bang_comments(&self) -> bool {
        matches!(self.dialect, SqlDialect::Mysql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_vocabulary_in_every_dialect() {
        for dialect in [SqlDialect::Postgresql, SqlDialect::Mysql, SqlDialect::Sqlite] {
            let policy = DialectPolicy::for_dialect(dialect);
            for keyword in BASE_FORBIDDEN_KEYWORDS {
                assert!(policy.is_forbidden_keyword(keyword), "{dialect}: {keyword}");
            }
            assert!(!policy.is_forbidden_keyword("select"));
            assert!(!policy.is_forbidden_keyword("with"));
        }
    }

    #[test]
    fn test_dialect_specific_vocabulary() {
        let sqlite = DialectPolicy::for_dialect(SqlDialect::Sqlite);
        assert!(sqlite.is_forbidden_keyword("pragma"));
        assert!(sqlite.is_forbidden_function("load_extension"));

        let postgres = DialectPolicy::for_dialect(SqlDialect::Postgresql);
        assert!(!postgres.is_forbidden_keyword("pragma"));
        assert!(postgres.is_forbidden_function("set_config"));
        assert!(!postgres.executes_bang_comments());

        let mysql = DialectPolicy::for_dialect(SqlDialect::Mysql);
        assert!(mysql.is_forbidden_function("sleep"));
        assert!(mysql.executes_bang_comments());
    }

    #[test]
    fn test_postgres_blocks_text_query_and_session_lock_functions() {
        let postgres = DialectPolicy::for_dialect(SqlDialect::Postgresql);
        for function in [
            "query_to_xml",
            "query_to_xmlschema",
            "table_to_xml",
            "cursor_to_xml",
            "pg_try_advisory_lock",
            "pg_advisory_lock_shared",
            "pg_try_advisory_lock_shared",
            "lo_get",
            "lo_unlink",
            "lo_create",
            "pg_notify",
        ] {
            assert!(postgres.is_forbidden_function(function), "{function}");
        }
    }

    #[test]
    fn test_extra_keywords_are_lowercased() {
        let policy =
            DialectPolicy::for_dialect(SqlDialect::Postgresql).with_extra_keywords(["PURGE"]);
        assert!(policy.is_forbidden_keyword("purge"));
    }
}
