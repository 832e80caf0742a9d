//! Statement shape validation.
//!
//! Rules run in order and stop at the first failure:
//!
//! 1. the trimmed statement is not empty
//! 2. its first token is `SELECT` or `WITH`
//! 3. it contains no `;`
//! 4. no forbidden verb or function appears anywhere
//! 5. every relation resolves against the allowed table set

use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

use crate::classifier::{ForbiddenToken, LexicalClassifier};
use crate::decision::Rejection;
use crate::error::GuardError;
use crate::lexer;
use crate::tables::{AllowedTableSet, RelationCollector};

/// Validates that a statement is a single read-only query over allowed tables.
#[derive(Debug, Clone)]
pub struct ShapeValidator {
    classifier: LexicalClassifier,
    allow_trailing_semicolon: bool,
    default_schema: Option<String>,
}

impl ShapeValidator {
    pub fn new(classifier: LexicalClassifier) -> Self {
        Self {
            classifier,
            allow_trailing_semicolon: false,
            default_schema: None,
        }
    }

    /// Strip trailing `;` before the separator check instead of rejecting.
    pub fn allow_trailing_semicolon(mut self, allow: bool) -> Self {
        self.allow_trailing_semicolon = allow;
        self
    }

    /// Schema for unqualified names when the allowed set has none.
    pub fn default_schema(mut self, schema: Option<String>) -> Self {
        self.default_schema = schema;
        self
    }

    pub fn classifier(&self) -> &LexicalClassifier {
        &self.classifier
    }

    /// Rules 1 to 4. Returns the normalized statement.
    pub fn check_shape(&self, sql: &str) -> Result<String, Rejection> {
        self.check_rules(sql)
    }

    /// Rules 1 to 5. Returns the normalized statement.
    pub fn validate(&self, sql: &str, tables: &AllowedTableSet) -> Result<String, Rejection> {
        let statement = self.check_rules(sql)?;

        if tables.is_empty() {
            return Err(Rejection::empty_allow_list());
        }

        let parsed = self.parse_single(&statement)?;
        let fallback_schema = self.default_schema.as_deref();
        for relation in RelationCollector::collect(&parsed) {
            if !tables.resolves(&relation, fallback_schema) {
                return Err(Rejection::table_not_allowed(&relation.to_string()));
            }
        }

        Ok(statement)
    }

    fn check_rules(&self, sql: &str) -> Result<String, Rejection> {
        // rule 1
        let mut statement = sql.trim();
        if self.allow_trailing_semicolon {
            statement = strip_trailing_semicolons(statement);
        }
        if statement.is_empty() {
            return Err(Rejection::empty());
        }

        // rule 2
        let tokens = match lexer::tokenize(self.classifier.policy().dialect(), statement) {
            Ok(tokens) => tokens,
            Err(e) => return Err(untokenizable(statement, e)),
        };
        let first = lexer::next_significant(&tokens, 0).map(|idx| &tokens[idx]);
        let starts_with_query = first
            .is_some_and(|token| lexer::is_keyword(token, "select") || lexer::is_keyword(token, "with"));
        if !starts_with_query {
            let found = first.and_then(lexer::bare_word).map(|word| word.value.as_str());
            return Err(Rejection::not_select(found));
        }

        // rule 3: raw text, so a `;` inside a literal still counts
        if statement.contains(';') {
            return Err(Rejection::multi_statement());
        }

        // rule 4
        match self.classifier.scan(&tokens).map_err(Rejection::malformed)? {
            Some(ForbiddenToken::Keyword(keyword)) => {
                return Err(Rejection::forbidden_keyword(&keyword));
            }
            Some(ForbiddenToken::Function(function)) => {
                return Err(Rejection::forbidden_function(&function));
            }
            None => {}
        }

        Ok(statement.to_string())
    }

    fn parse_single(&self, statement: &str) -> Result<Statement, Rejection> {
        let dialect = lexer::parser_dialect(self.classifier.policy().dialect());
        let mut statements =
            Parser::parse_sql(dialect.as_ref(), statement).map_err(Rejection::malformed)?;

        if statements.len() != 1 {
            return Err(Rejection::multi_statement());
        }
        let parsed = statements.remove(0);
        if !matches!(parsed, Statement::Query(_)) {
            return Err(Rejection::not_a_query());
        }
        Ok(parsed)
    }
}

/// Rules 2 and 3 on raw text, so a broken literal later in the statement
/// does not hide a non-query verb or a second statement.
fn untokenizable(statement: &str, error: GuardError) -> Rejection {
    match lexer::raw_leading_word(statement) {
        Some(word) if !word.eq_ignore_ascii_case("select") && !word.eq_ignore_ascii_case("with") => {
            Rejection::not_select(Some(word))
        }
        _ if statement.contains(';') => Rejection::multi_statement(),
        _ => Rejection::malformed(error),
    }
}

pub(crate) fn strip_trailing_semicolons(sql: &str) -> &str {
    let mut statement = sql.trim();
    while let Some(rest) = statement.strip_suffix(';') {
        statement = rest.trim_end();
    }
    statement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::RejectionReason;
    use crate::dialect::DialectPolicy;
    use vista_core::SqlDialect;

    fn validator() -> ShapeValidator {
        ShapeValidator::new(LexicalClassifier::new(DialectPolicy::for_dialect(
            SqlDialect::Postgresql,
        )))
    }

    fn reason(result: Result<String, Rejection>) -> RejectionReason {
        result.unwrap_err().reason
    }

    fn allowed() -> AllowedTableSet {
        ["orders", "customers", "public.products"].into_iter().collect()
    }

    #[test]
    fn test_empty() {
        assert_eq!(reason(validator().check_shape("")), RejectionReason::Empty);
        assert_eq!(reason(validator().check_shape("  \n\t ")), RejectionReason::Empty);
    }

    #[test]
    fn test_leading_keyword() {
        let v = validator();
        assert_eq!(reason(v.check_shape("DROP TABLE x")), RejectionReason::NotSelect);
        assert_eq!(reason(v.check_shape("(select 1)")), RejectionReason::NotSelect);
        assert_eq!(reason(v.check_shape("selection from t")), RejectionReason::NotSelect);
        assert_eq!(reason(v.check_shape("-- comment only")), RejectionReason::NotSelect);
        for sql in ["SELECT 1", "select 1", "Select 1", "  with x as (select 1) select * from x"] {
            assert!(v.check_shape(sql).is_ok(), "{sql}");
        }
        assert!(v.check_shape("/* generated */ SELECT 1").is_ok());
    }

    #[test]
    fn test_not_select_reports_leading_word() {
        let rejection = validator().check_shape("update t set a = 1").unwrap_err();
        assert_eq!(rejection.detail, "statement must start with SELECT or WITH, found UPDATE");
    }

    #[test]
    fn test_semicolons() {
        let v = validator();
        assert_eq!(
            reason(v.check_shape("select 1; delete from y")),
            RejectionReason::MultiStatement
        );
        assert_eq!(reason(v.check_shape("select 1;")), RejectionReason::MultiStatement);
        assert_eq!(
            reason(v.check_shape("select ';' from t")),
            RejectionReason::MultiStatement
        );
    }

    #[test]
    fn test_trailing_semicolon_opt_in() {
        let v = validator().allow_trailing_semicolon(true);
        assert_eq!(v.check_shape("select 1 ; ;\n").unwrap(), "select 1");
        assert_eq!(
            reason(v.check_shape("select 1; delete from y;")),
            RejectionReason::MultiStatement
        );
        assert_eq!(reason(v.check_shape(";")), RejectionReason::Empty);
    }

    #[test]
    fn test_forbidden_tokens() {
        let v = validator();
        assert_eq!(
            reason(v.check_shape("with d as (delete from t returning *) select * from d")),
            RejectionReason::ForbiddenKeyword
        );
        assert_eq!(
            reason(v.check_shape("select pg_sleep(30)")),
            RejectionReason::ForbiddenFunction
        );
        assert!(v.check_shape("select insertion_date from t").is_ok());
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            reason(validator().check_shape("select 'unterminated")),
            RejectionReason::Malformed
        );
        assert_eq!(
            reason(validator().validate("select * from (", &allowed())),
            RejectionReason::Malformed
        );
    }

    #[test]
    fn test_broken_literal_does_not_hide_earlier_rules() {
        let v = validator();
        assert_eq!(reason(v.check_shape("drop table 'x")), RejectionReason::NotSelect);
        assert_eq!(
            v.check_shape("/* c */ Truncate t 'x").unwrap_err().detail,
            "statement must start with SELECT or WITH, found TRUNCATE"
        );
        assert_eq!(
            reason(v.check_shape("select 1; select 'abc")),
            RejectionReason::MultiStatement
        );
        assert_eq!(
            reason(v.check_shape("WITH x as (select 'a")),
            RejectionReason::Malformed
        );
    }

    #[test]
    fn test_tables_allowed() {
        let v = validator();
        assert_eq!(
            v.validate("  select * from orders o join customers c on o.cid = c.id  ", &allowed())
                .unwrap(),
            "select * from orders o join customers c on o.cid = c.id"
        );
        assert!(v.validate("select * from public.products", &allowed()).is_ok());
        assert!(v.validate("select 1", &allowed()).is_ok());
    }

    #[test]
    fn test_tables_not_allowed() {
        let v = validator();
        let rejection = v
            .validate("select * from orders join secrets on true", &allowed())
            .unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::TableNotAllowed);
        assert!(rejection.detail.contains("secrets"));

        assert_eq!(
            reason(v.validate("select * from pg_catalog.pg_authid", &allowed())),
            RejectionReason::TableNotAllowed
        );
        assert_eq!(
            reason(v.validate("select * from orders where id in (select id from users)", &allowed())),
            RejectionReason::TableNotAllowed
        );
        // unqualified entry does not grant access to another schema
        assert_eq!(
            reason(v.validate("select * from other.orders", &allowed())),
            RejectionReason::TableNotAllowed
        );
    }

    #[test]
    fn test_empty_allow_list_rejects_everything() {
        let v = validator();
        assert_eq!(
            reason(v.validate("select 1", &AllowedTableSet::new())),
            RejectionReason::TableNotAllowed
        );
    }

    #[test]
    fn test_cte_alias_exempt() {
        let v = validator();
        assert!(
            v.validate(
                "with big as (select * from orders where total > 100) \
                 select b.id from big b",
                &allowed()
            )
            .is_ok()
        );
    }

    #[test]
    fn test_default_schema_fallback() {
        let v = validator().default_schema(Some("public".to_string()));
        assert!(v.validate("select * from products", &allowed()).is_ok());
        assert!(v.validate("select * from public.orders", &allowed()).is_ok());
    }
}
