//! Row-limit enforcement.
//!
//! A formatting step, not a safety boundary: input must already have passed
//! shape validation. Only a top-level `LIMIT` or `FETCH FIRST` counts as an
//! explicit cap; one inside a subquery or CTE caps that subquery only.

use sqlparser::tokenizer::Token;
use vista_core::{LimitPolicy, SqlDialect};

use crate::lexer;
use crate::shape::strip_trailing_semicolons;

/// Alias for the derived table used when a statement has to be wrapped.
const WRAP_ALIAS: &str = "guarded_result";

/// Explicit row limit found at the top level of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingLimit {
    /// No top-level `LIMIT`/`FETCH`.
    Absent,
    /// A literal row count.
    Rows(u64),
    /// `LIMIT ALL`, `LIMIT NULL`, a parameter or an expression.
    Unbounded,
}

/// Where a literal count sits in the token stream, for clamping.
#[derive(Debug, Clone, Copy)]
enum Found {
    Absent,
    Rows { count: u64, token: Option<usize> },
    Unbounded,
}

/// Rewrites validated statements so they return a bounded number of rows.
#[derive(Debug, Clone, Copy)]
pub struct LimitEnforcer {
    dialect: SqlDialect,
}

impl LimitEnforcer {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Append `LIMIT max_rows` unless an explicit limit is present.
    ///
    /// An existing limit is never lowered, even above `max_rows`.
    pub fn enforce(&self, sql: &str, max_rows: u64) -> String {
        self.enforce_with_policy(sql, max_rows, LimitPolicy::Preserve)
    }

    /// Like [`enforce`](Self::enforce), but with `Clamp` an explicit limit
    /// above `max_rows` is rewritten down to it. `Reject` formats like
    /// `Preserve`; rejecting is the facade's job.
    ///
    /// Only the count itself is replaced; every other byte of the statement
    /// is kept as written.
    pub fn enforce_with_policy(&self, sql: &str, max_rows: u64, policy: LimitPolicy) -> String {
        let max_rows = max_rows.max(1);
        let statement = strip_trailing_semicolons(sql);

        let spanned = match lexer::tokenize_spanned(self.dialect, statement) {
            Ok(spanned) => spanned,
            Err(e) => {
                tracing::warn!(error = %e, "Row-limit enforcement on untokenizable input; wrapping");
                return wrap(statement, max_rows, true);
            }
        };
        let tokens: Vec<Token> = spanned.iter().map(|t| t.token.clone()).collect();
        let trailing_comment = lexer::ends_with_line_comment(&tokens);

        match self.find(&tokens) {
            Found::Absent => {
                let separator = if trailing_comment { "\n" } else { " " };
                format!("{}{}LIMIT {}", statement, separator, max_rows)
            }
            Found::Rows {
                count,
                token: Some(idx),
            } if policy == LimitPolicy::Clamp && count > max_rows => {
                let range = lexer::byte_range(statement, spanned[idx].span)
                    .filter(|range| statement.get(range.clone()) == Some(&*tokens[idx].to_string()));
                match range {
                    Some(range) => {
                        tracing::debug!(requested = count, max_rows, "Clamping explicit row limit");
                        format!(
                            "{}{}{}",
                            &statement[..range.start],
                            max_rows,
                            &statement[range.end..]
                        )
                    }
                    None => wrap(statement, max_rows, trailing_comment),
                }
            }
            Found::Rows { .. } => statement.to_string(),
            Found::Unbounded => wrap(statement, max_rows, trailing_comment),
        }
    }

    /// Inspect the top-level limit of a statement.
    pub fn existing_limit(&self, sql: &str) -> ExistingLimit {
        let statement = strip_trailing_semicolons(sql);
        match lexer::tokenize(self.dialect, statement) {
            Ok(tokens) => match self.find(&tokens) {
                Found::Absent => ExistingLimit::Absent,
                Found::Rows { count, .. } => ExistingLimit::Rows(count),
                Found::Unbounded => ExistingLimit::Unbounded,
            },
            Err(_) => ExistingLimit::Unbounded,
        }
    }

    fn find(&self, tokens: &[Token]) -> Found {
        let mut depth = 0usize;
        for (idx, token) in tokens.iter().enumerate() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ if depth > 0 => {}
                _ if lexer::is_keyword(token, "limit") => return self.limit_operand(tokens, idx + 1),
                _ if lexer::is_keyword(token, "fetch") => return fetch_operand(tokens, idx + 1),
                _ => {}
            }
        }
        Found::Absent
    }

    /// A literal count counts only when nothing but `OFFSET` or the end of
    /// the statement follows it; anything else is an expression.
    fn limit_operand(&self, tokens: &[Token], start: usize) -> Found {
        let Some((count, idx)) = number_at(tokens, start) else {
            return Found::Unbounded;
        };

        let next = lexer::next_significant(tokens, idx + 1);
        if let Some(comma) = next.filter(|&n| tokens[n] == Token::Comma) {
            // MySQL and SQLite accept `LIMIT offset, count`
            if !matches!(self.dialect, SqlDialect::Mysql | SqlDialect::Sqlite) {
                return Found::Unbounded;
            }
            return match number_at(tokens, comma + 1) {
                Some((count, idx)) if followed_by(tokens, idx + 1, &[]) => Found::Rows {
                    count,
                    token: Some(idx),
                },
                _ => Found::Unbounded,
            };
        }

        if followed_by(tokens, idx + 1, &["offset"]) {
            Found::Rows {
                count,
                token: Some(idx),
            }
        } else {
            Found::Unbounded
        }
    }
}

/// `FETCH { FIRST | NEXT } [ count ] { ROW | ROWS } ONLY`. `WITH TIES` and
/// `PERCENT` can return more rows than the count, so they are unbounded.
fn fetch_operand(tokens: &[Token], start: usize) -> Found {
    let Some(first) = lexer::next_significant(tokens, start) else {
        return Found::Unbounded;
    };
    if !(lexer::is_keyword(&tokens[first], "first") || lexer::is_keyword(&tokens[first], "next")) {
        return Found::Unbounded;
    }

    // count omitted means one row
    let (count, token, after) = match number_at(tokens, first + 1) {
        Some((count, idx)) => (count, Some(idx), idx + 1),
        None => (1, None, first + 1),
    };

    let Some(unit) = lexer::next_significant(tokens, after) else {
        return Found::Unbounded;
    };
    if !(lexer::is_keyword(&tokens[unit], "row") || lexer::is_keyword(&tokens[unit], "rows")) {
        return Found::Unbounded;
    }

    match lexer::next_significant(tokens, unit + 1) {
        Some(only) if lexer::is_keyword(&tokens[only], "only") => Found::Rows { count, token },
        _ => Found::Unbounded,
    }
}

/// True when the next significant token is the end of input or one of `keywords`.
fn followed_by(tokens: &[Token], start: usize, keywords: &[&str]) -> bool {
    match lexer::next_significant(tokens, start) {
        None => true,
        Some(idx) => keywords.iter().any(|kw| lexer::is_keyword(&tokens[idx], kw)),
    }
}

/// Integer literal at the next significant position.
fn number_at(tokens: &[Token], start: usize) -> Option<(u64, usize)> {
    let idx = lexer::next_significant(tokens, start)?;
    match &tokens[idx] {
        Token::Number(text, _) => text.parse::<u64>().ok().map(|count| (count, idx)),
        _ => None,
    }
}

fn wrap(statement: &str, max_rows: u64, break_line: bool) -> String {
    let newline = if break_line { "\n" } else { "" };
    format!(
        "SELECT * FROM ({}{}) AS {} LIMIT {}",
        statement, newline, WRAP_ALIAS, max_rows
    )
}
