//! Thin helpers over the `sqlparser` tokenizer.

use std::ops::Range;

use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Location, Span, Token, TokenWithSpan, Tokenizer, Whitespace, Word};
use vista_core::SqlDialect;

use crate::error::GuardError;

pub(crate) fn parser_dialect(dialect: SqlDialect) -> Box<dyn Dialect> {
    match dialect {
        SqlDialect::Postgresql => Box::new(PostgreSqlDialect {}),
        SqlDialect::Mysql => Box::new(MySqlDialect {}),
        SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Tokenize a statement. Literals and comments come back as their own tokens.
pub(crate) fn tokenize(dialect: SqlDialect, sql: &str) -> Result<Vec<Token>, GuardError> {
    let dialect = parser_dialect(dialect);
    Tokenizer::new(dialect.as_ref(), sql)
        .tokenize()
        .map_err(|e| GuardError::Tokenize(e.to_string()))
}

/// Tokenize keeping each token's source span, for rewrites that must leave
/// the rest of the text untouched.
pub(crate) fn tokenize_spanned(
    dialect: SqlDialect,
    sql: &str,
) -> Result<Vec<TokenWithSpan>, GuardError> {
    let dialect = parser_dialect(dialect);
    Tokenizer::new(dialect.as_ref(), sql)
        .tokenize_with_location()
        .map_err(|e| GuardError::Tokenize(e.to_string()))
}

/// Byte range of `span` in `sql`.
pub(crate) fn byte_range(sql: &str, span: Span) -> Option<Range<usize>> {
    let start = byte_offset(sql, span.start)?;
    let end = byte_offset(sql, span.end)?;
    (start <= end).then_some(start..end)
}

/// Locations are 1-based lines and 1-based character columns.
fn byte_offset(sql: &str, location: Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;

    let line_start = match line {
        0 => 0,
        n => sql.match_indices('\n').nth(n - 1)?.0 + 1,
    };
    let rest = &sql[line_start..];
    rest.char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(rest.len()))
        .nth(column)
        .map(|idx| line_start + idx)
}

/// Leading word of raw text, skipping whitespace and comments. Used when the
/// tokenizer gives up.
pub(crate) fn raw_leading_word(sql: &str) -> Option<&str> {
    let mut rest = sql.trim_start();
    loop {
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let word = &rest[..end];
    (!word.is_empty()).then_some(word)
}

/// Whitespace and comments.
pub(crate) fn is_trivia(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_) | Token::EOF)
}

/// Index of the first non-trivia token at or after `start`.
pub(crate) fn next_significant(tokens: &[Token], start: usize) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, token)| !is_trivia(token))
        .map(|(idx, _)| idx)
}

/// An unquoted word, i.e. a keyword or bare identifier.
pub(crate) fn bare_word(token: &Token) -> Option<&Word> {
    match token {
        Token::Word(word) if word.quote_style.is_none() => Some(word),
        _ => None,
    }
}

pub(crate) fn is_keyword(token: &Token, keyword: &str) -> bool {
    bare_word(token).is_some_and(|word| word.value.eq_ignore_ascii_case(keyword))
}

/// True when the statement ends inside a `--` or `#` comment, so anything
/// appended on the same line would be commented out.
pub(crate) fn ends_with_line_comment(tokens: &[Token]) -> bool {
    tokens
        .iter()
        .rev()
        .find(|token| {
            !matches!(
                token,
                Token::EOF
                    | Token::Whitespace(Whitespace::Space)
                    | Token::Whitespace(Whitespace::Tab)
            )
        })
        .is_some_and(|token| {
            matches!(
                token,
                Token::Whitespace(Whitespace::SingleLineComment { comment, .. })
                    if !comment.ends_with('\n')
            )
        })
}
