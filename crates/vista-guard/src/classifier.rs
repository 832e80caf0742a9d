//! Lexical classification of forbidden verbs and functions.
//!
//! The classifier works on `sqlparser` tokens rather than raw text, so a
//! forbidden word hidden in a string literal, a quoted identifier or a comment
//! never matches, and `insertion_date` is a single word that never matches
//! `insert`. Classification is statement-wide: CTE bodies and subqueries are
//! scanned like everything else.

use std::fmt;

use sqlparser::tokenizer::{Token, Whitespace};

use crate::dialect::DialectPolicy;
use crate::error::GuardError;
use crate::lexer;

/// A forbidden token found in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenToken {
    /// A blocklisted verb, lowercased.
    Keyword(String),
    /// A call to a blocklisted function, lowercased.
    Function(String),
}

impl fmt::Display for ForbiddenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenToken::Keyword(word) => write!(f, "keyword {}", word.to_uppercase()),
            ForbiddenToken::Function(name) => write!(f, "function {}()", name),
        }
    }
}

/// Detects forbidden tokens for one dialect.
#[derive(Debug, Clone)]
pub struct LexicalClassifier {
    policy: DialectPolicy,
}

impl LexicalClassifier {
    pub fn new(policy: DialectPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DialectPolicy {
        &self.policy
    }

    /// Whether any forbidden token is present.
    ///
    /// Input that cannot be tokenized counts as forbidden.
    pub fn contains_forbidden(&self, sql: &str) -> bool {
        !matches!(self.find_forbidden(sql), Ok(None))
    }

    /// Find the first forbidden token in a statement.
    pub fn find_forbidden(&self, sql: &str) -> Result<Option<ForbiddenToken>, GuardError> {
        let tokens = lexer::tokenize(self.policy.dialect(), sql)?;
        self.scan(&tokens)
    }

    /// Scan already tokenized input.
    pub(crate) fn scan(&self, tokens: &[Token]) -> Result<Option<ForbiddenToken>, GuardError> {
        for (idx, token) in tokens.iter().enumerate() {
            match token {
                Token::Word(word) => {
                    let lower = word.value.to_lowercase();

                    if word.quote_style.is_none() && self.policy.is_forbidden_keyword(&lower) {
                        return Ok(Some(ForbiddenToken::Keyword(lower)));
                    }

                    // quoted function names still resolve to the function
                    if self.policy.is_forbidden_function(&lower) && self.is_call(tokens, idx) {
                        return Ok(Some(ForbiddenToken::Function(lower)));
                    }
                }
                Token::Whitespace(Whitespace::MultiLineComment(body))
                    if self.policy.executes_bang_comments() =>
                {
                    if let Some(code) = body.strip_prefix('!') {
                        let code = code.trim_start_matches(|c: char| c.is_ascii_digit());
                        if let Some(found) = self.find_forbidden(code)? {
                            return Ok(Some(found));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(None)
    }

    fn is_call(&self, tokens: &[Token], word_idx: usize) -> bool {
        lexer::next_significant(tokens, word_idx + 1)
            .is_some_and(|next| tokens[next] == Token::LParen)
    }
}
