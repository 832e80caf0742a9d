//! Guard decisions and rejection reasons.
//!
//! Rejecting a statement is a normal outcome, so it is carried as data rather
//! than as an error. `Rejection` still implements `std::error::Error` so a
//! caller that wants to bail out can use `?`.

use serde::Serialize;
use std::fmt;

/// Generic text shown to end users for any rejection.
pub const PUBLIC_REJECTION_MESSAGE: &str = "could not run this query safely";

/// Stable reason codes for rejected statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    Empty,
    NotSelect,
    MultiStatement,
    ForbiddenKeyword,
    ForbiddenFunction,
    TableNotAllowed,
    Malformed,
    LimitExceeded,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::Empty => "EMPTY",
            RejectionReason::NotSelect => "NOT_SELECT",
            RejectionReason::MultiStatement => "MULTI_STATEMENT",
            RejectionReason::ForbiddenKeyword => "FORBIDDEN_KEYWORD",
            RejectionReason::ForbiddenFunction => "FORBIDDEN_FUNCTION",
            RejectionReason::TableNotAllowed => "TABLE_NOT_ALLOWED",
            RejectionReason::Malformed => "MALFORMED",
            RejectionReason::LimitExceeded => "LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a statement was rejected.
///
/// `detail` is meant for logs and API consumers. It names the offending
/// keyword or table but never repeats the statement text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct Rejection {
    pub reason: RejectionReason,
    pub detail: String,
}

impl Rejection {
    pub fn new(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(RejectionReason::Empty, "no statement text was submitted")
    }

    /// `found` is the leading word, if the statement starts with one.
    pub fn not_select(found: Option<&str>) -> Self {
        let detail = match found {
            Some(word) => format!(
                "statement must start with SELECT or WITH, found {}",
                truncate(&word.to_uppercase(), 32)
            ),
            None => "statement must start with SELECT or WITH".to_string(),
        };
        Self::new(RejectionReason::NotSelect, detail)
    }

    pub fn not_a_query() -> Self {
        Self::new(
            RejectionReason::NotSelect,
            "statement does not parse as a read-only query",
        )
    }

    pub fn multi_statement() -> Self {
        Self::new(
            RejectionReason::MultiStatement,
            "statement separators (';') are not allowed",
        )
    }

    pub fn forbidden_keyword(keyword: &str) -> Self {
        Self::new(
            RejectionReason::ForbiddenKeyword,
            format!("keyword {} is not allowed", keyword.to_uppercase()),
        )
    }

    pub fn forbidden_function(function: &str) -> Self {
        Self::new(
            RejectionReason::ForbiddenFunction,
            format!("function {}() is not allowed", function),
        )
    }

    pub fn table_not_allowed(table: &str) -> Self {
        Self::new(
            RejectionReason::TableNotAllowed,
            format!("table '{}' is not in the allowed table set", truncate(table, 128)),
        )
    }

    pub fn empty_allow_list() -> Self {
        Self::new(
            RejectionReason::TableNotAllowed,
            "no tables are allowed for this data source",
        )
    }

    pub fn malformed(error: impl fmt::Display) -> Self {
        Self::new(
            RejectionReason::Malformed,
            format!("statement could not be analyzed: {}", error),
        )
    }

    pub fn limit_exceeded(requested: u64, max: u64) -> Self {
        Self::new(
            RejectionReason::LimitExceeded,
            format!("explicit limit {} exceeds the maximum of {} rows", requested, max),
        )
    }

    pub fn code(&self) -> &'static str {
        self.reason.code()
    }

    /// Message safe to show to end users.
    pub fn public_message(&self) -> &'static str {
        PUBLIC_REJECTION_MESSAGE
    }
}

/// Outcome of running a statement through the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Exactly one runnable statement.
    Accepted { sql: String },
    Rejected(Rejection),
}

impl GuardDecision {
    pub fn accepted(sql: impl Into<String>) -> Self {
        GuardDecision::Accepted { sql: sql.into() }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, GuardDecision::Accepted { .. })
    }

    /// The runnable statement, if accepted.
    pub fn sql(&self) -> Option<&str> {
        match self {
            GuardDecision::Accepted { sql } => Some(sql),
            GuardDecision::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GuardDecision::Accepted { .. } => None,
            GuardDecision::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn into_result(self) -> Result<String, Rejection> {
        match self {
            GuardDecision::Accepted { sql } => Ok(sql),
            GuardDecision::Rejected(rejection) => Err(rejection),
        }
    }
}

impl From<Result<String, Rejection>> for GuardDecision {
    fn from(result: Result<String, Rejection>) -> Self {
        match result {
            Ok(sql) => GuardDecision::Accepted { sql },
            Err(rejection) => GuardDecision::Rejected(rejection),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
