//! The guard facade.

use vista_core::{GuardConfig, LimitPolicy, SqlDialect};

use crate::classifier::LexicalClassifier;
use crate::decision::{GuardDecision, Rejection};
use crate::dialect::DialectPolicy;
use crate::error::GuardError;
use crate::limit::{ExistingLimit, LimitEnforcer};
use crate::shape::ShapeValidator;
use crate::tables::AllowedTableSet;

/// Per-dialect SQL guard.
///
/// Stateless and cheap to clone; share one instance across request handlers.
/// Callers must validate before enforcing a limit: [`prepare`](Self::prepare)
/// does both in the right order.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    config: GuardConfig,
    validator: ShapeValidator,
    enforcer: LimitEnforcer,
}

impl SqlGuard {
    /// Build a guard from configuration.
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Guard with default limits for a dialect.
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        Self::build(GuardConfig::for_dialect(dialect))
    }

    fn build(config: GuardConfig) -> Self {
        let policy = DialectPolicy::for_dialect(config.dialect)
            .with_extra_keywords(&config.extra_forbidden_keywords);
        let validator = ShapeValidator::new(LexicalClassifier::new(policy))
            .allow_trailing_semicolon(config.allow_trailing_semicolon)
            .default_schema(config.default_schema.clone());
        let enforcer = LimitEnforcer::new(config.dialect);

        Self {
            config,
            validator,
            enforcer,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn dialect(&self) -> SqlDialect {
        self.config.dialect
    }

    pub fn policy(&self) -> &DialectPolicy {
        self.validator.classifier().policy()
    }

    /// Full validation: shape rules plus the table allow-list.
    ///
    /// The accepted text is the trimmed statement, without a row cap.
    pub fn validate(&self, sql: &str, tables: &AllowedTableSet) -> GuardDecision {
        match self.validator.validate(sql, tables) {
            Ok(statement) => GuardDecision::accepted(statement),
            Err(rejection) => self.rejected(sql, rejection),
        }
    }

    /// Shape rules only, for callers that do not scope tables.
    pub fn is_select_only(&self, sql: &str) -> bool {
        self.validator.check_shape(sql).is_ok()
    }

    /// Shape rules only, with the reason when they fail.
    pub fn check_shape(&self, sql: &str) -> GuardDecision {
        match self.validator.check_shape(sql) {
            Ok(statement) => GuardDecision::accepted(statement),
            Err(rejection) => self.rejected(sql, rejection),
        }
    }

    /// Cap the rows a validated statement returns, per the configured policy.
    pub fn enforce_limit(&self, sql: &str, max_rows: u64) -> String {
        self.enforcer
            .enforce_with_policy(sql, max_rows, self.config.limit_policy)
    }

    /// Validate, then cap at the configured maximum.
    pub fn prepare(&self, sql: &str, tables: &AllowedTableSet) -> GuardDecision {
        self.prepare_with_limit(sql, tables, self.config.max_rows)
    }

    /// Validate, then cap at `max_rows`. The accepted text is exactly one
    /// runnable, row-capped query.
    pub fn prepare_with_limit(
        &self,
        sql: &str,
        tables: &AllowedTableSet,
        max_rows: u64,
    ) -> GuardDecision {
        let statement = match self.validator.validate(sql, tables) {
            Ok(statement) => statement,
            Err(rejection) => return self.rejected(sql, rejection),
        };

        let max_rows = max_rows.max(1);
        if self.config.limit_policy == LimitPolicy::Reject {
            if let ExistingLimit::Rows(requested) = self.enforcer.existing_limit(&statement) {
                if requested > max_rows {
                    return self.rejected(sql, Rejection::limit_exceeded(requested, max_rows));
                }
            }
        }

        let limited = self.enforce_limit(&statement, max_rows);
        // the rewrite must still be a statement this guard accepts
        if let Err(rejection) = self.validator.validate(&limited, tables) {
            tracing::warn!(
                reason = rejection.code(),
                dialect = %self.config.dialect,
                "Row-capped statement failed re-validation"
            );
            return self.rejected(sql, rejection);
        }

        tracing::debug!(
            dialect = %self.config.dialect,
            max_rows,
            tables = tables.len(),
            "SQL statement accepted"
        );
        GuardDecision::accepted(limited)
    }

    fn rejected(&self, sql: &str, rejection: Rejection) -> GuardDecision {
        // never log the statement itself
        tracing::info!(
            reason = rejection.code(),
            dialect = %self.config.dialect,
            statement_len = sql.len(),
            "SQL statement rejected"
        );
        GuardDecision::Rejected(rejection)
    }
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self::for_dialect(SqlDialect::default())
    }
}
