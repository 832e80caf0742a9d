//! # vista-guard
//!
//! The SQL safety guard that sits between generated SQL and a live tenant
//! database connection.
//!
//! Every statement, whatever its origin, goes through [`SqlGuard`]:
//!
//! 1. **Shape validation**: one read-only `SELECT`/`WITH` statement, no
//!    statement separators, no forbidden verbs or functions.
//! 2. **Table scoping**: every referenced relation resolves against the
//!    tenant's [`AllowedTableSet`].
//! 3. **Row capping**: the accepted statement is rewritten to return at most
//!    the configured number of rows.
//!
//! **Before (from the model):**
//! ```sql
//! SELECT region, sum(amount) FROM orders GROUP BY region
//! ```
//!
//! **After (to the database):**
//! ```sql
//! SELECT region, sum(amount) FROM orders GROUP BY region LIMIT 1000
//! ```
//!
//! ## Rejections
//!
//! | Code | Meaning |
//! |------|---------|
//! | `EMPTY` | No statement text |
//! | `NOT_SELECT` | Does not start with `SELECT`/`WITH` |
//! | `MULTI_STATEMENT` | Contains a `;` |
//! | `FORBIDDEN_KEYWORD` | A blocklisted verb appears as a word |
//! | `FORBIDDEN_FUNCTION` | A session-mutating or escaping function is called |
//! | `TABLE_NOT_ALLOWED` | A relation is outside the allow-list |
//! | `MALFORMED` | The statement could not be tokenized or parsed |
//! | `LIMIT_EXCEEDED` | Explicit limit above the cap under the `reject` policy |

pub mod classifier;
pub mod decision;
pub mod dialect;
pub mod error;
pub mod guard;
pub mod limit;
pub mod shape;
pub mod tables;

mod lexer;

pub use classifier::{ForbiddenToken, LexicalClassifier};
pub use decision::{GuardDecision, Rejection, RejectionReason};
pub use dialect::DialectPolicy;
pub use error::GuardError;
pub use guard::SqlGuard;
pub use limit::{ExistingLimit, LimitEnforcer};
pub use shape::ShapeValidator;
pub use tables::{AllowedTableSet, TableName, referenced_tables};
pub use vista_core::{GuardConfig, LimitPolicy, SqlDialect};
