//! `vista check` command implementation.
//!
//! Prints the guard decision for one statement. With `--tables` the full
//! guard runs, row cap included; without it only the statement shape is checked.

use anyhow::Result;
use vista_core::{GuardConfig, VistaConfig};
use vista_guard::{AllowedTableSet, GuardDecision, SqlGuard};

use super::GuardArgs;

/// Decide on `sql`. Returns whether it was accepted.
pub fn run(
    config: &VistaConfig,
    args: &GuardArgs,
    tables: &[String],
    sql: &str,
    json: bool,
) -> Result<bool> {
    let decision = decide(args.apply(config.guard.clone()), tables, sql)?;
    println!("{}", render(&decision, json)?);
    Ok(decision.is_accepted())
}

pub fn decide(config: GuardConfig, tables: &[String], sql: &str) -> Result<GuardDecision> {
    let guard = SqlGuard::new(config)?;
    if tables.is_empty() {
        return Ok(guard.check_shape(sql));
    }

    let tables: AllowedTableSet = tables.iter().collect();
    Ok(guard.prepare(sql, &tables))
}

pub fn render(decision: &GuardDecision, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(decision)?);
    }

    Ok(match decision {
        GuardDecision::Accepted { sql } => format!("ACCEPTED\n{}", sql),
        GuardDecision::Rejected(rejection) => format!("REJECTED {}", rejection),
    })
}
