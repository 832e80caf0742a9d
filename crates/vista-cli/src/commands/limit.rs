//! `vista limit` command implementation.

use anyhow::Result;
use vista_core::{GuardConfig, VistaConfig};
use vista_guard::SqlGuard;

use super::GuardArgs;

pub fn run(config: &VistaConfig, args: &GuardArgs, sql: &str) -> Result<()> {
    println!("{}", limited(args.apply(config.guard.clone()), sql)?);
    Ok(())
}

/// Apply the configured row cap without validating the statement.
pub fn limited(config: GuardConfig, sql: &str) -> Result<String> {
    let max_rows = config.effective_max_rows();
    let guard = SqlGuard::new(config)?;
    Ok(guard.enforce_limit(sql, max_rows))
}
