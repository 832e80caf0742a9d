use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{GuardArgs, SqlInput};

#[derive(Parser, Debug)]
#[command(name = "vista", version, about = "Data Vista SQL guard")]
struct Cli {
    /// Path to vista.yaml. Defaults to ./vista.yaml when present.
    #[arg(long, short, global = true, env = "VISTA_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a statement and print the guard decision. Exits 1 on rejection.
    Check {
        #[command(flatten)]
        guard: GuardArgs,

        /// Allowed tables, comma separated. Without it only the statement shape is checked.
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Print the decision as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        input: SqlInput,
    },

    /// Print a statement with the row cap applied
    Limit {
        #[command(flatten)]
        guard: GuardArgs,

        #[command(flatten)]
        input: SqlInput,
    },

    /// List the tables introspected from a schema
    Tables {
        #[arg(long, default_value = "public")]
        schema: String,
    },

    /// Guard and run a statement against the upstream database, printing rows as JSON
    Run {
        #[command(flatten)]
        guard: GuardArgs,

        /// Schema whose tables form the allow-list and search path
        #[arg(long, default_value = "public")]
        schema: String,

        #[command(flatten)]
        input: SqlInput,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    let accepted = match cli.cmd {
        Command::Check {
            guard,
            tables,
            json,
            input,
        } => commands::check::run(&config, &guard, &tables, &input.read()?, json)?,

        Command::Limit { guard, input } => {
            commands::limit::run(&config, &guard, &input.read()?)?;
            true
        }

        Command::Tables { schema } => {
            commands::tables::run(&config, &schema).await?;
            true
        }

        Command::Run {
            guard,
            schema,
            input,
        } => commands::run::run(&config, &guard, &schema, &input.read()?).await?,
    };

    if !accepted {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_core::SqlDialect;

    #[test]
    fn test_parse_check_with_tables() {
        let cli = Cli::try_parse_from([
            "vista",
            "check",
            "--dialect",
            "mysql",
            "--tables",
            "orders,customers",
            "--max-rows",
            "50",
            "--sql",
            "select * from orders",
        ])
        .unwrap();

        match cli.cmd {
            Command::Check {
                guard,
                tables,
                json,
                input,
            } => {
                assert_eq!(guard.dialect, Some(SqlDialect::Mysql));
                assert_eq!(guard.max_rows, Some(50));
                assert_eq!(tables, vec!["orders", "customers"]);
                assert!(!json);
                assert_eq!(input.sql.as_deref(), Some("select * from orders"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_sql_and_file_are_exclusive() {
        let result = Cli::try_parse_from([
            "vista", "limit", "--sql", "select 1", "--file", "query.sql",
        ]);
        assert!(result.is_err());

        assert!(Cli::try_parse_from(["vista", "limit"]).is_err());
    }

    #[test]
    fn test_unknown_dialect_is_a_usage_error() {
        let result = Cli::try_parse_from(["vista", "check", "--dialect", "oracle", "--sql", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "vista", "tables", "--schema", "sales", "-v", "--config", "custom.yaml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
        assert!(matches!(cli.cmd, Command::Tables { schema } if schema == "sales"));
    }
}
