//! mysqldump-pg-constraints - attach the foreign keys of migrated databases.
//!
//! Runs after `mysqldump-pg-migrate migrate`. Every foreign key found in the
//! dump is added `NOT VALID`; with `--validate` it is then validated.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mysqldump_pg_migrate::{ConstraintApplier, DumpScanner, MigrateError, PgWarehouse};
use mysqldump_pg_migrate_cli::{load_config, logging, signals, summary};
use tracing::info;

#[derive(Parser)]
#[command(name = "mysqldump-pg-constraints")]
#[command(about = "Apply foreign keys from a mysqldump to already-migrated PostgreSQL schemas")]
#[command(version)]
struct Cli {
    /// Path to the mysqldump file
    dump: PathBuf,

    /// Source databases whose foreign keys are applied
    #[arg(long, required = true, num_args = 1..)]
    databases: Vec<String>,

    /// Schema prefix (umbrella catalog) the databases were migrated under
    #[arg(long)]
    schema: Option<String>,

    /// Validate each constraint after attaching it
    #[arg(long)]
    validate: bool,

    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PostgreSQL connection string (overrides target in the config file)
    #[arg(long)]
    connection_string: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Shorthand for --verbosity debug
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool, MigrateError> {
    let cli = Cli::parse();

    let verbosity = if cli.verbose { "debug" } else { cli.verbosity.as_str() };
    logging::setup_logging(verbosity, &cli.log_format);

    let config = load_config(cli.config.as_deref(), cli.connection_string.as_deref())?;
    let scanner = DumpScanner::new(&cli.dump)?
        .with_progress_interval(config.migration.progress_interval);
    let target = config.require_target("the constraint pass")?;

    info!("Connecting to warehouse {}", target.describe());
    let warehouse = PgWarehouse::connect(target, 1).await?;

    let prefix = cli.schema.or_else(|| config.migration.schema_prefix.clone());
    let applier = ConstraintApplier::new(Arc::new(warehouse), prefix)
        .with_validation(cli.validate)
        .with_cancellation(signals::shutdown_token());
    let report = applier.run(&scanner, &cli.databases).await?;

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", summary::render_constraints(&report));
    }
    Ok(report.success())
}
