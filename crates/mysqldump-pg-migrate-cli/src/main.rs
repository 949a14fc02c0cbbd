//! mysqldump-pg-migrate CLI - move a multi-database mysqldump into PostgreSQL.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mysqldump_pg_migrate::{
    Converter, DumpScanner, MigrateError, Migrator, MigratorConfig, PgWarehouse, TargetSchema,
    Warehouse,
};
use mysqldump_pg_migrate_cli::{load_config, logging, signals, summary};
use tracing::info;

#[derive(Parser)]
#[command(name = "mysqldump-pg-migrate")]
#[command(about = "Migrate multi-database mysqldump files into PostgreSQL schemas")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// PostgreSQL connection string (overrides target in the config file)
    #[arg(long, global = true)]
    connection_string: Option<String>,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,

    /// Shorthand for --verbosity debug; also lists per-table warnings
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the databases contained in a dump
    Scan {
        /// Path to the mysqldump file
        dump: PathBuf,

        /// Also show the number of tables per database
        #[arg(long)]
        summary: bool,
    },

    /// Print converted table definitions without touching the warehouse
    Preview {
        /// Path to the mysqldump file
        dump: PathBuf,

        /// Source database to preview
        database: String,

        /// Maximum number of tables to show
        #[arg(long, default_value = "3")]
        limit: usize,

        /// Schema prefix (umbrella catalog) used in qualified names
        #[arg(long)]
        schema: Option<String>,
    },

    /// Migrate databases from a dump into the warehouse
    Migrate {
        /// Path to the mysqldump file
        dump: PathBuf,

        /// Source databases to migrate, in order
        #[arg(long, required = true, num_args = 1..)]
        databases: Vec<String>,

        /// Schema prefix (umbrella catalog) for the target schemas
        #[arg(long)]
        schema: Option<String>,

        /// Convert everything but execute nothing
        #[arg(long)]
        dry_run: bool,

        /// Write converted SQL review files
        #[arg(long)]
        save_sql: bool,

        /// Directory for review files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Tables migrated concurrently within one database
        #[arg(long)]
        workers: Option<usize>,

        /// Extract all requested databases in one pass over the dump
        #[arg(long)]
        single_pass: bool,
    },
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

/// Returns whether every unit of work succeeded.
async fn run() -> Result<bool, MigrateError> {
    let cli = Cli::parse();

    let verbosity = if cli.verbose { "debug" } else { cli.verbosity.as_str() };
    logging::setup_logging(verbosity, &cli.log_format);

    let mut config = load_config(cli.config.as_deref(), cli.connection_string.as_deref())?;

    match cli.command {
        Commands::Scan { dump, summary } => {
            let scanner = DumpScanner::new(&dump)?
                .with_progress_interval(config.migration.progress_interval);

            if summary {
                let summaries = scanner.run_blocking(|s| s.summarize()).await?;
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                } else {
                    println!("{} database(s) in {}", summaries.len(), dump.display());
                    for (name, summary) in &summaries {
                        println!("  {}: {} table(s)", name, summary.table_count);
                    }
                }
            } else {
                let names: Vec<String> = scanner
                    .run_blocking(|s| s.scan_database_names())
                    .await?
                    .into_iter()
                    .collect();
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&names)?);
                } else {
                    for name in &names {
                        println!("{}", name);
                    }
                }
            }
            Ok(true)
        }

        Commands::Preview {
            dump,
            database,
            limit,
            schema,
        } => {
            let scanner = DumpScanner::new(&dump)?
                .with_progress_interval(config.migration.progress_interval);
            let prefix = schema.or(config.migration.schema_prefix);
            let target = TargetSchema::new(prefix.as_deref(), &database)?;

            let name = database.clone();
            let content = scanner.run_blocking(move |s| s.extract_database(&name)).await?;
            if content.is_empty() {
                return Err(MigrateError::Config(format!(
                    "database {} not found in {}",
                    database,
                    dump.display()
                )));
            }

            let converter = Converter::default();
            println!(
                "-- {} -> {} ({} table(s), showing up to {})",
                database,
                target,
                content.table_count(),
                limit
            );
            let mut all_ok = true;
            for table in content.tables.values().take(limit) {
                println!("\n-- Table: {}", table.name);
                let Some(definition) = &table.definition else {
                    println!("-- no CREATE TABLE statement found in dump");
                    continue;
                };
                let result = converter.convert(definition, &target);
                if result.success {
                    println!("{};", result.converted);
                } else {
                    all_ok = false;
                    println!("-- conversion failed: {}", result.errors.join("; "));
                }
                for warning in &result.warnings {
                    println!("-- warning: {}", warning);
                }
            }
            Ok(all_ok)
        }

        Commands::Migrate {
            dump,
            databases,
            schema,
            dry_run,
            save_sql,
            output_dir,
            workers,
            single_pass,
        } => {
            let settings = &mut config.migration;
            if schema.is_some() {
                settings.schema_prefix = schema;
            }
            if let Some(dir) = output_dir {
                settings.output_dir = dir;
            }
            if let Some(w) = workers {
                settings.workers = w;
            }
            settings.save_sql |= save_sql;
            settings.single_pass |= single_pass;
            config.validate()?;

            let warehouse: Option<Arc<dyn Warehouse>> = if dry_run {
                None
            } else {
                let target = config.require_target("migrate")?;
                info!("Connecting to warehouse {}", target.describe());
                let warehouse = PgWarehouse::connect(target, config.migration.workers).await?;
                Some(Arc::new(warehouse))
            };

            let run = MigratorConfig::from_settings(dump, databases, &config.migration, dry_run);
            let migrator =
                Migrator::new(run, warehouse)?.with_cancellation(signals::shutdown_token());
            let report = migrator.run().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", summary::render_migration(&report, cli.verbose));
            }
            Ok(report.success())
        }
    }
}
