//! Human-readable run summaries with ✓/✗ markers.

use std::fmt::Write as _;

use mysqldump_pg_migrate::{ConstraintReport, ConstraintStatus, MigrationReport};

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

/// Database → table tree for a migration report.
pub fn render_migration(report: &MigrationReport, verbose: bool) -> String {
    let mut out = String::new();
    let title = match (report.dry_run, report.cancelled) {
        (_, true) => "Migration cancelled",
        (true, false) => "Dry run completed",
        (false, false) => "Migration completed",
    };
    let _ = writeln!(out, "\n{}", title);
    let _ = writeln!(out, "  Run ID: {}", report.run_id);
    let _ = writeln!(out, "  Duration: {:.2}s", report.duration_seconds());

    for db in &report.databases {
        let _ = writeln!(
            out,
            "  {} {} -> {} ({} tables, {} rows, {:.2}s)",
            mark(db.success()),
            db.database,
            db.schema,
            db.tables.len(),
            db.rows_migrated(),
            db.duration_seconds
        );
        if let Some(error) = &db.error {
            let _ = writeln!(out, "      error: {}", error);
        }
        for warning in &db.warnings {
            let _ = writeln!(out, "      warning: {}", warning);
        }
        for table in &db.tables {
            match &table.error {
                None => {
                    let _ = writeln!(
                        out,
                        "      {} {}: {} rows",
                        mark(true),
                        table.table,
                        table.rows_migrated
                    );
                }
                Some(error) => {
                    let _ = writeln!(out, "      {} {}: {}", mark(false), table.table, error);
                }
            }
            if verbose {
                for warning in &table.warnings {
                    let _ = writeln!(out, "          warning: {}", warning);
                }
            }
        }
    }

    for name in &report.skipped_databases {
        let _ = writeln!(out, "  - {}: not found in dump, skipped", name);
    }

    let total = report.tables_total();
    let _ = writeln!(
        out,
        "  Tables: {}/{} succeeded",
        total - report.tables_failed(),
        total
    );
    let _ = writeln!(out, "  Rows: {}", report.rows_migrated());
    out
}

/// One line per constraint, then the totals.
pub fn render_constraints(report: &ConstraintReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}",
        if report.cancelled {
            "Constraint pass cancelled"
        } else {
            "Constraint pass completed"
        }
    );

    for result in &report.results {
        let label = format!("{}.{}.{}", result.database, result.table, result.constraint);
        match result.status {
            ConstraintStatus::Added => {
                let note = if result.validated { "added, validated" } else { "added" };
                let _ = writeln!(out, "  {} {} ({})", mark(true), label, note);
            }
            ConstraintStatus::AlreadyExists => {
                let _ = writeln!(out, "  {} {} (already exists)", mark(true), label);
            }
            ConstraintStatus::Validated => {
                let _ = writeln!(out, "  {} {} (already exists, validated)", mark(true), label);
            }
            ConstraintStatus::Failed => {
                let _ = writeln!(
                    out,
                    "  {} {}: {}",
                    mark(false),
                    label,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    let _ = writeln!(
        out,
        "  Added: {}  Already present: {}  Failed: {}  ({:.2}s)",
        report.added(),
        report.already_present(),
        report.failed(),
        report.duration_seconds
    );
    out
}
