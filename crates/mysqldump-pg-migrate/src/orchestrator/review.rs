//! Human-reviewable converted SQL, one file per database.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::convert::{ConversionResult, Converter};
use crate::core::identifier::TargetSchema;
use crate::dump::DatabaseContent;
use crate::error::Result;

/// Path of the review file for `database` under `dir`.
///
/// Characters other than letters, digits, `_`, `-` and `$` become `_`, so the
/// file always lands directly inside `dir`.
pub fn review_path(dir: &Path, database: &str) -> PathBuf {
    let stem: String = database
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '$') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{}_converted.sql", stem))
}

fn push_statement(out: &mut String, result: &ConversionResult) {
    if result.success {
        if !result.is_empty() {
            out.push_str(&result.converted);
            out.push_str(";\n");
        }
    } else {
        let _ = writeln!(out, "-- conversion failed: {}", result.errors.join("; "));
    }
}

/// Render the converted SQL for one database.
///
/// Each table gets its converted definition followed by at most `sample`
/// converted data statements.
pub fn render(
    converter: &Converter,
    target: &TargetSchema,
    content: &DatabaseContent,
    sample: usize,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- Converted SQL for MySQL database `{}`", content.name);
    let _ = writeln!(out, "-- Target schema: {}", target);
    let _ = writeln!(out, "-- Generated: {}", Utc::now().to_rfc3339());
    let _ = writeln!(out, "-- Tables: {}", content.table_count());
    out.push('\n');
    out.push_str(&target.create_schema_sql());
    out.push_str(";\n");

    for table in content.tables.values() {
        let _ = writeln!(out, "\n-- Table: {}", table.name);
        match &table.definition {
            Some(definition) => push_statement(&mut out, &converter.convert(definition, target)),
            None => out.push_str("-- no CREATE TABLE statement found in dump\n"),
        }

        for statement in table.data_statements.iter().take(sample) {
            push_statement(&mut out, &converter.convert(statement, target));
        }
        let omitted = table.data_statements.len().saturating_sub(sample);
        if omitted > 0 {
            let _ = writeln!(out, "-- ... {} more data statement(s) omitted", omitted);
        }
    }
    out
}

/// Render and write the review file, returning its path.
pub fn write(
    dir: &Path,
    converter: &Converter,
    target: &TargetSchema,
    content: &DatabaseContent,
    sample: usize,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = review_path(dir, &content.name);
    let rendered = render(converter, target, content, sample);

    let temp_path = path.with_extension("sql.tmp");
    std::fs::write(&temp_path, rendered)?;
    std::fs::rename(&temp_path, &path)?;
    Ok(path)
}
