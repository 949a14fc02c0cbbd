//! Foreign key recovery from original MySQL table definitions.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::core::identifier::{quote_ident, truncate_pg_name, TargetSchema};
use crate::error::Result;

/// Backtick-quoted or bare identifier; captures the inner text in one of two groups.
const NAME: &str = r"(?:`((?:[^`]|``)+)`|([A-Za-z0-9_$]+))";

static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)\bCONSTRAINT\s+{name}\s+FOREIGN\s+KEY\s*(?:{name}\s*)?\(([^)]*)\)\s*REFERENCES\s+(?:{name}\s*\.\s*)?{name}\s*\(([^)]*)\)((?:\s+ON\s+(?:DELETE|UPDATE)\s+(?:RESTRICT|CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION))*)",
        name = NAME
    ))
    .unwrap()
});

static ANONYMOUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)\bFOREIGN\s+KEY\s*(?:{name}\s*)?\(([^)]*)\)\s*REFERENCES\s+(?:{name}\s*\.\s*)?{name}\s*\(([^)]*)\)((?:\s+ON\s+(?:DELETE|UPDATE)\s+(?:RESTRICT|CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION))*)",
        name = NAME
    ))
    .unwrap()
});

static ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ON\s+(DELETE|UPDATE)\s+(RESTRICT|CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .unwrap()
});

static COLUMN: Lazy<Regex> = Lazy::new(|| Regex::new(NAME).unwrap());

/// A foreign key declared in a MySQL table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDefinition {
    /// Declared name, or `fk_<table>_<n>` for anonymous declarations.
    pub constraint_name: String,
    pub table: String,
    pub columns: Vec<String>,
    /// Database qualifier on the referenced table, when present.
    pub referenced_database: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKeyDefinition {
    /// `ALTER TABLE ... ADD CONSTRAINT ... NOT VALID` for `target`.
    ///
    /// A reference into another source database resolves to that database's
    /// schema under the same catalog.
    pub fn add_sql(&self, target: &TargetSchema) -> Result<String> {
        let referenced = match &self.referenced_database {
            Some(db) if db != target.schema() => {
                TargetSchema::new(target.catalog(), db)?.qualify(&self.referenced_table)
            }
            _ => target.qualify(&self.referenced_table),
        };

        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            target.qualify(&self.table),
            quote_ident(&self.constraint_name),
            quote_list(&self.columns),
            referenced,
            quote_list(&self.referenced_columns),
        );
        if let Some(action) = &self.on_delete {
            sql.push_str(&format!(" ON DELETE {}", action));
        }
        if let Some(action) = &self.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action));
        }
        sql.push_str(" NOT VALID");
        Ok(sql)
    }

    /// `ALTER TABLE ... VALIDATE CONSTRAINT ...` for `target`.
    pub fn validate_sql(&self, target: &TargetSchema) -> String {
        format!(
            "ALTER TABLE {} VALIDATE CONSTRAINT {}",
            target.qualify(&self.table),
            quote_ident(&self.constraint_name)
        )
    }
}

fn quote_list(names: &[String]) -> String {
    names.iter().map(|n| quote_ident(n)).collect::<Vec<_>>().join(", ")
}

fn ident(caps: &Captures, quoted: usize) -> Option<String> {
    caps.get(quoted)
        .map(|m| m.as_str().replace("``", "`"))
        .or_else(|| caps.get(quoted + 1).map(|m| m.as_str().to_string()))
}

fn column_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            // Drop MySQL prefix lengths: `name`(10)
            let caps = COLUMN.captures(part.trim())?;
            ident(&caps, 1)
        })
        .collect()
}

fn actions(raw: &str) -> (Option<String>, Option<String>) {
    let mut on_delete = None;
    let mut on_update = None;
    for caps in ACTION.captures_iter(raw) {
        let action = caps[2]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        if caps[1].eq_ignore_ascii_case("DELETE") {
            on_delete = Some(action);
        } else {
            on_update = Some(action);
        }
    }
    (on_delete, on_update)
}

/// Build a definition from a match whose column list sits at group `3 + shift`.
fn from_captures(caps: &Captures, shift: usize, name: String, table: &str) -> ForeignKeyDefinition {
    let (on_delete, on_update) = actions(caps.get(9 + shift).map_or("", |m| m.as_str()));
    ForeignKeyDefinition {
        constraint_name: truncate_pg_name(&name),
        table: table.to_string(),
        columns: column_list(&caps[3 + shift]),
        referenced_database: ident(caps, 4 + shift),
        referenced_table: ident(caps, 6 + shift).unwrap_or_default(),
        referenced_columns: column_list(&caps[8 + shift]),
        on_delete,
        on_update,
    }
}

/// Recover the foreign keys declared in `definition` for `table`.
///
/// Named declarations keep their name. Anonymous ones are numbered in
/// declaration order, so repeated runs produce the same names.
pub fn extract(definition: &str, table: &str) -> Vec<ForeignKeyDefinition> {
    let mut found: Vec<(usize, ForeignKeyDefinition)> = Vec::new();
    let mut named_spans = Vec::new();

    for caps in NAMED.captures_iter(definition) {
        let Some(whole) = caps.get(0) else { continue };
        named_spans.push(whole.range());
        if let Some(name) = ident(&caps, 1) {
            found.push((whole.start(), from_captures(&caps, 2, name, table)));
        }
    }

    let mut ordinal = 0;
    for caps in ANONYMOUS.captures_iter(definition) {
        let Some(whole) = caps.get(0) else { continue };
        if named_spans.iter().any(|span| span.contains(&whole.start())) {
            continue;
        }
        ordinal += 1;
        let name = format!("fk_{}_{}", table, ordinal);
        found.push((whole.start(), from_captures(&caps, 0, name, table)));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, fk)| fk).collect()
}
