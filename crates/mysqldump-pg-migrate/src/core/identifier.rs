//! Identifier validation, quoting, and target schema naming.
//!
//! SQL identifiers cannot be passed as statement parameters, so every schema,
//! table, and constraint name that ends up in generated DDL is validated and
//! quoted here.
//!
//! A [`TargetSchema`] names where one source database lands in PostgreSQL: an
//! optional catalog (the schema prefix, which is a PostgreSQL database) plus a
//! schema named after the source database.

use std::fmt;

use sqlparser::ast::{Ident, ObjectName};

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted before quoting.
/// - PostgreSQL: 63 bytes (longer names are truncated by the server)
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
pub const PG_MAX_NAME_BYTES: usize = 63;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing NUL bytes, and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a PostgreSQL identifier after validating it.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(quote_ident(name))
}

/// Truncate a constraint or index name to what PostgreSQL will store.
pub fn truncate_pg_name(name: &str) -> String {
    if name.len() <= PG_MAX_NAME_BYTES {
        return name.to_string();
    }
    let mut end = PG_MAX_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// True if the name survives unquoted in PostgreSQL without case folding.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
}

/// Where one source database is written in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetSchema {
    catalog: Option<String>,
    schema: String,
}

impl TargetSchema {
    /// Build the target for `database`, optionally under the `prefix` catalog.
    pub fn new(prefix: Option<&str>, database: &str) -> Result<Self> {
        validate_identifier(database)?;
        let catalog = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => {
                validate_identifier(p)?;
                Some(p.to_string())
            }
            None => None,
        };
        Ok(Self {
            catalog,
            schema: database.to_string(),
        })
    }

    /// The umbrella catalog (schema prefix), if any.
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// The schema named after the source database.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn catalog_sql(&self) -> Option<String> {
        self.catalog.as_ref().map(|c| {
            if is_plain_identifier(c) {
                c.clone()
            } else {
                quote_ident(c)
            }
        })
    }

    /// Qualified schema reference, e.g. `legacy."finance"`.
    pub fn qualified_schema(&self) -> String {
        match self.catalog_sql() {
            Some(catalog) => format!("{}.{}", catalog, quote_ident(&self.schema)),
            None => quote_ident(&self.schema),
        }
    }

    /// Fully qualified table reference, e.g. `legacy."finance"."invoice"`.
    pub fn qualify(&self, table: &str) -> String {
        format!("{}.{}", self.qualified_schema(), quote_ident(table))
    }

    /// The same qualified reference as a syntax-tree object name.
    pub fn object_name(&self, table: &str) -> ObjectName {
        let mut parts = Vec::with_capacity(3);
        if let Some(catalog) = &self.catalog {
            if is_plain_identifier(catalog) {
                parts.push(Ident::new(catalog.clone()));
            } else {
                parts.push(Ident::with_quote('"', catalog.clone()));
            }
        }
        parts.push(Ident::with_quote('"', self.schema.clone()));
        parts.push(Ident::with_quote('"', table));
        ObjectName(parts)
    }

    /// Statement creating the schema inside the catalog database.
    pub fn create_schema_sql(&self) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema))
    }
}

impl fmt::Display for TargetSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.catalog {
            Some(catalog) => write!(f, "{}.{}", catalog, self.schema),
            None => write!(f, "{}", self.schema),
        }
    }
}
