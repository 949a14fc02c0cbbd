//! MySQL to PostgreSQL column type mapping.
//!
//! Both conversion strategies map types through [`map_type`], so the tree and
//! fallback paths always agree on the target type of a column.

use once_cell::sync::Lazy;
use regex::Regex;

/// Result of mapping a type from source to target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Target type string (e.g., "varchar(255)", "bigint").
    pub target_type: String,
    /// Whether this mapping loses data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

/// A MySQL column type split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlType {
    /// Lower-cased base name, e.g. `int`, `double precision`.
    pub base: String,
    /// Raw text between the parentheses, if any.
    pub args: Option<String>,
    pub unsigned: bool,
}

static TYPE_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*([a-z][a-z0-9_ ]*?)\s*(?:\((.*)\))?\s*((?:unsigned|signed|zerofill|\s)*)$")
        .unwrap()
});

impl MySqlType {
    /// Parse a rendered type such as `INT(10) UNSIGNED` or `decimal(12,2)`.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = TYPE_PARTS.captures(raw)?;
        let base = caps[1].split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let args = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|a| !a.is_empty());
        let modifiers = caps.get(3).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        Some(Self {
            base,
            args,
            unsigned: modifiers.contains("unsigned"),
        })
    }

    /// First numeric argument (length, precision, or display width).
    fn first_arg(&self) -> Option<u64> {
        self.args
            .as_deref()
            .and_then(|a| a.split(',').next())
            .and_then(|a| a.trim().parse().ok())
    }

    /// Precision and scale of `decimal(p,s)`.
    fn precision_scale(&self) -> Option<(u64, u64)> {
        let args = self.args.as_deref()?;
        let mut parts = args.split(',').map(|p| p.trim().parse::<u64>());
        let precision = parts.next()?.ok()?;
        let scale = match parts.next() {
            Some(s) => s.ok()?,
            None => 0,
        };
        Some((precision, scale))
    }
}

/// PostgreSQL's maximum declared length for char/varchar.
const PG_MAX_CHAR_LENGTH: u64 = 10_485_760;

/// Map a MySQL type to PostgreSQL.
///
/// `auto_increment` selects the serial family. Unsigned integers are widened
/// to the next type that holds their full range.
pub fn map_type(source: &MySqlType, auto_increment: bool) -> TypeMapping {
    let base = source.base.as_str();

    if auto_increment {
        if let Some(mapping) = map_serial(source) {
            return mapping;
        }
    }

    match base {
        // Dumped values of boolean-like columns are integer literals
        "tinyint" | "bool" | "boolean" => TypeMapping::lossless("smallint"),

        "smallint" if source.unsigned => TypeMapping::lossless("integer"),
        "smallint" => TypeMapping::lossless("smallint"),
        "mediumint" => TypeMapping::lossless("integer"),
        "int" | "integer" if source.unsigned => TypeMapping::lossless("bigint"),
        "int" | "integer" => TypeMapping::lossless("integer"),
        "bigint" if source.unsigned => TypeMapping::lossless("numeric(20,0)"),
        "bigint" => TypeMapping::lossless("bigint"),

        "decimal" | "numeric" | "dec" | "fixed" => match source.precision_scale() {
            Some((precision, scale)) => {
                TypeMapping::lossless(format!("numeric({},{})", precision, scale))
            }
            None => TypeMapping::lossless("numeric"),
        },

        // FLOAT(p) with p > 24 is a double in MySQL
        "float" => match (source.first_arg(), source.precision_scale()) {
            (Some(p), Some((_, 0))) if p > 24 => TypeMapping::lossless("double precision"),
            _ => TypeMapping::lossless("real"),
        },
        "double" | "double precision" | "real" => TypeMapping::lossless("double precision"),

        "char" | "nchar" | "national char" => match source.first_arg() {
            Some(len) if len > 0 && len <= PG_MAX_CHAR_LENGTH => {
                TypeMapping::lossless(format!("char({})", len))
            }
            Some(_) => TypeMapping::lossless("text"),
            None => TypeMapping::lossless("char(1)"),
        },
        "varchar" | "nvarchar" | "national varchar" | "character varying" => {
            match source.first_arg() {
                Some(len) if len > 0 && len <= PG_MAX_CHAR_LENGTH => {
                    TypeMapping::lossless(format!("varchar({})", len))
                }
                _ => TypeMapping::lossless("text"),
            }
        }
        "tinytext" | "text" | "mediumtext" | "longtext" => TypeMapping::lossless("text"),

        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
            TypeMapping::lossless("bytea")
        }

        "date" => TypeMapping::lossless("date"),
        "time" => TypeMapping::lossless(with_fsp("time", source)),
        "datetime" | "timestamp" => TypeMapping::lossless(with_fsp("timestamp", source)),
        "year" => TypeMapping::lossless("smallint"),

        "json" => TypeMapping::lossless("jsonb"),

        "enum" => TypeMapping::lossy(
            "text",
            "MySQL ENUM stored as text. Consider creating a CHECK constraint or PostgreSQL ENUM.",
        ),
        "set" => TypeMapping::lossy(
            "text",
            "MySQL SET stored as text. Consider using an array type or separate table.",
        ),

        // Varying, so the short b'1' literals dumped for wider columns still fit
        "bit" => TypeMapping::lossless(format!(
            "bit varying({})",
            source.first_arg().unwrap_or(1).clamp(1, 64)
        )),

        "geometry" | "point" | "linestring" | "polygon" | "multipoint" | "multilinestring"
        | "multipolygon" | "geometrycollection" => TypeMapping::lossy(
            "text",
            format!(
                "MySQL spatial type '{}' stored as text. Consider PostGIS for spatial operations.",
                base
            ),
        ),

        _ => TypeMapping::lossy(
            "text",
            format!("Unknown MySQL type '{}' stored as text.", base),
        ),
    }
}

fn map_serial(source: &MySqlType) -> Option<TypeMapping> {
    let mapping = match (source.base.as_str(), source.unsigned) {
        ("tinyint", _) | ("smallint", false) => TypeMapping::lossless("smallserial"),
        ("smallint", true) | ("mediumint", _) | ("int" | "integer", false) => {
            TypeMapping::lossless("serial")
        }
        ("int" | "integer", true) => TypeMapping::lossless("bigserial"),
        ("bigint", false) => TypeMapping::lossless("bigserial"),
        ("bigint", true) => TypeMapping::lossy(
            "bigserial",
            "BIGINT UNSIGNED AUTO_INCREMENT mapped to bigserial; values above 2^63-1 do not fit.",
        ),
        _ => return None,
    };
    Some(mapping)
}

fn with_fsp(name: &str, source: &MySqlType) -> String {
    match source.first_arg() {
        Some(fsp) if fsp > 0 => format!("{}({})", name, fsp.min(6)),
        _ => name.to_string(),
    }
}

/// Convenience wrapper: parse and map a rendered type.
pub fn map_type_text(raw: &str, auto_increment: bool) -> TypeMapping {
    match MySqlType::parse(raw) {
        Some(parsed) => map_type(&parsed, auto_increment),
        None => TypeMapping::lossy(
            "text",
            format!("Unparseable MySQL type '{}' stored as text.", raw.trim()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(raw: &str) -> String {
        map_type_text(raw, false).target_type
    }

    #[test]
    fn test_parse_type_parts() {
        let parsed = MySqlType::parse("INT(10) UNSIGNED ZEROFILL").unwrap();
        assert_eq!(parsed.base, "int");
        assert_eq!(parsed.args.as_deref(), Some("10"));
        assert!(parsed.unsigned);

        let parsed = MySqlType::parse("double  precision").unwrap();
        assert_eq!(parsed.base, "double precision");
        assert!(parsed.args.is_none());
    }

    #[test]
    fn test_integer_types() {
        assert_eq!(target("tinyint(1)"), "smallint");
        assert_eq!(target("SMALLINT(6)"), "smallint");
        assert_eq!(target("mediumint(9)"), "integer");
        assert_eq!(target("int(11)"), "integer");
        assert_eq!(target("bigint(20)"), "bigint");
    }

    #[test]
    fn test_unsigned_widening() {
        assert_eq!(target("smallint(5) unsigned"), "integer");
        assert_eq!(target("INT(10) UNSIGNED"), "bigint");
        assert_eq!(target("bigint(20) unsigned"), "numeric(20,0)");
    }

    #[test]
    fn test_auto_increment_serials() {
        assert_eq!(map_type_text("smallint", true).target_type, "smallserial");
        assert_eq!(map_type_text("int(11)", true).target_type, "serial");
        assert_eq!(map_type_text("int(10) unsigned", true).target_type, "bigserial");
        assert_eq!(map_type_text("bigint(20)", true).target_type, "bigserial");
        assert!(map_type_text("bigint(20) unsigned", true).is_lossy);
    }

    #[test]
    fn test_string_and_binary_types() {
        assert_eq!(target("varchar(255)"), "varchar(255)");
        assert_eq!(target("char(36)"), "char(36)");
        assert_eq!(target("LONGTEXT"), "text");
        assert_eq!(target("mediumblob"), "bytea");
        assert_eq!(target("varbinary(16)"), "bytea");
    }

    #[test]
    fn test_numeric_and_temporal_types() {
        assert_eq!(target("decimal(12,2)"), "numeric(12,2)");
        assert_eq!(target("decimal"), "numeric");
        assert_eq!(target("float"), "real");
        assert_eq!(target("double"), "double precision");
        assert_eq!(target("datetime"), "timestamp");
        assert_eq!(target("DATETIME(6)"), "timestamp(6)");
        assert_eq!(target("year(4)"), "smallint");
        assert_eq!(target("json"), "jsonb");
    }

    #[test]
    fn test_bit_keeps_bit_string_semantics() {
        assert_eq!(target("bit(1)"), "bit varying(1)");
        assert_eq!(target("BIT"), "bit varying(1)");
        assert_eq!(target("bit(12)"), "bit varying(12)");
    }

    #[test]
    fn test_lossy_types_warn() {
        let mapping = map_type_text("enum('a','b')", false);
        assert_eq!(mapping.target_type, "text");
        assert!(mapping.is_lossy);
        assert!(mapping.warning.unwrap().contains("ENUM"));

        let mapping = map_type_text("point", false);
        assert!(mapping.warning.unwrap().contains("spatial"));

        assert!(map_type_text("whatever", false).is_lossy);
    }
}
