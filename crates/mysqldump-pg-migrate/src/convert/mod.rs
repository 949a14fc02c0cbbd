//! MySQL to PostgreSQL statement conversion.
//!
//! Each statement goes through four passes:
//!
//! 1. [`preprocess`]: strip MySQL-only directives, locks and session settings.
//! 2. [`TreeStrategy`]: parse with sqlparser and rewrite the syntax tree.
//! 3. [`RegexStrategy`]: ordered pattern rules, used only when the tree
//!    strategy fails. Its use is always reported in
//!    [`ConversionResult::warnings`].
//! 4. [`postprocess`]: final rewrites that hold for either strategy. Foreign
//!    keys are stripped and every target table reference is qualified.
//!
//! ```rust
//! use mysqldump_pg_migrate::convert::Converter;
//! use mysqldump_pg_migrate::core::identifier::TargetSchema;
//!
//! let target = TargetSchema::new(Some("legacy"), "finance").unwrap();
//! let result = Converter::default().convert("INSERT INTO `invoice` VALUES (1,10);", &target);
//! assert!(result.success);
//! assert!(result.converted.starts_with(r#"INSERT INTO legacy."finance"."invoice""#));
//! ```

pub mod ast;
pub mod fallback;
pub mod postprocess;
pub mod preprocess;
pub mod text;
pub mod typemap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::identifier::TargetSchema;

pub use ast::TreeStrategy;
pub use fallback::RegexStrategy;
pub use typemap::{map_type, map_type_text, MySqlType, TypeMapping};

/// One way of rewriting a preprocessed statement for the target.
///
/// Strategies report failure as a message; the [`Converter`] decides what a
/// failure means.
pub trait ConversionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Rewrite `statement`, appending lossy-conversion notes to `warnings`.
    fn rewrite(
        &self,
        statement: &str,
        target: &TargetSchema,
        warnings: &mut Vec<String>,
    ) -> std::result::Result<String, String>;
}

/// Statement kinds the converter treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    DropTable,
    Insert,
    Delete,
    Other,
}

impl StatementKind {
    /// Classify by leading keywords, ignoring case and leading whitespace.
    pub fn detect(sql: &str) -> Self {
        let mut words = sql
            .split(|c: char| c.is_whitespace() || c == '(' || c == '`' || c == '"')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_ascii_uppercase());

        let first = words.next();
        let second = words.next();
        let third = words.next();

        match (first.as_deref(), second.as_deref(), third.as_deref()) {
            (Some("CREATE"), Some("TABLE"), _) => Self::CreateTable,
            (Some("CREATE"), Some("TEMPORARY"), Some("TABLE")) => Self::CreateTable,
            (Some("DROP"), Some("TABLE"), _) => Self::DropTable,
            (Some("DROP"), Some("TEMPORARY"), Some("TABLE")) => Self::DropTable,
            (Some("INSERT" | "REPLACE"), _, _) => Self::Insert,
            (Some("DELETE"), _, _) => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// Outcome of converting one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub success: bool,
    /// Target statement without a trailing terminator. Empty when the input
    /// held nothing to execute.
    pub converted: String,
    pub original: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Whether the regex fallback produced `converted`.
    pub used_fallback: bool,
}

impl ConversionResult {
    /// Whether there is a statement to execute.
    pub fn is_empty(&self) -> bool {
        self.converted.is_empty()
    }
}

/// Two-tier converter: an exact strategy with a best-effort fallback.
pub struct Converter {
    primary: Box<dyn ConversionStrategy>,
    fallback: Box<dyn ConversionStrategy>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Box::new(TreeStrategy), Box::new(RegexStrategy))
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl Converter {
    pub fn new(
        primary: Box<dyn ConversionStrategy>,
        fallback: Box<dyn ConversionStrategy>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Convert one MySQL statement for `target`.
    ///
    /// Never panics on malformed input. A statement neither strategy can
    /// handle yields `success == false` with the reasons in `errors`.
    pub fn convert(&self, statement: &str, target: &TargetSchema) -> ConversionResult {
        let mut result = ConversionResult {
            original: statement.to_string(),
            ..Default::default()
        };

        let prepared = preprocess::preprocess(statement);
        if prepared.trim_matches(|c: char| c.is_whitespace() || c == ';').is_empty() {
            result.success = true;
            return result;
        }

        let mut warnings = Vec::new();
        let rewritten = match self.primary.rewrite(&prepared, target, &mut warnings) {
            Ok(sql) => Some(sql),
            Err(primary_err) => {
                debug!(
                    "{} strategy rejected statement: {}",
                    self.primary.name(),
                    primary_err
                );
                warnings.clear();
                warnings.push(format!("used fallback conversion ({})", primary_err));
                result.used_fallback = true;

                match self.fallback.rewrite(&prepared, target, &mut warnings) {
                    Ok(sql) => Some(sql),
                    Err(fallback_err) => {
                        result.errors.push(format!(
                            "{} strategy failed: {}",
                            self.primary.name(),
                            primary_err
                        ));
                        result.errors.push(format!(
                            "{} strategy failed: {}",
                            self.fallback.name(),
                            fallback_err
                        ));
                        None
                    }
                }
            }
        };

        if let Some(sql) = rewritten {
            result.converted = postprocess::finish(&sql, target, &mut warnings);
            result.success = true;
        } else {
            warn!("Statement could not be converted: {}", result.errors.join("; "));
        }
        result.warnings = warnings;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetSchema {
        TargetSchema::new(Some("legacy"), "finance").unwrap()
    }

    const INVOICE: &str = "CREATE TABLE `invoice` (\n\
        \x20 `id` int NOT NULL AUTO_INCREMENT,\n\
        \x20 `amount` int(10) unsigned DEFAULT NULL,\n\
        \x20 PRIMARY KEY (`id`),\n\
        \x20 KEY `idx_amount` (`amount`)\n\
        ) ENGINE=InnoDB AUTO_INCREMENT=6 DEFAULT CHARSET=utf8mb4;";

    struct Refuse;

    impl ConversionStrategy for Refuse {
        fn name(&self) -> &'static str {
            "refuse"
        }

        fn rewrite(
            &self,
            _statement: &str,
            _target: &TargetSchema,
            _warnings: &mut Vec<String>,
        ) -> std::result::Result<String, String> {
            Err("unsupported".to_string())
        }
    }

    #[test]
    fn test_statement_kind_detect() {
        assert_eq!(StatementKind::detect("  create table t (a int)"), StatementKind::CreateTable);
        assert_eq!(
            StatementKind::detect("CREATE TEMPORARY TABLE t (a int)"),
            StatementKind::CreateTable
        );
        assert_eq!(StatementKind::detect("DROP TABLE IF EXISTS t"), StatementKind::DropTable);
        assert_eq!(StatementKind::detect("INSERT IGNORE INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(StatementKind::detect("delete from t"), StatementKind::Delete);
        assert_eq!(StatementKind::detect("CREATE VIEW v AS SELECT 1"), StatementKind::Other);
        assert_eq!(StatementKind::detect(""), StatementKind::Other);
    }

    #[test]
    fn test_invoice_definition() {
        let result = Converter::default().convert(INVOICE, &target());
        assert!(result.success, "{:?}", result.errors);
        assert!(!result.used_fallback);
        let sql = &result.converted;
        assert!(sql.starts_with("CREATE TABLE legacy.\"finance\".\"invoice\""));
        assert!(!sql.to_uppercase().contains("AUTO_INCREMENT"));
        assert!(!sql.to_uppercase().contains("UNSIGNED"));
        assert!(!sql.contains("idx_amount"));
        assert!(!sql.contains("ENGINE"));
        assert!(!sql.ends_with(';'));
    }

    #[test]
    fn test_fallback_is_flagged_as_warning() {
        let converter = Converter::new(Box::new(Refuse), Box::new(RegexStrategy));
        let result = converter.convert(INVOICE, &target());
        assert!(result.success);
        assert!(result.used_fallback);
        assert!(result.errors.is_empty());
        assert!(result.warnings[0].starts_with("used fallback conversion"));
        assert!(result
            .converted
            .starts_with("CREATE TABLE legacy.\"finance\".\"invoice\""));
        assert!(result.converted.contains("\"id\" serial NOT NULL"));
        assert!(result.converted.contains("\"amount\" bigint DEFAULT NULL"));
    }

    #[test]
    fn test_fallback_definition_is_well_formed() {
        let definition = "CREATE TABLE `event` (\n\
            \x20 `id` int NOT NULL AUTO_INCREMENT,\n\
            \x20 `ts` timestamp NULL DEFAULT NULL,\n\
            \x20 `kind` varchar(20) CHARACTER SET latin1 NOT NULL DEFAULT 'click',\n\
            \x20 `payload` longtext COMMENT 'raw body',\n\
            \x20 `price` decimal(10,2) unsigned DEFAULT '0.00',\n\
            \x20 PRIMARY KEY (`id`),\n\
            \x20 KEY `idx_ts` (`ts`)\n\
            ) ENGINE=InnoDB AUTO_INCREMENT=42 DEFAULT CHARSET=utf8mb4 ROW_FORMAT=DYNAMIC;";
        let converter = Converter::new(Box::new(Refuse), Box::new(RegexStrategy));
        let result = converter.convert(definition, &target());
        assert!(result.success, "{:?}", result.errors);
        assert!(result.used_fallback);

        let sql = &result.converted;
        assert!(sql.starts_with("CREATE TABLE legacy.\"finance\".\"event\" ("), "{}", sql);
        assert!(sql.contains("\"id\" serial NOT NULL,"), "{}", sql);
        assert!(sql.contains("\"ts\" timestamp NULL DEFAULT NULL,"), "{}", sql);
        assert!(sql.contains("\"kind\" varchar(20) NOT NULL DEFAULT 'click',"), "{}", sql);
        assert!(sql.contains("\"payload\" text,"), "{}", sql);
        assert!(sql.contains("PRIMARY KEY (\"id\")"), "{}", sql);
        for mysql_only in ["ENGINE", "AUTO_INCREMENT", "ROW_FORMAT", "COMMENT", "idx_ts", "latin1"] {
            assert!(!sql.contains(mysql_only), "{} left in {}", mysql_only, sql);
        }
    }

    #[test]
    fn test_bit_column_definition_is_executable() {
        let definition = "CREATE TABLE `flags` (\n\
            \x20 `id` int NOT NULL AUTO_INCREMENT,\n\
            \x20 `active` bit(1) NOT NULL DEFAULT b'0',\n\
            \x20 `ts` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,\n\
            \x20 PRIMARY KEY (`id`)\n\
            ) ENGINE=InnoDB;";
        let fallback_only = Converter::new(Box::new(Refuse), Box::new(RegexStrategy));
        for converter in [Converter::default(), fallback_only] {
            let result = converter.convert(definition, &target());
            assert!(result.success, "{:?}", result.errors);
            let sql = result.converted.to_lowercase();
            assert!(sql.contains("\"id\" serial not null"), "{}", sql);
            assert!(sql.contains("\"active\" bit varying(1) not null default b'0'"), "{}", sql);
            assert!(sql.contains("\"ts\" timestamp not null default current_timestamp"), "{}", sql);
        }
    }

    #[test]
    fn test_replace_loads_as_on_conflict_insert() {
        let statement = "REPLACE INTO `invoice` VALUES (1,'it\\'s',b'1'),(2,'b',b'0');";
        let fallback_only = Converter::new(Box::new(Refuse), Box::new(RegexStrategy));
        for converter in [Converter::default(), fallback_only] {
            let result = converter.convert(statement, &target());
            assert!(result.success, "{:?}", result.errors);
            let sql = &result.converted;
            assert!(
                sql.starts_with("INSERT INTO legacy.\"finance\".\"invoice\""),
                "{}",
                sql
            );
            assert!(sql.ends_with("ON CONFLICT DO NOTHING"), "{}", sql);
            assert!(sql.contains("'it''s'"), "{}", sql);
            assert!(!sql.to_uppercase().contains("REPLACE"), "{}", sql);
            assert!(result.warnings.iter().any(|w| w.starts_with("REPLACE INTO")));
        }
    }

    #[test]
    fn test_both_strategies_failing_is_an_error() {
        let converter = Converter::new(Box::new(Refuse), Box::new(Refuse));
        let result = converter.convert("INSERT INTO t VALUES (1)", &target());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 2);
        assert!(result.is_empty());
    }

    #[test]
    fn test_directive_only_statement_is_empty() {
        let result = Converter::default().convert("/*!40101 SET NAMES utf8mb4 */;", &target());
        assert!(result.success);
        assert!(result.is_empty());
    }

    #[test]
    fn test_targets_qualified_on_both_paths() {
        let statements = [
            "DROP TABLE IF EXISTS `invoice`;",
            "INSERT INTO `invoice` VALUES (1,'it\\'s'),(2,'b');",
            "DELETE FROM `invoice` WHERE `id` = 1;",
            INVOICE,
        ];
        let fallback_only = Converter::new(Box::new(Refuse), Box::new(RegexStrategy));
        for converter in [Converter::default(), fallback_only] {
            for statement in statements {
                let result = converter.convert(statement, &target());
                assert!(result.success, "{}: {:?}", statement, result.errors);
                assert!(
                    result.converted.contains("legacy.\"finance\".\"invoice\""),
                    "{}",
                    result.converted
                );
            }
        }
    }

    #[test]
    fn test_foreign_keys_never_survive() {
        let definition = "CREATE TABLE `payment` (\n\
            \x20 `id` int NOT NULL,\n\
            \x20 `invoice_id` int NOT NULL,\n\
            \x20 PRIMARY KEY (`id`),\n\
            \x20 CONSTRAINT `fk_payment_invoice` FOREIGN KEY (`invoice_id`) REFERENCES `invoice` (`id`) ON DELETE CASCADE\n\
            ) ENGINE=InnoDB;";
        let fallback_only = Converter::new(Box::new(Refuse), Box::new(RegexStrategy));
        for converter in [Converter::default(), fallback_only] {
            let result = converter.convert(definition, &target());
            assert!(result.success);
            assert!(!result.converted.contains("REFERENCES"));
            assert!(!result.converted.contains("FOREIGN KEY"));
        }
    }
}
