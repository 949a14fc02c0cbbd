//! Regex fallback conversion strategy.
//!
//! Used when the tree parser rejects a statement. Rewrites are applied as
//! ordered pattern rules over the statement text. The result is best-effort,
//! and the converter always flags it with a warning.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{text, typemap, ConversionStrategy, StatementKind};
use crate::core::identifier::TargetSchema;

/// Ordered pattern rewrites.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexStrategy;

impl ConversionStrategy for RegexStrategy {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn rewrite(
        &self,
        statement: &str,
        _target: &TargetSchema,
        warnings: &mut Vec<String>,
    ) -> Result<String, String> {
        // Literals are standard SQL from here on
        let sql = text::normalize_mysql_literals(statement);
        let sql = text::requote_backticks(&sql);

        match StatementKind::detect(&sql) {
            StatementKind::CreateTable => rewrite_create_table(&sql, warnings),
            StatementKind::Insert => Ok(text::map_code(&sql, |code| {
                HEX_LITERAL.replace_all(code, r"'\x$1'").into_owned()
            })),
            _ => Ok(sql),
        }
    }
}

static HEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b0x([0-9A-Fa-f]+)\b").unwrap());

static COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)^("(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*)\s+([a-z]+(?:\s+(?:precision|varying))?)(\s*\([^)]*\))?((?:\s+(?:unsigned|signed|zerofill)\b)*)(.*)$"#,
    )
    .unwrap()
});

static AUTO_INCREMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\b").unwrap());

/// Column-attribute rules, applied in order to the text after the type.
static COLUMN_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\s*\bAUTO_INCREMENT\b").unwrap(), ""),
        (Regex::new(r"(?i)\s*\b(?:UNSIGNED|ZEROFILL)\b").unwrap(), ""),
        (
            Regex::new(r"(?i)\s*\b(?:CHARACTER\s+SET|CHARSET)\s+\w+").unwrap(),
            "",
        ),
        (Regex::new(r"(?i)\s*\bCOLLATE\s+\w+").unwrap(), ""),
        (Regex::new(r"(?i)\s*\bCOMMENT\s+'(?:[^']|'')*'").unwrap(), ""),
        (
            Regex::new(r"(?i)\s*\bON\s+UPDATE\s+CURRENT_TIMESTAMP(?:\(\d*\))?").unwrap(),
            "",
        ),
        // Column-level uniqueness is an index in disguise
        (Regex::new(r"(?i)\s*\bUNIQUE(?:\s+KEY)?\b").unwrap(), ""),
        (
            Regex::new(r#"(?i)\s*\bREFERENCES\s+\S+\s*\([^)]*\)(?:\s+ON\s+(?:DELETE|UPDATE)\s+(?:RESTRICT|CASCADE|SET\s+NULL|NO\s+ACTION|SET\s+DEFAULT))*"#).unwrap(),
            "",
        ),
    ]
});

/// Definition items that are dropped outright.
static DROPPED_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(?:(?:UNIQUE|FULLTEXT|SPATIAL)\s+)?(?:KEY|INDEX)\b|^UNIQUE\b|\bFOREIGN\s+KEY\b")
        .unwrap()
});

static INDEX_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\bUSING\s+(?:BTREE|HASH)\b").unwrap());

/// Table options after the closing parenthesis.
static TABLE_OPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*\b(?:ENGINE|TYPE|(?:DEFAULT\s+)?CHARSET|(?:DEFAULT\s+)?CHARACTER\s+SET|(?:DEFAULT\s+)?COLLATE|AUTO_INCREMENT|ROW_FORMAT|KEY_BLOCK_SIZE|STATS_PERSISTENT|STATS_AUTO_RECALC|STATS_SAMPLE_PAGES|AVG_ROW_LENGTH|MAX_ROWS|MIN_ROWS|PACK_KEYS|CHECKSUM|DELAY_KEY_WRITE|COMPRESSION|COMMENT)\s*=?\s*(?:'(?:[^']|'')*'|\w+)",
    )
    .unwrap()
});

const CONSTRAINT_KEYWORDS: &[&str] = &[
    "PRIMARY", "KEY", "INDEX", "UNIQUE", "CONSTRAINT", "FOREIGN", "CHECK", "FULLTEXT", "SPATIAL",
];

fn rewrite_create_table(sql: &str, warnings: &mut Vec<String>) -> Result<String, String> {
    let open = text::first_open_paren(sql).ok_or("CREATE TABLE without column list")?;
    let close = text::matching_paren(sql, open).ok_or("unbalanced CREATE TABLE column list")?;

    let head = sql[..open].trim_end();
    let body = &sql[open + 1..close];
    let tail = TABLE_OPTION.replace_all(&sql[close + 1..], "");

    let mut items = Vec::new();
    for item in text::split_top_level(body) {
        let item = item.trim();
        if item.is_empty() || DROPPED_ITEM.is_match(item) {
            continue;
        }
        let item = INDEX_METHOD.replace_all(item, "");
        items.push(rewrite_column(&item, warnings));
    }

    Ok(format!(
        "{} (\n  {}\n){}",
        head,
        items.join(",\n  "),
        tail.trim_end()
    ))
}

/// Map one definition item; non-column items pass through.
fn rewrite_column(item: &str, warnings: &mut Vec<String>) -> String {
    let first_word = item
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    if CONSTRAINT_KEYWORDS.contains(&first_word.as_str()) {
        return item.to_string();
    }

    COLUMN
        .replace(item, |caps: &Captures| {
            let name = &caps[1];
            let raw_type = format!(
                "{}{}{}",
                &caps[2],
                caps.get(3).map_or("", |m| m.as_str()),
                caps.get(4).map_or("", |m| m.as_str())
            );
            let rest = &caps[5];
            let mapping = typemap::map_type_text(&raw_type, AUTO_INCREMENT.is_match(rest));
            if let Some(warning) = &mapping.warning {
                warnings.push(format!("{}: {}", name.trim_matches('"'), warning));
            }
            let rest = COLUMN_RULES
                .iter()
                .fold(rest.to_string(), |acc, (re, replacement)| {
                    re.replace_all(&acc, *replacement).into_owned()
                });
            let rest = rest.trim();
            if rest.is_empty() {
                format!("{} {}", name, mapping.target_type)
            } else {
                format!("{} {} {}", name, mapping.target_type, rest)
            }
        })
        .into_owned()
}
