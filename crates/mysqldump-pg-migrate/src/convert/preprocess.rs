//! Removal of MySQL-only constructs before conversion.
//!
//! Rules run in order over the code runs of the raw statement; row data in
//! string literals is never touched.

use once_cell::sync::Lazy;
use regex::Regex;

use super::text;

/// Ordered (pattern, replacement) rules.
static RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // Versioned directives: /*!40101 ... */ and /*!50100 PARTITION BY ... */
        (Regex::new(r"(?s)/\*![0-9]*.*?\*/").unwrap(), ""),
        // Table locks
        (
            Regex::new(r"(?im)^\s*(?:UN)?LOCK\s+TABLES\b[^;]*;?").unwrap(),
            "",
        ),
        // Session variable assignments
        (
            Regex::new(r"(?im)^\s*SET\s+(?:@@?\w|SESSION\s|GLOBAL\s|NAMES\s|CHARACTER\s+SET\s)[^;]*;?")
                .unwrap(),
            "",
        ),
        // Index toggles around bulk inserts
        (
            Regex::new(r"(?i)ALTER\s+TABLE\s+\S+\s+(?:DISABLE|ENABLE)\s+KEYS\s*;?").unwrap(),
            "",
        ),
    ]
});

/// Strip MySQL-only constructs and surrounding whitespace.
pub fn preprocess(statement: &str) -> String {
    let stripped = text::map_code_mysql(statement, |code| {
        RULES
            .iter()
            .fold(code.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, *replacement).into_owned()
            })
    });
    stripped.trim().to_string()
}
