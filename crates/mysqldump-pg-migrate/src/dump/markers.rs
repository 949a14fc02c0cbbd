//! Line classification for mysqldump output.
//!
//! Every marker is anchored at the start of a line, which is how mysqldump
//! writes them. Lines inside a buffered statement are never classified except
//! for database boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

/// What a single dump line announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMarker {
    /// `-- Current Database: \`name\`` or `USE \`name\`;`
    DatabaseBoundary(String),
    /// `DROP TABLE [IF EXISTS] \`name\``
    DropTable(String),
    /// `CREATE TABLE [IF NOT EXISTS] \`name\``
    CreateTable(String),
    /// `INSERT [IGNORE] INTO \`name\`` or `REPLACE INTO \`name\``
    Insert(String),
    /// Anything else.
    Other,
}

// Backtick-quoted names may contain spaces; bare names stop at the first delimiter.
const NAME: &str = r"(?:`((?:[^`]|``)+)`|([A-Za-z0-9_$]+))";

static CURRENT_DATABASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--\s*Current Database:\s*{}", NAME)).unwrap());

static USE_DATABASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^USE\s+{}\s*;", NAME)).unwrap());

static DROP_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?{}", NAME)).unwrap()
});

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^CREATE\s+(?:TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{}",
        NAME
    ))
    .unwrap()
});

static INSERT_INTO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^INSERT\s+(?:(?:LOW_PRIORITY|DELAYED|HIGH_PRIORITY)\s+)?(?:IGNORE\s+)?INTO\s+{}",
        NAME
    ))
    .unwrap()
});

// mysqldump --replace
static REPLACE_INTO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^REPLACE\s+(?:(?:LOW_PRIORITY|DELAYED)\s+)?INTO\s+{}",
        NAME
    ))
    .unwrap()
});

fn captured_name(re: &Regex, line: &str) -> Option<String> {
    let caps = re.captures(line)?;
    caps.get(1)
        .map(|m| m.as_str().replace("``", "`"))
        .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
}

/// Return the database named by a boundary marker, if `line` is one.
pub fn database_boundary(line: &str) -> Option<String> {
    if line.starts_with("--") {
        captured_name(&CURRENT_DATABASE, line)
    } else {
        captured_name(&USE_DATABASE, line)
    }
}

/// Classify one dump line.
pub fn classify(line: &str) -> LineMarker {
    // Cheap first-byte dispatch; most lines in a dump are data
    match line.as_bytes().first().map(u8::to_ascii_uppercase) {
        Some(b'-') | Some(b'U') => match database_boundary(line) {
            Some(name) => LineMarker::DatabaseBoundary(name),
            None => LineMarker::Other,
        },
        Some(b'D') => captured_name(&DROP_TABLE, line)
            .map(LineMarker::DropTable)
            .unwrap_or(LineMarker::Other),
        Some(b'C') => captured_name(&CREATE_TABLE, line)
            .map(LineMarker::CreateTable)
            .unwrap_or(LineMarker::Other),
        Some(b'I') => captured_name(&INSERT_INTO, line)
            .map(LineMarker::Insert)
            .unwrap_or(LineMarker::Other),
        Some(b'R') => captured_name(&REPLACE_INTO, line)
            .map(LineMarker::Insert)
            .unwrap_or(LineMarker::Other),
        _ => LineMarker::Other,
    }
}

/// True if `line` closes a buffered table definition.
///
/// mysqldump ends a definition with an unindented `) ENGINE=...;` line.
/// Partitioned tables end with a versioned comment instead (`... */;`).
pub fn is_definition_end(line: &str) -> bool {
    if line.starts_with(char::is_whitespace) {
        return false;
    }
    let trimmed = line.trim_end();
    trimmed.ends_with(';') && (trimmed.starts_with(')') || trimmed.ends_with("*/;"))
}

/// True if a `CREATE TABLE` line is also its own last line.
///
/// That is the case when it ends in `;` with every parenthesis closed, which
/// also covers `CREATE TABLE a LIKE b;`.
pub fn is_single_line_definition(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.ends_with(';') && closes_everything(trimmed)
}

/// No open literal, quoted name or parenthesis at the end of `line`.
fn closes_everything(line: &str) -> bool {
    let mut depth = 0i32;
    let mut in_literal = false;
    let mut in_name = false;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_literal => escaped = true,
            '\'' if !in_name => in_literal = !in_literal,
            '`' if !in_literal => in_name = !in_name,
            '(' if !in_literal && !in_name => depth += 1,
            ')' if !in_literal && !in_name => depth -= 1,
            _ => {}
        }
    }
    depth == 0 && !in_literal && !in_name
}

/// Advance the string-literal state across `line`.
///
/// Returns whether the line ends inside a single-quoted literal, given whether
/// it started inside one. Backslash escapes follow MySQL rules.
pub fn literal_state_after(line: &str, mut in_literal: bool) -> bool {
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_literal => escaped = true,
            '\'' => in_literal = !in_literal,
            _ => {}
        }
    }
    in_literal
}

/// Number of value tuples in a data statement (separator count + 1).
pub fn estimate_rows(statement: &str) -> u64 {
    statement.matches("),(").count() as u64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_boundaries() {
        assert_eq!(
            classify("-- Current Database: `finance`"),
            LineMarker::DatabaseBoundary("finance".into())
        );
        assert_eq!(
            classify("USE `crm`;"),
            LineMarker::DatabaseBoundary("crm".into())
        );
        assert_eq!(classify("use sales;"), LineMarker::DatabaseBoundary("sales".into()));
        assert_eq!(classify("-- Dumping data for table `x`"), LineMarker::Other);
    }

    #[test]
    fn test_table_markers() {
        assert_eq!(
            classify("DROP TABLE IF EXISTS `invoice`;"),
            LineMarker::DropTable("invoice".into())
        );
        assert_eq!(
            classify("CREATE TABLE `order items` ("),
            LineMarker::CreateTable("order items".into())
        );
        assert_eq!(
            classify("INSERT INTO `invoice` VALUES (1,2),(3,4);"),
            LineMarker::Insert("invoice".into())
        );
        assert_eq!(
            classify("INSERT IGNORE INTO invoice VALUES (1);"),
            LineMarker::Insert("invoice".into())
        );
        assert_eq!(
            classify("REPLACE INTO `invoice` VALUES (1,2);"),
            LineMarker::Insert("invoice".into())
        );
        assert_eq!(classify("REPLACE(`a`, 'x', 'y')"), LineMarker::Other);
        assert_eq!(classify("  `id` int NOT NULL,"), LineMarker::Other);
        assert_eq!(classify("CREATE DATABASE /*!32312 IF NOT EXISTS*/ `x`;"), LineMarker::Other);
    }

    #[test]
    fn test_definition_end() {
        assert!(is_definition_end(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
        assert!(is_definition_end(");"));
        assert!(is_definition_end("(PARTITION p0 VALUES LESS THAN (2020) ENGINE = InnoDB) */;"));
        assert!(!is_definition_end("  ) ENGINE=InnoDB;"));
        assert!(!is_definition_end("  KEY `idx` (`a`),"));
    }

    #[test]
    fn test_single_line_definitions() {
        assert!(is_single_line_definition("CREATE TABLE `a` (x int);"));
        assert!(is_single_line_definition("CREATE TABLE `a` LIKE `b`;"));
        assert!(is_single_line_definition("CREATE TABLE `a` (c char(1) DEFAULT ')');"));
        assert!(!is_single_line_definition("CREATE TABLE `a` ("));
        assert!(!is_single_line_definition("CREATE TABLE `a` (c char(1) DEFAULT ';"));
        assert!(!is_single_line_definition("CREATE TABLE `a;` ("));
    }

    #[test]
    fn test_literal_state() {
        assert!(!literal_state_after("INSERT INTO t VALUES ('a;b');", false));
        assert!(literal_state_after("INSERT INTO t VALUES ('line one", false));
        assert!(!literal_state_after("still it\\'s text');", true));
        assert!(!literal_state_after("('it''s')", false));
    }

    #[test]
    fn test_estimate_rows() {
        assert_eq!(estimate_rows("INSERT INTO `t` VALUES (1),(2),(3);"), 3);
        assert_eq!(estimate_rows("INSERT INTO `t` VALUES (1);"), 1);
    }
}
