//! Final rewrites applied after either conversion strategy.
//!
//! These rules are the safety net: whatever the strategy produced, the output
//! leaves here with target quoting, no MySQL table options or foreign keys,
//! and every target table reference qualified with the target schema.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{text, StatementKind};
use crate::core::identifier::TargetSchema;

/// Charset introducers written directly before a literal, e.g. `_utf8mb4'x'`.
const INTRODUCERS: &[&str] = &[
    "_utf8mb4", "_utf8mb3", "_utf8", "_latin1", "_binary", "_ascii", "_ucs2", "_utf16", "_utf32",
];

static COLUMN_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+(?:CHARACTER\s+SET|CHARSET)\s+(?:"[^"]+"|\w+)|\s+COLLATE\s+(?:"[^"]+"|\w+)"#)
        .unwrap()
});

static INLINE_REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+REFERENCES\s+(?:"(?:[^"]|"")*"|[\w.]+)(?:\s*\.\s*(?:"(?:[^"]|"")*"|\w+))*\s*\([^)]*\)(?:\s+ON\s+(?:DELETE|UPDATE)\s+(?:RESTRICT|CASCADE|SET\s+NULL|NO\s+ACTION|SET\s+DEFAULT))*"#)
        .unwrap()
});

static FOREIGN_KEY_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bFOREIGN\s+KEY\b").unwrap());

/// `INSERT IGNORE INTO` and `REPLACE INTO`, the verbs that tolerate duplicate keys.
static TOLERANT_INSERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\s*)(INSERT\s+IGNORE|REPLACE(?:\s+(?:LOW_PRIORITY|DELAYED))?)(\s+INTO\b)").unwrap()
});

/// Statement prefixes whose following object name is a target table.
static TARGET_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:CREATE\s+(?:TEMPORARY\s+)?TABLE(?:\s+IF\s+NOT\s+EXISTS)?|DROP\s+TABLE(?:\s+IF\s+EXISTS)?|INSERT\s+INTO|DELETE\s+FROM|TRUNCATE(?:\s+TABLE)?)\s+",
    )
    .unwrap()
});

const ZERO_DATES: &[&str] = &["'0000-00-00'", "'0000-00-00 00:00:00'"];

/// Apply every final rule and drop the trailing terminator.
pub fn finish(statement: &str, target: &TargetSchema, warnings: &mut Vec<String>) -> String {
    let kind = StatementKind::detect(statement);
    let mut sql = text::requote_backticks(statement);

    if sql.contains('\0') {
        sql = sql.replace('\0', "");
    }
    sql = literal_rules(&sql, warnings);

    if kind == StatementKind::CreateTable {
        sql = finish_create_table(&sql);
    }
    if kind == StatementKind::Insert {
        if let Some(rewritten) = on_conflict(&sql, warnings) {
            sql = rewritten;
        }
    }

    sql = qualify_targets(&sql, kind, target);

    let trimmed = sql.trim_end();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim().to_string()
}

/// Rules that look at a literal together with the code right before it.
fn literal_rules(sql: &str, warnings: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut zero_dates = 0usize;

    for segment in text::segments(sql) {
        match segment {
            text::Segment::Code(code) => out.push_str(code),
            text::Segment::Literal(lit) => {
                strip_introducer(&mut out);
                if ZERO_DATES.contains(&lit) {
                    zero_dates += 1;
                    out.push_str("NULL");
                } else if strip_hex_prefix(&mut out) {
                    out.push_str("'\\x");
                    out.push_str(&lit[1..]);
                } else {
                    out.push_str(lit);
                }
            }
        }
    }

    if zero_dates > 0 {
        warnings.push(format!(
            "{} zero date literal(s) replaced with NULL",
            zero_dates
        ));
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Drop a charset introducer ending `out`; only the tail is inspected.
fn strip_introducer(out: &mut String) -> bool {
    let head_len = out.trim_end().len();
    for name in INTRODUCERS {
        let Some(start) = head_len.checked_sub(name.len()) else {
            continue;
        };
        if !out.is_char_boundary(start) || !out[start..head_len].eq_ignore_ascii_case(name) {
            continue;
        }
        if out[..start].chars().next_back().map_or(true, |c| !is_ident_char(c)) {
            out.truncate(start);
            return true;
        }
    }
    false
}

/// Drop the `X` of an `X'..'` hex literal ending `out`.
fn strip_hex_prefix(out: &mut String) -> bool {
    if !(out.ends_with('x') || out.ends_with('X')) {
        return false;
    }
    let start = out.len() - 1;
    if out[..start].chars().next_back().map_or(true, |c| !is_ident_char(c)) {
        out.truncate(start);
        return true;
    }
    false
}

fn finish_create_table(sql: &str) -> String {
    let Some(open) = text::first_open_paren(sql) else {
        return sql.to_string();
    };
    let Some(close) = text::matching_paren(sql, open) else {
        return sql.to_string();
    };

    let head = &sql[..open];
    let body = &sql[open + 1..close];

    // Foreign keys must never reach the warehouse in the first pass
    let items: Vec<String> = text::split_top_level(body)
        .into_iter()
        .filter(|item| {
            let code: String = text::segments(item)
                .into_iter()
                .filter_map(|s| match s {
                    text::Segment::Code(c) => Some(c),
                    text::Segment::Literal(_) => None,
                })
                .collect();
            !FOREIGN_KEY_ITEM.is_match(&code)
        })
        .map(|item| {
            text::map_code(item, |code| {
                let code = COLUMN_CHARSET.replace_all(code, "");
                INLINE_REFERENCES.replace_all(&code, "").into_owned()
            })
        })
        .collect();

    format!("{}({})", head, items.join(","))
}

/// Rewrite a duplicate-tolerant insert as `INSERT ... ON CONFLICT DO NOTHING`.
///
/// For `REPLACE` the first row wins instead of the last one, which only
/// differs when the dump itself repeats a key.
fn on_conflict(sql: &str, warnings: &mut Vec<String>) -> Option<String> {
    let caps = TOLERANT_INSERT.captures(sql)?;
    if caps[2].to_ascii_uppercase().starts_with("REPLACE") {
        warnings.push("REPLACE INTO loaded as INSERT ... ON CONFLICT DO NOTHING".to_string());
    }
    let rewritten = TOLERANT_INSERT.replace(sql, "${1}INSERT$3");
    let body = rewritten.trim_end();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    Some(format!("{} ON CONFLICT DO NOTHING", body))
}

/// Qualify the target table(s) named right after the statement prefix.
fn qualify_targets(sql: &str, kind: StatementKind, target: &TargetSchema) -> String {
    let Some(prefix) = TARGET_PREFIX.find(sql) else {
        return sql.to_string();
    };

    let mut out = String::with_capacity(sql.len() + 32);
    out.push_str(&sql[..prefix.end()]);
    let mut rest = &sql[prefix.end()..];

    loop {
        let Some((parts, consumed)) = parse_object_name(rest) else {
            break;
        };
        let table = parts.last().cloned().unwrap_or_default();
        out.push_str(&target.qualify(&table));
        rest = &rest[consumed..];

        // DROP TABLE a, b
        let after = rest.trim_start();
        if kind == StatementKind::DropTable && after.starts_with(',') {
            let skipped = rest.len() - after.len() + 1;
            out.push_str(", ");
            rest = rest[skipped..].trim_start();
            continue;
        }
        break;
    }

    out.push_str(rest);
    out
}

/// Parse a possibly dotted, possibly quoted object name at the start of `s`.
///
/// Returns the unquoted parts and the number of bytes consumed.
fn parse_object_name(s: &str) -> Option<(Vec<String>, usize)> {
    let mut parts = Vec::new();
    let mut pos = 0;
    let bytes = s.as_bytes();

    loop {
        let (part, len) = parse_identifier(&s[pos..])?;
        parts.push(part);
        pos += len;

        let mut look = pos;
        while look < bytes.len() && bytes[look].is_ascii_whitespace() {
            look += 1;
        }
        if bytes.get(look) == Some(&b'.') {
            look += 1;
            while look < bytes.len() && bytes[look].is_ascii_whitespace() {
                look += 1;
            }
            pos = look;
        } else {
            break;
        }
    }
    Some((parts, pos))
}

fn parse_identifier(s: &str) -> Option<(String, usize)> {
    let mut chars = s.char_indices().peekable();
    match chars.peek() {
        Some((_, '"')) => {
            chars.next();
            let mut value = String::new();
            while let Some((i, c)) = chars.next() {
                if c == '"' {
                    if matches!(chars.peek(), Some((_, '"'))) {
                        chars.next();
                        value.push('"');
                    } else {
                        return Some((value, i + 1));
                    }
                } else {
                    value.push(c);
                }
            }
            None
        }
        Some((_, c)) if c.is_alphanumeric() || *c == '_' => {
            let end = s
                .char_indices()
                .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
                .map_or(s.len(), |(i, _)| i);
            Some((s[..end].to_string(), end))
        }
        _ => None,
    }
}
