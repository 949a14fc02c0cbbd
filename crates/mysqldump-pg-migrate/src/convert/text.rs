//! Quote-aware text helpers shared by the conversion passes.
//!
//! Regex rules must never touch the inside of string literals, which carry
//! row data. [`segments`] splits a statement written with standard SQL quoting
//! (`''` escapes) into code and literal runs so rules can be applied to code
//! only. Identifiers (backtick or double-quoted) stay inside code runs.

/// One run of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Keywords, identifiers, punctuation.
    Code(&'a str),
    /// A single-quoted literal, quotes included.
    Literal(&'a str),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Literal,
    Backtick,
    DoubleQuote,
}

/// Split `sql` into code and literal runs.
pub fn segments(sql: &str) -> Vec<Segment<'_>> {
    split(sql, false)
}

/// Like [`segments`], for raw MySQL text where `\'` does not end a literal.
pub fn segments_mysql(sql: &str) -> Vec<Segment<'_>> {
    split(sql, true)
}

fn split(sql: &str, backslash_escapes: bool) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut state = Scan::Code;
    let mut start = 0;
    let mut i = 0;

    // All delimiters are ASCII, so byte indexing stays on char boundaries
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            Scan::Code => match b {
                b'\'' => {
                    if start < i {
                        out.push(Segment::Code(&sql[start..i]));
                    }
                    start = i;
                    state = Scan::Literal;
                }
                b'`' => state = Scan::Backtick,
                b'"' => state = Scan::DoubleQuote,
                _ => {}
            },
            Scan::Literal => {
                if backslash_escapes && b == b'\\' {
                    i += 1;
                } else if b == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 1;
                    } else {
                        out.push(Segment::Literal(&sql[start..=i]));
                        start = i + 1;
                        state = Scan::Code;
                    }
                }
            }
            Scan::Backtick | Scan::DoubleQuote => {
                let close = if state == Scan::Backtick { b'`' } else { b'"' };
                if b == close {
                    if bytes.get(i + 1) == Some(&close) {
                        i += 1;
                    } else {
                        state = Scan::Code;
                    }
                }
            }
        }
        i += 1;
    }

    if start < sql.len() {
        let rest = &sql[start..];
        out.push(if state == Scan::Literal {
            Segment::Literal(rest)
        } else {
            Segment::Code(rest)
        });
    }
    out
}

/// Rebuild `sql`, passing every code run through `f`.
pub fn map_code<F>(sql: &str, f: F) -> String
where
    F: FnMut(&str) -> String,
{
    rebuild(segments(sql), sql.len(), f)
}

/// [`map_code`] for raw MySQL text.
pub fn map_code_mysql<F>(sql: &str, f: F) -> String
where
    F: FnMut(&str) -> String,
{
    rebuild(segments_mysql(sql), sql.len(), f)
}

fn rebuild<F>(parts: Vec<Segment<'_>>, capacity: usize, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(capacity);
    for segment in parts {
        match segment {
            Segment::Code(code) => out.push_str(&f(code)),
            Segment::Literal(lit) => out.push_str(lit),
        }
    }
    out
}

/// Convert backtick-quoted identifiers to double-quoted ones.
pub fn requote_backticks(sql: &str) -> String {
    if !sql.contains('`') {
        return sql.to_string();
    }
    map_code(sql, |code| {
        let mut out = String::with_capacity(code.len());
        let mut chars = code.chars().peekable();
        let mut in_backtick = false;
        let mut in_double = false;
        while let Some(c) = chars.next() {
            match c {
                '`' if !in_double => {
                    if in_backtick && chars.peek() == Some(&'`') {
                        chars.next();
                        out.push('`');
                    } else {
                        in_backtick = !in_backtick;
                        out.push('"');
                    }
                }
                '"' if in_backtick => out.push_str("\"\""),
                '"' => {
                    in_double = !in_double;
                    out.push('"');
                }
                _ => out.push(c),
            }
        }
        out
    })
}

/// Rewrite MySQL string literals (backslash escapes) as standard SQL literals.
///
/// `\'` becomes `''`, `\\` a single backslash, and `\n`, `\r`, `\t`, `\Z`
/// their control characters. `\0` is dropped since PostgreSQL text cannot
/// hold NUL. Unknown escapes keep the escaped character, as MySQL does.
pub fn normalize_mysql_literals(sql: &str) -> String {
    if !sql.contains('\\') {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 16);
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    let mut in_ident: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(close) = in_ident {
            if c == close {
                in_ident = None;
            }
            out.push(c);
            continue;
        }
        match c {
            '`' | '"' if !in_string => {
                in_ident = Some(c);
                out.push(c);
            }
            '\'' => {
                if in_string && chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push_str("''");
                } else {
                    in_string = !in_string;
                    out.push(c);
                }
            }
            '\\' if in_string => match chars.next() {
                Some('\'') => out.push_str("''"),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('Z') => out.push('\u{1a}'),
                Some('0') => {}
                // LIKE wildcards keep their backslash
                Some(w @ ('%' | '_')) => {
                    out.push('\\');
                    out.push(w);
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Byte index of the parenthesis closing the one at `open`, skipping quotes.
pub fn matching_paren(sql: &str, open: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                if bytes.get(i + 1) == Some(&q) {
                    i += 1;
                } else {
                    quote = None;
                }
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Byte index of the first `(` outside quotes.
pub fn first_open_paren(sql: &str) -> Option<usize> {
    segments(sql)
        .into_iter()
        .scan(0usize, |offset, segment| {
            let start = *offset;
            let text = match segment {
                Segment::Code(t) | Segment::Literal(t) => t,
            };
            *offset += text.len();
            Some((start, segment))
        })
        .find_map(|(start, segment)| match segment {
            Segment::Code(code) => first_unquoted_paren(code).map(|i| start + i),
            Segment::Literal(_) => None,
        })
}

fn first_unquoted_paren(code: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in code.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '`' | '"') => quote = Some(c),
            (None, '(') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split on commas that sit at parenthesis depth zero and outside quotes.
pub fn split_top_level(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                if bytes.get(i + 1) == Some(&q) {
                    i += 1;
                } else {
                    quote = None;
                }
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                b',' if depth == 0 => {
                    parts.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_split_literals() {
        let parts = segments("INSERT INTO t VALUES ('a''b', 2)");
        assert_eq!(
            parts,
            vec![
                Segment::Code("INSERT INTO t VALUES ("),
                Segment::Literal("'a''b'"),
                Segment::Code(", 2)"),
            ]
        );
    }

    #[test]
    fn test_segments_keep_quotes_in_identifiers() {
        let parts = segments("SELECT `it's` FROM t");
        assert_eq!(parts, vec![Segment::Code("SELECT `it's` FROM t")]);
    }

    #[test]
    fn test_segments_mysql_honor_backslash() {
        let parts = segments_mysql(r"VALUES ('it\'s', 1)");
        assert_eq!(
            parts,
            vec![
                Segment::Code("VALUES ("),
                Segment::Literal(r"'it\'s'"),
                Segment::Code(", 1)"),
            ]
        );
    }

    #[test]
    fn test_requote_backticks() {
        assert_eq!(
            requote_backticks("INSERT INTO `invoice` VALUES ('`x`')"),
            "INSERT INTO \"invoice\" VALUES ('`x`')"
        );
        assert_eq!(requote_backticks("`a\"b`"), "\"a\"\"b\"");
        assert_eq!(requote_backticks("`a``b`"), "\"a`b\"");
    }

    #[test]
    fn test_normalize_mysql_literals() {
        assert_eq!(
            normalize_mysql_literals(r"VALUES ('it\'s','a\\b','x\ny')"),
            "VALUES ('it''s','a\\b','x\ny')"
        );
        assert_eq!(normalize_mysql_literals(r"('100\%')"), r"('100\%')");
        assert_eq!(normalize_mysql_literals("no escapes"), "no escapes");
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("a int, b decimal(10,2), c varchar(3) DEFAULT ','");
        assert_eq!(
            parts,
            vec!["a int", " b decimal(10,2)", " c varchar(3) DEFAULT ','"]
        );
    }

    #[test]
    fn test_matching_paren() {
        let sql = "CREATE TABLE t (a varchar(10) DEFAULT ')', b int) ENGINE=InnoDB";
        let open = first_open_paren(sql).unwrap();
        let close = matching_paren(sql, open).unwrap();
        assert_eq!(&sql[close..], ") ENGINE=InnoDB");
    }
}
