//! Text helpers shared by the markdown codecs and the chaining fold.
//!
//! Persisted markdown keeps free text in *blocks*. A block is the body text
//! split on `\n`, one line per line, followed by one empty separator line.
//! Body lines that could be mistaken for structure get a `\` prefix, so a
//! parser can stop at the first unescaped structural line.

/// Return the largest byte index `<= i` that is a valid char boundary.
pub fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Clip `s` to at most `max` bytes, ending in `...` when clipped.
pub fn clip(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let end = floor_char_boundary(s, max.saturating_sub(3));
    format!("{}...", s[..end].trim_end())
}

/// Collapse all whitespace runs (newlines included) to single spaces.
pub fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape a single-line field (`\` and line breaks).
pub fn escape_inline(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_inline`].
pub fn unescape_inline(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Lines starting like this end a block when unescaped.
pub fn is_structural(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("**") || line.starts_with("<!--")
}

fn needs_escape(line: &str) -> bool {
    line.starts_with('\\') || is_structural(line)
}

/// Append `body` as a block (escaped lines plus the separator line).
pub fn push_block(out: &mut String, body: &str) {
    for line in body.split('\n') {
        if needs_escape(line) {
            out.push('\\');
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
}

/// Split file content into lines such that `push_block` output is recovered
/// exactly: `\r` is kept, and the final newline does not produce a line.
pub fn split_lines(content: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Read one block starting at `lines[*idx]`; advances `idx` past it.
///
/// Errors when the block is not terminated by its separator line.
pub fn take_block(lines: &[&str], idx: &mut usize) -> Result<String, String> {
    let start = *idx;
    while *idx < lines.len() && !is_structural(lines[*idx]) {
        *idx += 1;
    }
    let raw = &lines[start..*idx];
    match raw.split_last() {
        Some((&"", body)) => {
            let body: Vec<&str> = body
                .iter()
                .map(|l| l.strip_prefix('\\').unwrap_or(l))
                .collect();
            Ok(body.join("\n"))
        }
        _ => Err(format!("block starting at line {} has no separator", start + 1)),
    }
}

/// Skip empty lines.
pub fn skip_blank(lines: &[&str], idx: &mut usize) {
    while *idx < lines.len() && lines[*idx].is_empty() {
        *idx += 1;
    }
}

/// Parse `- key: value` metadata lines until the first empty line (consumed).
pub fn take_fields(lines: &[&str], idx: &mut usize) -> Result<Vec<(String, String)>, String> {
    let mut fields = Vec::new();
    while *idx < lines.len() {
        let line = lines[*idx];
        *idx += 1;
        if line.is_empty() {
            return Ok(fields);
        }
        let rest = line
            .strip_prefix("- ")
            .ok_or_else(|| format!("line {}: expected '- key: value'", *idx))?;
        let (k, v) = rest
            .split_once(": ")
            .ok_or_else(|| format!("line {}: expected '- key: value'", *idx))?;
        fields.push((k.to_string(), unescape_inline(v)));
    }
    Err("metadata fields not terminated by a blank line".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(body: &str) -> String {
        let mut out = String::new();
        push_block(&mut out, body);
        out.push_str("**Next:**\n");
        let lines = split_lines(&out);
        let mut idx = 0;
        let parsed = take_block(&lines, &mut idx).unwrap();
        assert_eq!(lines[idx], "**Next:**");
        parsed
    }

    #[test]
    fn blocks_survive_structural_lookalikes() {
        for body in [
            "",
            "plain",
            "two\nlines",
            "trailing newline\n",
            "\n\nleading blanks",
            "### Commit 9: fake header",
            "**This Commit's Contribution:**\nfake marker",
            "\\already escaped\n\\\\double",
            "<!-- unset -->",
            "crlf line\r\nnext\r",
        ] {
            assert_eq!(roundtrip(body), body, "body {body:?}");
        }
    }

    #[test]
    fn inline_escape_is_invertible() {
        for s in ["", "a\\b", "line\nbreak", "\\n literal", "ends with \\"] {
            assert_eq!(unescape_inline(&escape_inline(s)), s);
            assert!(!escape_inline(s).contains('\n'));
        }
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let lines = ["text", "**Next:**"];
        let mut idx = 0;
        assert!(take_block(&lines, &mut idx).is_err());
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghij", 8), "abcde...");
        let s = "ééééé";
        let c = clip(s, 6);
        assert!(c.ends_with("..."));
        assert!(c.len() <= 6);
    }

    #[test]
    fn one_line_collapses_whitespace() {
        assert_eq!(one_line("  a\n\tb   c \n"), "a b c");
    }

    #[test]
    fn fields_parse_until_blank() {
        let lines = ["- timestamp: 2026-01-01T00:00:00Z", "- ref: a\\nb", "", "rest"];
        let mut idx = 0;
        let f = take_fields(&lines, &mut idx).unwrap();
        assert_eq!(f[0], ("timestamp".into(), "2026-01-01T00:00:00Z".into()));
        assert_eq!(f[1], ("ref".into(), "a\nb".into()));
        assert_eq!(lines[idx], "rest");
    }
}
