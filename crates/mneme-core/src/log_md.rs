//! `log.md` codec: one record per event, role tag and timestamp in the header.

use crate::error::{MemoryError, Result};
use crate::text::{
    escape_inline, push_block, skip_blank, split_lines, take_block, take_fields, unescape_inline,
};
use crate::types::{LogEntry, Role};
use std::path::Path;

const TITLE_PREFIX: &str = "# Event Log: ";
const ENTRY_PREFIX: &str = "## [";

pub fn render_event_log(branch: &str, entries: &[LogEntry]) -> String {
    let mut out = format!("{TITLE_PREFIX}{}\n\n", escape_inline(branch));
    for e in entries {
        render_entry_into(&mut out, e);
    }
    out
}

fn render_entry_into(out: &mut String, e: &LogEntry) {
    out.push_str(&format!(
        "{ENTRY_PREFIX}{}] {} @ {}\n",
        e.pos,
        e.role.tag(),
        escape_inline(&e.ts)
    ));
    if let Some(k) = &e.dedup_key {
        out.push_str(&format!("- dedup: {}\n", escape_inline(k)));
    }
    if let Some(o) = &e.origin {
        out.push_str(&format!("- origin: {}\n", escape_inline(o)));
    }
    if let Some(m) = e.merge_seq {
        out.push_str(&format!("- merge: {m}\n"));
    }
    if let Some(a) = &e.authored_on {
        out.push_str(&format!("- authored-on: {}\n", escape_inline(a)));
    }
    out.push('\n');
    push_block(out, &e.payload);
}

/// Parse an event log. Positions must be exactly `1..=n`.
pub fn parse_event_log(content: &str, path: &Path) -> Result<Vec<LogEntry>> {
    let lines = split_lines(content);
    let mut idx = 0;
    if lines.first().is_some_and(|l| l.starts_with(TITLE_PREFIX)) {
        idx += 1;
    }
    skip_blank(&lines, &mut idx);

    let mut entries: Vec<LogEntry> = Vec::new();
    while idx < lines.len() {
        let entry = parse_one(&lines, &mut idx).map_err(|r| MemoryError::corrupt(path, r))?;
        let expected = entries.len() as u64 + 1;
        if entry.pos != expected {
            return Err(MemoryError::corrupt(
                path,
                format!("position gap: expected event {expected}, found {}", entry.pos),
            ));
        }
        entries.push(entry);
        skip_blank(&lines, &mut idx);
    }
    Ok(entries)
}

fn parse_one(lines: &[&str], idx: &mut usize) -> std::result::Result<LogEntry, String> {
    let line_no = *idx + 1;
    let malformed = || format!("line {line_no}: malformed event header");
    let rest = lines[*idx]
        .strip_prefix(ENTRY_PREFIX)
        .ok_or_else(|| format!("line {line_no}: expected event header"))?;
    let (pos, rest) = rest.split_once("] ").ok_or_else(malformed)?;
    let (role, ts) = rest.split_once(" @ ").ok_or_else(malformed)?;
    let pos: u64 = pos.parse().map_err(|_| malformed())?;
    let role: Role = role.parse().map_err(|e| format!("line {line_no}: {e}"))?;
    *idx += 1;

    let mut entry = LogEntry {
        pos,
        ts: unescape_inline(ts),
        role,
        payload: String::new(),
        dedup_key: None,
        origin: None,
        merge_seq: None,
        authored_on: None,
    };
    for (k, v) in take_fields(lines, idx)? {
        match k.as_str() {
            "dedup" => entry.dedup_key = Some(v),
            "origin" => entry.origin = Some(v),
            "authored-on" => entry.authored_on = Some(v),
            "merge" => {
                entry.merge_seq = Some(
                    v.parse()
                        .map_err(|_| format!("event {pos}: bad merge sequence {v:?}"))?,
                )
            }
            other => return Err(format!("event {pos}: unknown field {other:?}")),
        }
    }
    entry.payload = take_block(lines, idx)?;
    Ok(entry)
}
