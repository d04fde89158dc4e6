//! `commit.md` codec. The rendered text is the canonical persisted form, so
//! `parse_commit_log(render_commit_log(..))` returns the commits unchanged.

use crate::error::{MemoryError, Result};
use crate::text::{
    escape_inline, push_block, skip_blank, split_lines, take_block, take_fields, unescape_inline,
};
use crate::types::{CarriedCommit, Commit, MergeRange};
use std::path::Path;

const TITLE_PREFIX: &str = "# Commit Log: ";
const COMMIT_PREFIX: &str = "### Commit ";
const CARRIED_PREFIX: &str = "#### ";
const PURPOSE: &str = "**Branch Purpose:**";
const PREV: &str = "**Previous Progress Summary:**";
const CONTRIB: &str = "**This Commit's Contribution:**";
const MERGED: &str = "**Merged Commits:**";

/// Render a whole commit log for `branch`.
pub fn render_commit_log(branch: &str, commits: &[Commit]) -> String {
    let mut out = format!("{TITLE_PREFIX}{}\n\n", escape_inline(branch));
    for c in commits {
        render_commit_into(&mut out, c);
    }
    out
}

/// Render one commit entry.
pub fn render_commit(c: &Commit) -> String {
    let mut out = String::new();
    render_commit_into(&mut out, c);
    out
}

fn render_commit_into(out: &mut String, c: &Commit) {
    out.push_str(&format!("{COMMIT_PREFIX}{}: {}\n", c.seq, escape_inline(&c.title)));
    out.push_str(&format!("- timestamp: {}\n", escape_inline(&c.ts)));
    out.push_str(&format!("- branch: {}\n", escape_inline(&c.branch)));
    if let Some(r) = &c.external_ref {
        out.push_str(&format!("- external-ref: {}\n", escape_inline(r)));
    }
    if let Some(m) = &c.merged_from {
        out.push_str(&format!("- merged-from: {}\n", render_range(m)));
    }
    if let Some(n) = c.events_through {
        out.push_str(&format!("- events-through: {n}\n"));
    }
    out.push('\n');

    out.push_str(PURPOSE);
    out.push('\n');
    push_block(out, &c.purpose);
    out.push_str(PREV);
    out.push('\n');
    push_block(out, &c.prev_summary);
    out.push_str(CONTRIB);
    out.push('\n');
    push_block(out, &c.contribution);

    if !c.carried.is_empty() {
        out.push_str(MERGED);
        out.push('\n');
        for cc in &c.carried {
            out.push_str(&format!(
                "{CARRIED_PREFIX}{} #{}: {}\n",
                escape_inline(&cc.origin),
                cc.seq,
                escape_inline(&cc.title)
            ));
            out.push_str(&format!("- timestamp: {}\n\n", escape_inline(&cc.ts)));
            push_block(out, &cc.contribution);
        }
    }
}

fn render_range(m: &MergeRange) -> String {
    match m.commits {
        Some((first, last)) => format!("{} {first}..{last}", escape_inline(&m.source)),
        None => format!("{} none", escape_inline(&m.source)),
    }
}

fn parse_range(s: &str) -> Option<MergeRange> {
    let (source, range) = s.rsplit_once(' ')?;
    let commits = if range == "none" {
        None
    } else {
        let (a, b) = range.split_once("..")?;
        Some((a.parse().ok()?, b.parse().ok()?))
    };
    Some(MergeRange {
        source: source.to_string(),
        commits,
    })
}

/// Parse a commit log. Fails `Corrupt` on malformed text or when sequence
/// numbers are not exactly `1..=n`.
pub fn parse_commit_log(content: &str, path: &Path) -> Result<Vec<Commit>> {
    let bad = |reason: String| MemoryError::corrupt(path, reason);
    let lines = split_lines(content);
    let mut idx = 0;
    if lines.first().is_some_and(|l| l.starts_with(TITLE_PREFIX)) {
        idx += 1;
    }
    skip_blank(&lines, &mut idx);

    let mut commits: Vec<Commit> = Vec::new();
    while idx < lines.len() {
        let commit = parse_one(&lines, &mut idx).map_err(&bad)?;
        let expected = commits.len() as u64 + 1;
        if commit.seq != expected {
            return Err(bad(format!(
                "sequence gap: expected commit {expected}, found {}",
                commit.seq
            )));
        }
        commits.push(commit);
        skip_blank(&lines, &mut idx);
    }
    Ok(commits)
}

fn expect_marker(lines: &[&str], idx: &mut usize, marker: &str) -> std::result::Result<(), String> {
    match lines.get(*idx) {
        Some(l) if *l == marker => {
            *idx += 1;
            Ok(())
        }
        Some(l) => Err(format!("line {}: expected {marker}, found {l:?}", *idx + 1)),
        None => Err(format!("unexpected end of file, expected {marker}")),
    }
}

fn parse_one(lines: &[&str], idx: &mut usize) -> std::result::Result<Commit, String> {
    let header = lines[*idx];
    let rest = header
        .strip_prefix(COMMIT_PREFIX)
        .ok_or_else(|| format!("line {}: expected commit header, found {header:?}", *idx + 1))?;
    let (seq, title) = rest
        .split_once(": ")
        .ok_or_else(|| format!("line {}: malformed commit header", *idx + 1))?;
    let seq: u64 = seq
        .parse()
        .map_err(|_| format!("line {}: bad sequence number {seq:?}", *idx + 1))?;
    *idx += 1;

    let mut ts = None;
    let mut branch = None;
    let mut external_ref = None;
    let mut merged_from = None;
    let mut events_through = None;
    for (k, v) in take_fields(lines, idx)? {
        match k.as_str() {
            "timestamp" => ts = Some(v),
            "branch" => branch = Some(v),
            "external-ref" => external_ref = Some(v),
            "merged-from" => {
                merged_from =
                    Some(parse_range(&v).ok_or_else(|| format!("bad merged-from {v:?}"))?)
            }
            "events-through" => {
                events_through = Some(
                    v.parse()
                        .map_err(|_| format!("commit {seq}: bad events-through {v:?}"))?,
                )
            }
            other => return Err(format!("commit {seq}: unknown field {other:?}")),
        }
    }

    expect_marker(lines, idx, PURPOSE)?;
    let purpose = take_block(lines, idx)?;
    expect_marker(lines, idx, PREV)?;
    let prev_summary = take_block(lines, idx)?;
    expect_marker(lines, idx, CONTRIB)?;
    let contribution = take_block(lines, idx)?;

    let mut carried = Vec::new();
    if lines.get(*idx) == Some(&MERGED) {
        *idx += 1;
        while let Some(h) = lines.get(*idx).and_then(|l| l.strip_prefix(CARRIED_PREFIX)) {
            carried.push(parse_carried(h, lines, idx)?);
        }
    }

    Ok(Commit {
        seq,
        ts: ts.ok_or_else(|| format!("commit {seq}: missing timestamp"))?,
        branch: branch.ok_or_else(|| format!("commit {seq}: missing branch"))?,
        title: unescape_inline(title),
        purpose,
        prev_summary,
        contribution,
        external_ref,
        merged_from,
        carried,
        events_through,
    })
}

fn parse_carried(
    header: &str,
    lines: &[&str],
    idx: &mut usize,
) -> std::result::Result<CarriedCommit, String> {
    let malformed = || format!("line {}: malformed merged commit header", *idx + 1);
    let (origin, rest) = header.split_once(" #").ok_or_else(malformed)?;
    let (seq, title) = rest.split_once(": ").ok_or_else(malformed)?;
    let seq: u64 = seq.parse().map_err(|_| malformed())?;
    *idx += 1;
    let fields = take_fields(lines, idx)?;
    let ts = fields
        .into_iter()
        .find(|(k, _)| k == "timestamp")
        .map(|(_, v)| v)
        .ok_or_else(|| format!("merged commit {origin}#{seq}: missing timestamp"))?;
    let contribution = take_block(lines, idx)?;
    Ok(CarriedCommit {
        origin: unescape_inline(origin),
        seq,
        ts,
        title: unescape_inline(title),
        contribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(seq: u64, title: &str, contribution: &str) -> Commit {
        Commit {
            seq,
            ts: "2026-10-19T08:00:00Z".into(),
            branch: "main".into(),
            title: title.into(),
            purpose: "Ship the MVP".into(),
            prev_summary: "Initial commit; no prior progress.".into(),
            contribution: contribution.into(),
            external_ref: None,
            merged_from: None,
            carried: Vec::new(),
            events_through: None,
        }
    }

    #[test]
    fn render_then_parse_is_identity() {
        let mut merge = commit(3, "Merge spike -> main", "Merged branch spike commits 1..2.");
        merge.external_ref = Some("4be1c0d".into());
        merge.events_through = Some(12);
        merge.merged_from = Some(MergeRange {
            source: "spike".into(),
            commits: Some((1, 2)),
        });
        merge.carried = vec![
            CarriedCommit {
                origin: "spike".into(),
                seq: 1,
                ts: "2026-10-18T10:00:00+02:00".into(),
                title: "Try sqlite".into(),
                contribution: "Benchmarked.\n\n## numbers\n- 2x faster".into(),
            },
            CarriedCommit {
                origin: "spike".into(),
                seq: 2,
                ts: "2026-10-18T11:00:00+02:00".into(),
                title: "Wrap up: keep it".into(),
                contribution: String::new(),
            },
        ];
        let commits = vec![
            commit(1, "Init", "Set up skeleton"),
            commit(2, "Title with\nnewline \\ and colon: yes", "**bold start**\n### fake"),
            merge,
        ];
        let text = render_commit_log("main", &commits);
        let parsed = parse_commit_log(&text, Path::new("commit.md")).unwrap();
        assert_eq!(parsed, commits);
    }

    #[test]
    fn rendered_entry_shows_three_blocks_in_order() {
        let text = render_commit(&commit(1, "Init", "Set up skeleton"));
        let p = text.find(PURPOSE).unwrap();
        let s = text.find(PREV).unwrap();
        let c = text.find(CONTRIB).unwrap();
        assert!(p < s && s < c);
        assert!(text.starts_with("### Commit 1: Init\n- timestamp: "));
        assert!(text.contains("- branch: main\n"));
    }

    #[test]
    fn empty_and_header_only_logs_have_no_commits() {
        let p = Path::new("commit.md");
        assert!(parse_commit_log("", p).unwrap().is_empty());
        assert!(parse_commit_log("# Commit Log: main\n\n", p).unwrap().is_empty());
    }

    #[test]
    fn sequence_gap_is_corrupt() {
        let text = render_commit_log("main", &[commit(1, "a", "x"), commit(3, "b", "y")]);
        let err = parse_commit_log(&text, Path::new("commit.md")).unwrap_err();
        assert!(matches!(err, MemoryError::Corrupt { .. }));
        assert!(err.to_string().contains("sequence gap"));
    }

    #[test]
    fn truncated_entry_is_corrupt() {
        let text = render_commit_log("main", &[commit(1, "a", "x")]);
        let cut = &text[..text.find(CONTRIB).unwrap()];
        let err = parse_commit_log(cut, Path::new("commit.md")).unwrap_err();
        assert!(matches!(err, MemoryError::Corrupt { .. }));
    }

    #[test]
    fn merge_without_source_commits() {
        let mut c = commit(1, "Merge empty -> main", "nothing to carry");
        c.merged_from = Some(MergeRange {
            source: "empty".into(),
            commits: None,
        });
        let text = render_commit_log("main", std::slice::from_ref(&c));
        assert!(text.contains("- merged-from: empty none\n"));
        let parsed = parse_commit_log(&text, Path::new("commit.md")).unwrap();
        assert_eq!(parsed, vec![c]);
    }
}
