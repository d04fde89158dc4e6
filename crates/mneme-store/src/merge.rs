//! Merge engine: fold one branch's history into another.

use crate::context::BranchContext;
use crate::repository::Repository;
use mneme_core::chain::fold_progress;
use mneme_core::clock::now_rfc3339;
use mneme_core::text::{clip, one_line};
use mneme_core::{CarriedCommit, Commit, LogEntry, MemoryError, MergeRange, Result};
use tracing::info;

/// How many source commits the merge contribution names individually.
const LISTED_COMMITS: usize = 5;

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Target branch context as it was before the merge.
    pub target_context: BranchContext,
    pub merge_commit: Commit,
    pub events_copied: usize,
}

impl Repository {
    /// Merge `source` into `target`.
    ///
    /// Source events are appended to the target log tagged with their origin
    /// and the merge commit's sequence; source commits are carried inside the
    /// merge commit. Events the source itself received by merge keep the
    /// branch they were first appended on in `authored_on`.
    ///
    /// The event log is written before the commit log, so an interrupted
    /// merge leaves dangling `merge:` tags that the next load reports as
    /// `Corrupt`. The source branch is only read. Merging the same source
    /// again copies everything again.
    pub fn merge(&self, source: &str, target: &str) -> Result<MergeOutcome> {
        self.branch_record(source)?;
        self.branch_record(target)?;
        if source == target {
            return Err(MemoryError::SelfMerge(source.to_string()));
        }

        let _lock = self.lock_branch(target)?;
        info!(source, target, "merge started");
        let target_context = self.branch_context(target, None, 0)?;

        let src = self.load_branch(source)?;
        let mut dst = self.load_branch(target)?;
        let seq = dst.commits.len() as u64 + 1;

        let base = dst.events.len() as u64;
        let copied: Vec<LogEntry> = src
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| LogEntry {
                pos: base + i as u64 + 1,
                ts: e.ts.clone(),
                role: e.role,
                payload: e.payload.clone(),
                dedup_key: e.dedup_key.clone(),
                origin: Some(source.to_string()),
                merge_seq: Some(seq),
                authored_on: e.authored_on.clone().or_else(|| e.origin.clone()),
            })
            .collect();
        let events_copied = copied.len();

        let range = match (src.commits.first(), src.commits.last()) {
            (Some(first), Some(last)) => Some((first.seq, last.seq)),
            _ => None,
        };
        let carried: Vec<CarriedCommit> = src
            .commits
            .iter()
            .map(|c| CarriedCommit {
                origin: source.to_string(),
                seq: c.seq,
                ts: c.ts.clone(),
                title: c.title.clone(),
                contribution: c.contribution.clone(),
            })
            .collect();

        let merge_commit = Commit {
            seq,
            ts: now_rfc3339(),
            branch: target.to_string(),
            title: format!("Merge {source} -> {target}"),
            purpose: dst.record.purpose.clone(),
            prev_summary: fold_progress(&dst.commits, &self.config.chain),
            contribution: merge_contribution(source, &src.record.purpose, &src.commits, range, events_copied),
            external_ref: None,
            merged_from: Some(MergeRange {
                source: source.to_string(),
                commits: range,
            }),
            carried,
            events_through: Some(base + events_copied as u64),
        };

        dst.events.extend(copied);
        dst.write_events()?;
        dst.commits.push(merge_commit.clone());
        dst.write_commits()?;

        info!(source, target, seq, events_copied, "merge finished");
        Ok(MergeOutcome {
            target_context,
            merge_commit,
            events_copied,
        })
    }
}

fn merge_contribution(
    source: &str,
    purpose: &str,
    commits: &[Commit],
    range: Option<(u64, u64)>,
    events: usize,
) -> String {
    let mut out = match range {
        Some((a, b)) => format!("Merged branch {source} (commits {a}-{b}, {events} events)"),
        None => format!("Merged branch {source} (no commits, {events} events)"),
    };
    if !purpose.is_empty() {
        out.push_str(&format!(": {}", one_line(purpose)));
    }
    let skip = commits.len().saturating_sub(LISTED_COMMITS);
    for c in &commits[skip..] {
        out.push_str(&format!(
            "\n- #{} {}: {}",
            c.seq,
            one_line(&c.title),
            clip(&one_line(&c.contribution), 160)
        ));
    }
    out
}
