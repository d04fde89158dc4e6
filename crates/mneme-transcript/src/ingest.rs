use crate::extract::extract_events;
use crate::filter::record_timestamp;
use crate::load::parse_records;
use anyhow::Context;
use mneme_core::clock::date_key;
use mneme_core::hash::short_digest;
use mneme_core::text::{clip, one_line};
use mneme_core::{LogEntry, Role};
use mneme_store::{AppendOutcome, CommitRequest, EventRequest, Repository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

const LISTED_REQUESTS: usize = 3;
const LISTED_ACTIONS: usize = 5;

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub records_read: usize,
    /// JSONL lines that were not valid JSON.
    pub records_skipped: usize,
    pub events_seen: usize,
    pub events_appended: usize,
    /// Events whose dedup key was already on the branch.
    pub events_present: usize,
    pub commits_created: usize,
    pub appended_by_role: BTreeMap<String, usize>,
}

/// Backfill a transcript into `branch`.
///
/// The file may be JSONL, a JSON array of records, or an object wrapping
/// the records under `turns`, `messages` or `events`. Each event's dedup key
/// is derived from the record's compact JSON and the content block index, so
/// ingesting the same file again appends nothing. All events go to the log
/// in one batch. Newly appended events are grouped by UTC day and every day
/// that gained events gets one commit.
pub fn ingest_transcript(
    repo: &Repository,
    branch: &str,
    transcript_path: &Path,
) -> anyhow::Result<IngestStats> {
    repo.branch_record(branch)?;
    let text = std::fs::read_to_string(transcript_path)
        .with_context(|| format!("read transcript {}", transcript_path.display()))?;
    let loaded = parse_records(&text);

    let mut stats = IngestStats {
        records_read: loaded.records.len() + loaded.skipped,
        records_skipped: loaded.skipped,
        ..Default::default()
    };

    let mut requests = Vec::new();
    for record in &loaded.records {
        let digest = short_digest(record.to_string().as_bytes());
        let ts = record_timestamp(record);
        for ev in extract_events(record) {
            let mut req =
                EventRequest::new(ev.role, ev.payload).dedup(format!("tx:{digest}:{}", ev.block));
            if let Some(ts) = &ts {
                req = req.at(ts.clone());
            }
            requests.push(req);
        }
    }
    stats.events_seen = requests.len();

    let mut by_day: BTreeMap<String, Vec<LogEntry>> = BTreeMap::new();
    for outcome in repo.append_events(branch, requests)? {
        match outcome {
            AppendOutcome::Appended(entry) => {
                stats.events_appended += 1;
                *stats
                    .appended_by_role
                    .entry(entry.role.to_string())
                    .or_default() += 1;
                by_day.entry(date_key(&entry.ts)).or_default().push(entry);
            }
            AppendOutcome::AlreadyPresent { .. } => stats.events_present += 1,
        }
    }

    for (day, entries) in &by_day {
        let title = format!("{day} ({} events)", entries.len());
        let request = CommitRequest::new(title).contribution(day_contribution(entries));
        let commit = repo.commit(branch, request, None)?;
        debug!(branch, seq = commit.seq, day = %day, "backfill commit");
        stats.commits_created += 1;
    }

    if stats.records_skipped > 0 {
        warn!(
            path = %transcript_path.display(),
            skipped = stats.records_skipped,
            "transcript had unparsable lines"
        );
    }
    info!(
        branch,
        appended = stats.events_appended,
        present = stats.events_present,
        commits = stats.commits_created,
        "transcript ingested"
    );
    Ok(stats)
}

/// What happened on one day: the first requests, then the last actions.
fn day_contribution(entries: &[LogEntry]) -> String {
    let count = |role: Role| entries.iter().filter(|e| e.role == role).count();
    let mut out = format!(
        "Backfilled {} observations, {} thoughts, {} actions.",
        count(Role::Observation),
        count(Role::Thought),
        count(Role::Action)
    );
    let requests: Vec<&LogEntry> = entries
        .iter()
        .filter(|e| e.role == Role::Observation)
        .take(LISTED_REQUESTS)
        .collect();
    if !requests.is_empty() {
        out.push_str("\nRequests:");
        for e in requests {
            out.push_str(&format!("\n- {}", clip(&one_line(&e.payload), 160)));
        }
    }
    let actions: Vec<&LogEntry> = entries.iter().filter(|e| e.role == Role::Action).collect();
    if !actions.is_empty() {
        out.push_str("\nActions:");
        for e in &actions[actions.len().saturating_sub(LISTED_ACTIONS)..] {
            out.push_str(&format!("\n- {}", one_line(&e.payload)));
        }
    }
    out
}
