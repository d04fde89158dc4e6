//! Per-branch commit log and event log.

use crate::fsio::{read_optional, write_atomic};
use crate::lock::FileLock;
use crate::paths::BranchPaths;
use crate::repository::Repository;
use mneme_core::chain::fold_progress;
use mneme_core::clock::{now_rfc3339, parse_rfc3339};
use mneme_core::commit_md::{parse_commit_log, render_commit_log};
use mneme_core::log_md::{parse_event_log, render_event_log};
use mneme_core::text::{clip, one_line};
use mneme_core::{BranchRecord, Commit, LogEntry, MemoryError, Result, Role};
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Fallback contribution when no notes were given and no actions were logged.
pub const NO_ACTIONS: &str = "No recorded actions since last commit.";

/// Optional side effect run before a commit is persisted, such as committing
/// the workspace to an external VCS. It is called without the branch lock
/// held and receives a draft of the commit. A returned reference becomes the
/// commit's external ref; an error is logged and the commit goes ahead.
pub type MirrorFn<'a> = dyn Fn(&Commit) -> std::result::Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>
    + 'a;

#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub title: String,
    /// Synthesized from recent Action events when `None`.
    pub contribution: Option<String>,
    pub external_ref: Option<String>,
}

impl CommitRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn contribution(mut self, text: impl Into<String>) -> Self {
        self.contribution = Some(text.into());
        self
    }

    pub fn external_ref(mut self, rev: impl Into<String>) -> Self {
        self.external_ref = Some(rev.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct EventRequest {
    pub role: Role,
    pub payload: String,
    pub dedup_key: Option<String>,
    /// Defaults to now. The ingester passes the transcript timestamp.
    pub ts: Option<String>,
}

impl EventRequest {
    pub fn new(role: Role, payload: impl Into<String>) -> Self {
        Self {
            role,
            payload: payload.into(),
            dedup_key: None,
            ts: None,
        }
    }

    pub fn dedup(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn at(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(LogEntry),
    /// The dedup key was already recorded at `pos`; nothing was written.
    AlreadyPresent { pos: u64 },
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, AppendOutcome::Appended(_))
    }
}

/// The most recent events of a branch. `iter()` walks them newest first and
/// can be called any number of times.
#[derive(Debug, Clone, Default)]
pub struct EventTail {
    entries: Vec<LogEntry>,
}

impl EventTail {
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a EventTail {
    type Item = &'a LogEntry;
    type IntoIter = std::iter::Rev<std::slice::Iter<'a, LogEntry>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().rev()
    }
}

/// Parsed, reconciled state of one branch.
pub(crate) struct BranchState {
    pub record: BranchRecord,
    pub paths: BranchPaths,
    pub commits: Vec<Commit>,
    pub events: Vec<LogEntry>,
}

impl BranchState {
    /// Every merge-copied event must point at the merge commit that copied
    /// it. A dangling tag means the event log was written and the commit log
    /// was not.
    fn reconcile(&self) -> Result<()> {
        for e in &self.events {
            let Some(seq) = e.merge_seq else { continue };
            let merge = seq
                .checked_sub(1)
                .and_then(|i| self.commits.get(i as usize))
                .and_then(|c| c.merged_from.as_ref());
            let ok = match (merge, &e.origin) {
                (Some(m), Some(origin)) => &m.source == origin,
                _ => false,
            };
            if !ok {
                warn!(branch = %self.record.name, event = e.pos, merge = seq, "dangling merge tag");
                return Err(MemoryError::corrupt(
                    &self.paths.log_md,
                    format!(
                        "event {} was copied by merge commit {seq}, which is missing from the commit log",
                        e.pos
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn write_commits(&self) -> Result<()> {
        write_atomic(
            &self.paths.commit_md,
            render_commit_log(&self.record.name, &self.commits).as_bytes(),
        )
    }

    pub fn write_events(&self) -> Result<()> {
        write_atomic(
            &self.paths.log_md,
            render_event_log(&self.record.name, &self.events).as_bytes(),
        )
    }
}

impl Repository {
    /// Load and reconcile a branch. Missing or unparsable logs are `Corrupt`.
    pub(crate) fn load_branch(&self, name: &str) -> Result<BranchState> {
        let (record, paths) = self.registered_branch(name)?;
        let commit_text = read_optional(&paths.commit_md)?
            .ok_or_else(|| MemoryError::corrupt(&paths.commit_md, "commit log is missing"))?;
        let log_text = read_optional(&paths.log_md)?
            .ok_or_else(|| MemoryError::corrupt(&paths.log_md, "event log is missing"))?;
        let state = BranchState {
            commits: parse_commit_log(&commit_text, &paths.commit_md)?,
            events: parse_event_log(&log_text, &paths.log_md)?,
            record,
            paths,
        };
        state.reconcile()?;
        Ok(state)
    }

    pub(crate) fn lock_branch(&self, name: &str) -> Result<FileLock> {
        let paths = self.paths.branch(name);
        FileLock::acquire(&paths.lock_file, self.config.lock_timeout())
    }

    /// Append a commit with the next sequence number and a freshly folded
    /// previous-progress summary.
    ///
    /// The mirror runs before the branch lock is taken, against a draft built
    /// from an unlocked read. The persisted commit is rebuilt under the lock,
    /// so its sequence number and summary can differ from the draft's when
    /// another writer commits in between; only the mirror's ref is kept.
    pub fn commit(
        &self,
        branch: &str,
        request: CommitRequest,
        mirror: Option<&MirrorFn<'_>>,
    ) -> Result<Commit> {
        self.branch_record(branch)?;
        let CommitRequest {
            title,
            contribution,
            external_ref,
        } = request;

        let mut external_ref = external_ref;
        if let Some(mirror) = mirror {
            let draft = self.next_commit(
                &self.load_branch(branch)?,
                title.clone(),
                contribution.clone(),
                external_ref.clone(),
            );
            match mirror(&draft) {
                Ok(Some(rev)) => external_ref = Some(rev),
                Ok(None) => {}
                Err(e) => warn!(branch, seq = draft.seq, error = %e, "commit mirror failed"),
            }
        }

        let _lock = self.lock_branch(branch)?;
        let mut state = self.load_branch(branch)?;
        let commit = self.next_commit(&state, title, contribution, external_ref);
        state.commits.push(commit.clone());
        state.write_commits()?;
        info!(branch, seq = commit.seq, title = %commit.title, "committed");
        Ok(commit)
    }

    fn next_commit(
        &self,
        state: &BranchState,
        title: String,
        contribution: Option<String>,
        external_ref: Option<String>,
    ) -> Commit {
        Commit {
            seq: state.commits.len() as u64 + 1,
            ts: now_rfc3339(),
            branch: state.record.name.clone(),
            title,
            purpose: state.record.purpose.clone(),
            prev_summary: fold_progress(&state.commits, &self.config.chain),
            contribution: contribution.unwrap_or_else(|| self.synthesize_contribution(state)),
            external_ref,
            merged_from: None,
            carried: Vec::new(),
            events_through: Some(state.events.len() as u64),
        }
    }

    /// Bullet list of the most recent local Action events logged after the
    /// previous commit's `events_through` position.
    fn synthesize_contribution(&self, state: &BranchState) -> String {
        let since = state
            .commits
            .iter()
            .rev()
            .find_map(|c| c.events_through)
            .unwrap_or(0);
        let actions: Vec<&LogEntry> = state
            .events
            .iter()
            .filter(|e| e.pos > since)
            .filter(|e| e.role == Role::Action && e.origin.is_none())
            .collect();
        if actions.is_empty() {
            return NO_ACTIONS.to_string();
        }
        let keep = self.config.chain.recent.max(1);
        actions[actions.len().saturating_sub(keep)..]
            .iter()
            .map(|e| format!("- {}", clip(&one_line(&e.payload), self.config.chain.item_chars)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All commits, oldest first.
    pub fn commits(&self, branch: &str) -> Result<Vec<Commit>> {
        Ok(self.load_branch(branch)?.commits)
    }

    /// The `n`-th commit counting back from the newest (0 = latest).
    pub fn read_commit(&self, branch: &str, n: usize) -> Result<Commit> {
        let mut commits = self.commits(branch)?;
        let count = commits.len();
        if n >= count {
            return Err(MemoryError::OutOfRange { index: n, count });
        }
        Ok(commits.swap_remove(count - 1 - n))
    }

    pub fn latest_commit(&self, branch: &str) -> Result<Option<Commit>> {
        Ok(self.commits(branch)?.pop())
    }

    /// Append one event unless its dedup key is already recorded.
    pub fn append_event(&self, branch: &str, request: EventRequest) -> Result<AppendOutcome> {
        self.branch_record(branch)?;
        let _lock = self.lock_branch(branch)?;
        let mut state = self.load_branch(branch)?;
        let mut keys = dedup_index(&state.events);
        let outcome = push_event(&mut state.events, &mut keys, request);
        if outcome.is_appended() {
            state.write_events()?;
        }
        log_outcome(branch, &outcome);
        Ok(outcome)
    }

    /// Append a batch of events under one lock and one write. Keys are
    /// checked against the log and against earlier requests in the batch.
    /// Outcomes are returned in request order.
    pub fn append_events(
        &self,
        branch: &str,
        requests: Vec<EventRequest>,
    ) -> Result<Vec<AppendOutcome>> {
        self.branch_record(branch)?;
        let _lock = self.lock_branch(branch)?;
        let mut state = self.load_branch(branch)?;
        let mut keys = dedup_index(&state.events);
        let outcomes: Vec<AppendOutcome> = requests
            .into_iter()
            .map(|req| push_event(&mut state.events, &mut keys, req))
            .collect();
        let appended = outcomes.iter().filter(|o| o.is_appended()).count();
        if appended > 0 {
            state.write_events()?;
        }
        debug!(branch, requested = outcomes.len(), appended, "event batch appended");
        Ok(outcomes)
    }

    /// The newest `limit` events.
    pub fn tail(&self, branch: &str, limit: usize) -> Result<EventTail> {
        let mut events = self.load_branch(branch)?.events;
        let start = events.len().saturating_sub(limit);
        Ok(EventTail {
            entries: events.split_off(start),
        })
    }

    pub fn event_count(&self, branch: &str) -> Result<usize> {
        Ok(self.load_branch(branch)?.events.len())
    }

    /// Elapsed time since the newest commit, `None` before the first one.
    /// Clock skew into the future reads as zero.
    pub fn time_since_last_commit(&self, branch: &str) -> Result<Option<Duration>> {
        let state = self.load_branch(branch)?;
        let Some(last) = state.commits.last() else {
            return Ok(None);
        };
        let ts = parse_rfc3339(&last.ts).ok_or_else(|| {
            MemoryError::corrupt(
                &state.paths.commit_md,
                format!("commit {} has unparsable timestamp {:?}", last.seq, last.ts),
            )
        })?;
        let elapsed = OffsetDateTime::now_utc() - ts;
        Ok(Some(Duration::try_from(elapsed).unwrap_or(Duration::ZERO)))
    }
}

/// Dedup key -> position of the first event that carried it.
fn dedup_index(events: &[LogEntry]) -> HashMap<String, u64> {
    let mut keys = HashMap::new();
    for e in events {
        if let Some(k) = &e.dedup_key {
            keys.entry(k.clone()).or_insert(e.pos);
        }
    }
    keys
}

fn push_event(
    events: &mut Vec<LogEntry>,
    keys: &mut HashMap<String, u64>,
    request: EventRequest,
) -> AppendOutcome {
    if let Some(&pos) = request.dedup_key.as_ref().and_then(|k| keys.get(k)) {
        return AppendOutcome::AlreadyPresent { pos };
    }
    let entry = LogEntry {
        pos: events.len() as u64 + 1,
        ts: request.ts.unwrap_or_else(now_rfc3339),
        role: request.role,
        payload: request.payload,
        dedup_key: request.dedup_key,
        origin: None,
        merge_seq: None,
        authored_on: None,
    };
    if let Some(k) = &entry.dedup_key {
        keys.insert(k.clone(), entry.pos);
    }
    events.push(entry.clone());
    AppendOutcome::Appended(entry)
}

fn log_outcome(branch: &str, outcome: &AppendOutcome) {
    match outcome {
        AppendOutcome::Appended(e) => debug!(branch, pos = e.pos, role = %e.role, "event appended"),
        AppendOutcome::AlreadyPresent { pos } => debug!(branch, pos, "event already present"),
    }
}
