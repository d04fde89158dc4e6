//! One-file snapshot of a branch: Main Document, branch record, full commit
//! log, metadata and the most recent events.

use crate::repository::Repository;
use mneme_core::commit_md::render_commit;
use mneme_core::main_md::MainDocument;
use mneme_core::text::{clip, one_line};
use mneme_core::{BranchRecord, Commit, LogEntry, Result};
use serde_yaml::Mapping;

const EVENT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct BranchExport {
    pub branch: BranchRecord,
    pub main: MainDocument,
    /// Oldest first.
    pub commits: Vec<Commit>,
    pub metadata: Mapping,
    /// Newest first.
    pub events: Vec<LogEntry>,
}

impl Repository {
    /// Snapshot `branch` with its newest `events` events. Read-only; an
    /// unknown branch is `NotFound` like every other context read.
    pub fn export(&self, branch: &str, events: usize) -> Result<BranchExport> {
        let state = self.load_for_context(branch)?;
        let recent = state.events.into_iter().rev().take(events).collect();
        Ok(BranchExport {
            main: self.main_document()?,
            metadata: self.metadata(branch)?,
            branch: state.record,
            commits: state.commits,
            events: recent,
        })
    }
}

impl BranchExport {
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Export: {}\n\n", self.branch.name);

        out.push_str("## Main Document\n\n");
        for (section, _) in self.main.iter() {
            out.push_str(&format!("### {}\n", section.title()));
            out.push_str(self.main.get_or_placeholder(section));
            out.push_str("\n\n");
        }

        out.push_str("## Branch\n\n");
        out.push_str(&format!("- purpose: {}\n", one_line(&self.branch.purpose)));
        if let Some(parent) = &self.branch.parent {
            out.push_str(&format!("- parent: {parent}\n"));
        }
        out.push_str(&format!("- created: {}\n", self.branch.created_at));
        out.push_str(&format!("- commits: {}\n\n", self.commits.len()));

        out.push_str("## Commit Log\n\n");
        if self.commits.is_empty() {
            out.push_str("(empty)\n\n");
        }
        for c in &self.commits {
            out.push_str(&render_commit(c));
        }

        out.push_str("## Metadata\n\n");
        if self.metadata.is_empty() {
            out.push_str("(empty)\n\n");
        } else {
            let body = serde_yaml::to_string(&self.metadata).unwrap_or_default();
            out.push_str(&format!("```yaml\n{body}```\n\n"));
        }

        out.push_str("## Recent Events\n\n");
        if self.events.is_empty() {
            out.push_str("(empty)\n");
        }
        for e in &self.events {
            out.push_str(&format!(
                "- [{}] {}: {}\n",
                e.ts,
                e.role.tag(),
                clip(&one_line(&e.payload), EVENT_CHARS)
            ));
        }
        out
    }
}
