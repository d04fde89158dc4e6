//! Read-only context projections. Nothing here takes a lock or writes; every
//! call re-reads the persisted files.

use crate::repository::Repository;
use mneme_core::main_md::MainDocument;
use mneme_core::{BranchRecord, BranchSummary, Commit, LogEntry, MemoryError, Result};

/// Which resolution to project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextQuery {
    Project,
    /// `depth` defaults to the configured `context_depth`; `offset` skips
    /// that many of the newest commits.
    Branch {
        branch: String,
        depth: Option<usize>,
        offset: usize,
    },
    /// `index` counts back from the newest commit (0 = latest).
    Commit { branch: String, index: usize },
    /// `limit` defaults to the configured `trace_limit`; `offset` skips that
    /// many of the newest events.
    Trace {
        branch: String,
        limit: Option<usize>,
        offset: usize,
    },
    Metadata { branch: String, section: String },
}

#[derive(Debug, Clone)]
pub enum Context {
    Project(ProjectContext),
    Branch(BranchContext),
    Commit(CommitContext),
    Trace(TraceContext),
    Metadata(MetadataContext),
}

#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub main: MainDocument,
    pub branches: Vec<BranchSummary>,
}

#[derive(Debug, Clone)]
pub struct BranchContext {
    pub branch: BranchRecord,
    pub commit_count: usize,
    /// Newest commits skipped before `commits`.
    pub offset: usize,
    /// Newest first.
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone)]
pub struct CommitContext {
    pub index: usize,
    pub commit: Commit,
}

#[derive(Debug, Clone)]
pub struct TraceContext {
    pub branch: String,
    pub total: usize,
    pub offset: usize,
    /// Newest first.
    pub events: Vec<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct MetadataContext {
    pub branch: String,
    pub section: String,
    pub value: serde_yaml::Value,
}

impl Repository {
    pub fn context(&self, query: &ContextQuery) -> Result<Context> {
        Ok(match query {
            ContextQuery::Project => Context::Project(self.project_context()?),
            ContextQuery::Branch {
                branch,
                depth,
                offset,
            } => Context::Branch(self.branch_context(branch, *depth, *offset)?),
            ContextQuery::Commit { branch, index } => {
                Context::Commit(self.commit_context(branch, *index)?)
            }
            ContextQuery::Trace {
                branch,
                limit,
                offset,
            } => Context::Trace(self.trace_context(branch, *limit, *offset)?),
            ContextQuery::Metadata { branch, section } => {
                Context::Metadata(self.metadata_context(branch, section)?)
            }
        })
    }

    pub fn project_context(&self) -> Result<ProjectContext> {
        Ok(ProjectContext {
            main: self.main_document()?,
            branches: self.list()?,
        })
    }

    pub fn branch_context(
        &self,
        branch: &str,
        depth: Option<usize>,
        offset: usize,
    ) -> Result<BranchContext> {
        let state = self.load_for_context(branch)?;
        let depth = depth.unwrap_or(self.config.context_depth);
        let commit_count = state.commits.len();
        let commits = state
            .commits
            .into_iter()
            .rev()
            .skip(offset)
            .take(depth)
            .collect();
        Ok(BranchContext {
            branch: state.record,
            commit_count,
            offset,
            commits,
        })
    }

    pub fn commit_context(&self, branch: &str, index: usize) -> Result<CommitContext> {
        let mut commits = self.load_for_context(branch)?.commits;
        let count = commits.len();
        if index >= count {
            return Err(MemoryError::NotFound(format!(
                "commit index {index} on branch {branch:?} ({count} commits)"
            )));
        }
        Ok(CommitContext {
            index,
            commit: commits.swap_remove(count - 1 - index),
        })
    }

    pub fn trace_context(
        &self,
        branch: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<TraceContext> {
        let events = self.load_for_context(branch)?.events;
        let limit = limit.unwrap_or(self.config.trace_limit);
        Ok(TraceContext {
            branch: branch.to_string(),
            total: events.len(),
            offset,
            events: events.into_iter().rev().skip(offset).take(limit).collect(),
        })
    }

    pub fn metadata_context(&self, branch: &str, section: &str) -> Result<MetadataContext> {
        self.load_for_context(branch)?;
        let value = self.metadata_section(branch, section)?.ok_or_else(|| {
            MemoryError::NotFound(format!("metadata section {section:?} on branch {branch:?}"))
        })?;
        Ok(MetadataContext {
            branch: branch.to_string(),
            section: section.to_string(),
            value,
        })
    }

    pub(crate) fn load_for_context(&self, branch: &str) -> Result<crate::branch::BranchState> {
        self.load_branch(branch).map_err(|e| match e {
            MemoryError::UnknownBranch(name) => MemoryError::NotFound(format!("branch {name:?}")),
            other => other,
        })
    }
}

impl Context {
    pub fn render_markdown(&self) -> String {
        match self {
            Context::Project(c) => c.render_markdown(),
            Context::Branch(c) => c.render_markdown(),
            Context::Commit(c) => c.render_markdown(),
            Context::Trace(c) => c.render_markdown(),
            Context::Metadata(c) => c.render_markdown(),
        }
    }
}

impl ProjectContext {
    pub fn render_markdown(&self) -> String {
        let mut out = String::from("# Project Context\n\n");
        for (section, _) in self.main.iter() {
            out.push_str(&format!("## {}\n", section.title()));
            out.push_str(self.main.get_or_placeholder(section));
            out.push_str("\n\n");
        }
        out.push_str("## Branches\n");
        for b in &self.branches {
            let marker = if b.active { "*" } else { "-" };
            out.push_str(&format!("{marker} {} ({} commits)", b.name, b.commit_count));
            if !b.purpose.is_empty() {
                out.push_str(&format!(": {}", b.purpose));
            }
            if let Some(parent) = &b.parent {
                out.push_str(&format!(" [from {parent}]"));
            }
            out.push('\n');
        }
        out
    }
}

fn render_commit_blocks(out: &mut String, c: &Commit) {
    out.push_str(&format!("### Commit {}: {}\n", c.seq, c.title));
    out.push_str(&format!("- timestamp: {}\n", c.ts));
    if let Some(r) = &c.external_ref {
        out.push_str(&format!("- external-ref: {r}\n"));
    }
    if let Some(m) = &c.merged_from {
        match m.commits {
            Some((a, b)) => out.push_str(&format!("- merged-from: {} commits {a}-{b}\n", m.source)),
            None => out.push_str(&format!("- merged-from: {} (no commits)\n", m.source)),
        }
    }
    out.push_str(&format!("\n**Branch Purpose:** {}\n\n", c.purpose));
    out.push_str(&format!("**Previous Progress Summary:**\n{}\n\n", c.prev_summary));
    out.push_str(&format!("**This Commit's Contribution:**\n{}\n\n", c.contribution));
    if !c.carried.is_empty() {
        out.push_str("**Merged Commits:**\n");
        for cc in &c.carried {
            out.push_str(&format!("- {} #{} {}: {}\n", cc.origin, cc.seq, cc.title, cc.ts));
        }
        out.push('\n');
    }
}

impl BranchContext {
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Branch: {}\n\n", self.branch.name);
        out.push_str(&format!("**Purpose:** {}\n", self.branch.purpose));
        if self.offset == 0 {
            out.push_str(&format!(
                "**Commits:** {} (showing latest {})\n\n",
                self.commit_count,
                self.commits.len()
            ));
        } else {
            out.push_str(&format!(
                "**Commits:** {} (showing {} after skipping the newest {})\n\n",
                self.commit_count,
                self.commits.len(),
                self.offset
            ));
        }
        if self.commits.is_empty() {
            out.push_str("(no commits)\n");
        }
        for c in &self.commits {
            render_commit_blocks(&mut out, c);
        }
        out
    }
}

impl CommitContext {
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Commit {} on {}\n\n", self.commit.seq, self.commit.branch);
        render_commit_blocks(&mut out, &self.commit);
        out
    }
}

impl TraceContext {
    pub fn render_markdown(&self) -> String {
        let mut out = if self.offset == 0 {
            format!(
                "# Trace: {} (latest {} of {})\n\n",
                self.branch,
                self.events.len(),
                self.total
            )
        } else {
            format!(
                "# Trace: {} ({} of {}, skipping the newest {})\n\n",
                self.branch,
                self.events.len(),
                self.total,
                self.offset
            )
        };
        for e in &self.events {
            out.push_str(&format!("## [{}] {} @ {}", e.pos, e.role.tag(), e.ts));
            match (&e.origin, &e.authored_on) {
                (Some(origin), Some(first)) => {
                    out.push_str(&format!(" (from {origin}, authored on {first})"))
                }
                (Some(origin), None) => out.push_str(&format!(" (from {origin})")),
                _ => {}
            }
            out.push_str(&format!("\n{}\n\n", e.payload));
        }
        out
    }
}

impl MetadataContext {
    pub fn render_markdown(&self) -> String {
        let body = serde_yaml::to_string(&self.value).unwrap_or_default();
        format!(
            "# Metadata: {} / {}\n\n```yaml\n{}```\n",
            self.branch, self.section, body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{CommitRequest, EventRequest};
    use mneme_core::{MainSection, Role};

    fn setup() -> (tempfile::TempDir, Repository) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init(tmp.path(), "Memory for agents").unwrap();
        (tmp, repo)
    }

    #[test]
    fn project_context_lists_sections_and_branches() {
        let (_tmp, repo) = setup();
        repo.create_branch("spike", "try sqlite", false).unwrap();
        repo.update_main(MainSection::Todo, "- wire hooks").unwrap();
        let Context::Project(ctx) = repo.context(&ContextQuery::Project).unwrap() else {
            panic!("expected project context");
        };
        assert_eq!(ctx.branches.len(), 2);
        let md = ctx.render_markdown();
        assert!(md.contains("## Purpose\nMemory for agents"));
        assert!(md.contains("## Milestones\n(unset)"));
        assert!(md.contains("* main (0 commits)"));
        assert!(md.contains("- spike (0 commits): try sqlite [from main]"));
    }

    #[test]
    fn branch_context_is_newest_first_and_limited() {
        let (_tmp, repo) = setup();
        for t in ["one", "two", "three"] {
            repo.commit("main", CommitRequest::new(t).contribution(t), None).unwrap();
        }
        let ctx = repo.branch_context("main", Some(2), 0).unwrap();
        let titles: Vec<&str> = ctx.commits.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["three", "two"]);
        assert_eq!(ctx.commit_count, 3);
        assert!(ctx.render_markdown().contains("(showing latest 2)"));
    }

    #[test]
    fn branch_offset_pages_back_through_history() {
        let (_tmp, repo) = setup();
        for t in ["one", "two", "three", "four"] {
            repo.commit("main", CommitRequest::new(t).contribution(t), None).unwrap();
        }
        let page = repo.branch_context("main", Some(2), 2).unwrap();
        let titles: Vec<&str> = page.commits.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["two", "one"]);
        assert!(page
            .render_markdown()
            .contains("(showing 2 after skipping the newest 2)"));
        assert!(repo.branch_context("main", Some(2), 10).unwrap().commits.is_empty());
    }

    #[test]
    fn trace_offset_skips_newest_events() {
        let (_tmp, repo) = setup();
        for i in 0..6 {
            repo.append_event("main", EventRequest::new(Role::Thought, format!("t{i}")))
                .unwrap();
        }
        let Context::Trace(ctx) = repo
            .context(&ContextQuery::Trace {
                branch: "main".into(),
                limit: Some(2),
                offset: 3,
            })
            .unwrap()
        else {
            panic!("expected trace context");
        };
        let payloads: Vec<&str> = ctx.events.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, ["t2", "t1"]);
        assert_eq!((ctx.total, ctx.offset), (6, 3));
    }

    #[test]
    fn unknown_branch_is_not_found() {
        let (_tmp, repo) = setup();
        let err = repo.branch_context("ghost", None, 0).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn commit_index_past_end_is_not_found() {
        let (_tmp, repo) = setup();
        repo.commit("main", CommitRequest::new("only").contribution("x"), None).unwrap();
        assert_eq!(repo.commit_context("main", 0).unwrap().commit.title, "only");
        assert!(matches!(
            repo.commit_context("main", 1),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[test]
    fn trace_context_defaults_to_config_limit() {
        let (_tmp, repo) = setup();
        for i in 0..25 {
            repo.append_event("main", EventRequest::new(Role::Action, format!("a{i}")))
                .unwrap();
        }
        let ctx = repo.trace_context("main", None, 0).unwrap();
        assert_eq!(ctx.events.len(), repo.config().trace_limit);
        assert_eq!(ctx.events[0].payload, "a24");
        assert_eq!(ctx.total, 25);
    }

    #[test]
    fn missing_metadata_section_is_not_found() {
        let (_tmp, repo) = setup();
        let err = repo.metadata_context("main", "dependencies").unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn context_does_not_write() {
        let (_tmp, repo) = setup();
        repo.commit("main", CommitRequest::new("t").contribution("c"), None).unwrap();
        let bp = repo.paths().branch("main");
        let before = std::fs::read(&bp.commit_md).unwrap();
        let _ = repo.context(&ContextQuery::Branch {
            branch: "main".into(),
            depth: None,
            offset: 0,
        });
        let _ = repo.context(&ContextQuery::Project);
        assert_eq!(std::fs::read(&bp.commit_md).unwrap(), before);
    }
}
