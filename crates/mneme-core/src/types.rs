use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Branch name (e.g. "main", "try-sqlite")
pub type BranchName = String;

/// Name of the branch every repository starts on.
pub const DEFAULT_BRANCH: &str = "main";

/// Returned by `FromStr` impls for the closed enums below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseVariantError {
    pub kind: &'static str,
    pub value: String,
}

/// Phase of one agent turn (OTA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Observation,
    Thought,
    Action,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Observation, Role::Thought, Role::Action];

    /// Tag used in `log.md` headers.
    pub fn tag(self) -> &'static str {
        match self {
            Role::Observation => "OBSERVATION",
            Role::Thought => "THOUGHT",
            Role::Action => "ACTION",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Role {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observation" | "obs" => Ok(Role::Observation),
            "thought" => Ok(Role::Thought),
            "action" => Ok(Role::Action),
            _ => Err(ParseVariantError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// Which commits of a source branch a merge commit absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRange {
    pub source: BranchName,
    /// Inclusive `(first, last)` source sequence numbers; `None` when the
    /// source had no commits yet.
    pub commits: Option<(u64, u64)>,
}

/// A source-branch commit carried into the target by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarriedCommit {
    pub origin: BranchName,
    pub seq: u64,
    pub ts: String,
    pub title: String,
    pub contribution: String,
}

/// One milestone in a branch's commit log (three-block form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// 1-based, gapless per branch.
    pub seq: u64,
    pub ts: String,
    pub branch: BranchName,
    pub title: String,
    /// Branch purpose as it was when the commit was written.
    pub purpose: String,
    /// Chained fold of every earlier commit on the branch.
    pub prev_summary: String,
    pub contribution: String,
    pub external_ref: Option<String>,
    pub merged_from: Option<MergeRange>,
    pub carried: Vec<CarriedCommit>,
    /// Event log length when the commit was written. Actions after this
    /// position are the ones the next commit has not yet summarized.
    pub events_through: Option<u64>,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.merged_from.is_some()
    }
}

/// One fine-grained trace record in a branch's event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// 1-based arrival position, gapless per branch.
    pub pos: u64,
    pub ts: String,
    pub role: Role,
    pub payload: String,
    pub dedup_key: Option<String>,
    /// Branch the record was copied from by a merge.
    pub origin: Option<BranchName>,
    /// Sequence number of the merge commit that copied the record.
    pub merge_seq: Option<u64>,
    /// Branch the record was first appended on, kept when it reached this
    /// branch through more than one merge.
    pub authored_on: Option<BranchName>,
}

/// Registry entry persisted in `branches.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: BranchName,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<BranchName>,
    pub created_at: String,
}

/// One row of `Repository::list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSummary {
    pub name: BranchName,
    pub purpose: String,
    pub parent: Option<BranchName>,
    pub created_at: String,
    pub commit_count: usize,
    pub active: bool,
}

/// Closed set of Main Document sections, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MainSection {
    Purpose,
    Milestones,
    Todo,
    ActiveDecisions,
    PendingQuestions,
}

impl MainSection {
    pub const ALL: [MainSection; 5] = [
        MainSection::Purpose,
        MainSection::Milestones,
        MainSection::Todo,
        MainSection::ActiveDecisions,
        MainSection::PendingQuestions,
    ];

    /// Heading text in `main.md`.
    pub fn title(self) -> &'static str {
        match self {
            MainSection::Purpose => "Purpose",
            MainSection::Milestones => "Milestones",
            MainSection::Todo => "To-Do",
            MainSection::ActiveDecisions => "Active Decisions",
            MainSection::PendingQuestions => "Pending Questions",
        }
    }
}

impl fmt::Display for MainSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for MainSection {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "purpose" => Ok(MainSection::Purpose),
            "milestones" => Ok(MainSection::Milestones),
            "todo" => Ok(MainSection::Todo),
            "activedecisions" | "decisions" => Ok(MainSection::ActiveDecisions),
            "pendingquestions" | "questions" => Ok(MainSection::PendingQuestions),
            _ => Err(ParseVariantError {
                kind: "main section",
                value: s.to_string(),
            }),
        }
    }
}
