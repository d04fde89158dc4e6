//! Persistent, versioned working memory for coding agents.
//!
//! A [`Repository`] lives in `<workspace>/.mneme/` and holds a branch
//! registry, a per-branch commit log and event log, per-branch metadata and a
//! project-wide Main Document. All writes go through an exclusive file lock
//! and an atomic rename.

pub mod branch;
pub mod config;
pub mod context;
pub mod export;
pub mod fsio;
pub mod lock;
pub mod main_doc;
pub mod merge;
pub mod metadata;
pub mod paths;
pub mod repository;

pub use branch::{AppendOutcome, CommitRequest, EventRequest, EventTail, MirrorFn};
pub use config::StoreConfig;
pub use context::{
    BranchContext, CommitContext, Context, ContextQuery, MetadataContext, ProjectContext,
    TraceContext,
};
pub use export::BranchExport;
pub use merge::MergeOutcome;
pub use paths::MnemePaths;
pub use repository::{validate_branch_name, Repository};
