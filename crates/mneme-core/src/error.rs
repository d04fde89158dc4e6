//! Error taxonomy shared by every mneme crate that touches the store.

use std::path::PathBuf;
use thiserror::Error;

/// Every way a store operation can fail.
///
/// Validation errors (`DuplicateBranch`, `UnknownBranch`, `SelfMerge`,
/// `OutOfRange`, `InvalidName`) are raised before anything is written, so the
/// repository is byte-identical afterwards.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A branch with this name is already registered.
    #[error("branch already exists: {0}")]
    DuplicateBranch(String),

    /// No branch with this name is registered.
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// Source and target of a merge are the same branch.
    #[error("cannot merge branch {0} into itself")]
    SelfMerge(String),

    /// Commit index counted from the newest commit is past the end of the log.
    #[error("commit index {index} out of range (branch has {count} commits)")]
    OutOfRange {
        /// Requested index, 0 = latest
        index: usize,
        /// Number of commits on the branch
        count: usize,
    },

    /// A context projection asked for something that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Branch name cannot be used as a directory name.
    #[error("invalid branch name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Lock could not be acquired within the configured wait.
    #[error("lock busy: {} (waited {waited_ms}ms)", path.display())]
    Busy {
        /// Lock file that stayed held
        path: PathBuf,
        /// How long we polled before giving up
        waited_ms: u64,
    },

    /// A persisted file cannot be parsed or contradicts another file.
    #[error("corrupt store file {}: {reason}", path.display())]
    Corrupt {
        /// Offending file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error was raised before any write happened.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateBranch(_)
                | Self::UnknownBranch(_)
                | Self::SelfMerge(_)
                | Self::OutOfRange { .. }
                | Self::InvalidName { .. }
        )
    }

    /// Returns a user-facing hint for recovering from the error, if there is one.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::UnknownBranch(_) => Some("Run 'mneme branch list' to see registered branches."),
            Self::DuplicateBranch(_) => {
                Some("Pick another name, or 'mneme switch' to the existing branch.")
            }
            Self::Busy { .. } => {
                Some("Another process is writing this branch. Retry shortly.")
            }
            Self::Corrupt { .. } => Some(
                "Memory may be stale or untrustworthy. Inspect the file by hand before writing again.",
            ),
            Self::InvalidName { .. } => Some("Branch names use [A-Za-z0-9._-], 1-64 characters."),
            _ => None,
        }
    }
}

/// Convenience Result type for store operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(MemoryError::SelfMerge("main".into()).is_validation());
        assert!(MemoryError::OutOfRange { index: 3, count: 1 }.is_validation());
        assert!(!MemoryError::NotFound("x".into()).is_validation());
        assert!(!MemoryError::corrupt("/tmp/x", "bad").is_validation());
    }

    #[test]
    fn messages_name_the_subject() {
        let e = MemoryError::corrupt("/repo/branches/main/commit.md", "sequence gap");
        let msg = e.to_string();
        assert!(msg.contains("commit.md"));
        assert!(msg.contains("sequence gap"));
        assert_eq!(
            MemoryError::OutOfRange { index: 2, count: 2 }.to_string(),
            "commit index 2 out of range (branch has 2 commits)"
        );
    }
}
