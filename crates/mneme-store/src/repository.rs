use crate::config::StoreConfig;
use crate::fsio::{read_optional, write_atomic};
use crate::lock::FileLock;
use crate::paths::{BranchPaths, MnemePaths};
use mneme_core::clock::now_rfc3339;
use mneme_core::commit_md::{parse_commit_log, render_commit_log};
use mneme_core::log_md::render_event_log;
use mneme_core::main_md::MainDocument;
use mneme_core::{
    BranchRecord, BranchSummary, MainSection, MemoryError, Result, DEFAULT_BRANCH,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const DEFAULT_PURPOSE: &str = "Default working branch";
const EMPTY_METADATA: &str = "{}\n";

/// On-disk shape of `branches.yaml`: creation-ordered registry.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    branches: Vec<BranchRecord>,
}

/// An open memory repository. Cheap to create; holds no locks between calls.
///
/// Every operation opens the state it needs, applies one change under the
/// relevant lock, persists with an atomic rename and returns.
#[derive(Debug, Clone)]
pub struct Repository {
    pub(crate) paths: MnemePaths,
    pub(crate) config: StoreConfig,
}

/// Validate a branch name for use as a directory name.
pub fn validate_branch_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| MemoryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() || name.len() > 64 {
        return Err(invalid("must be 1-64 characters"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(invalid("only [A-Za-z0-9._-] allowed"));
    }
    Ok(())
}

impl Repository {
    /// Initialize `.mneme/` under `workspace` with an empty Main Document and
    /// an active `main` branch. Re-running on an initialized repository only
    /// opens it; a half-finished init is completed.
    pub fn init(workspace: impl Into<PathBuf>, description: &str) -> Result<Self> {
        let paths = MnemePaths::discover(workspace);
        if paths.head_file.exists() {
            info!(root = %paths.mneme_dir.display(), "already initialized");
            return Self::open(paths.root);
        }
        paths.ensure_layout()?;

        let config = StoreConfig::load(&paths.config_json)?;
        if !paths.config_json.exists() {
            config.save(&paths.config_json)?;
        }
        let repo = Self { paths, config };

        if !repo.paths.main_md.exists() {
            let mut doc = MainDocument::default();
            if !description.trim().is_empty() {
                doc.set(MainSection::Purpose, description.trim());
            }
            write_atomic(&repo.paths.main_md, doc.render().as_bytes())?;
        }

        {
            let _lock = FileLock::acquire(&repo.paths.registry_lock, repo.config.lock_timeout())?;
            let mut registry = repo.load_registry()?;
            if !registry.branches.iter().any(|b| b.name == DEFAULT_BRANCH) {
                repo.write_branch_files(DEFAULT_BRANCH)?;
                registry.branches.push(BranchRecord {
                    name: DEFAULT_BRANCH.to_string(),
                    purpose: DEFAULT_PURPOSE.to_string(),
                    parent: None,
                    created_at: now_rfc3339(),
                });
                repo.save_registry(&registry)?;
            }
            // HEAD last: its presence marks a finished init.
            write_atomic(&repo.paths.head_file, format!("{DEFAULT_BRANCH}\n").as_bytes())?;
        }

        info!(root = %repo.paths.mneme_dir.display(), "initialized repository");
        Ok(repo)
    }

    /// Open an existing repository and run the reconciliation check.
    pub fn open(workspace: impl Into<PathBuf>) -> Result<Self> {
        let paths = MnemePaths::discover(workspace);
        if !paths.is_initialized() {
            return Err(MemoryError::NotFound(format!(
                "no repository at {} (run `mneme init` first)",
                paths.mneme_dir.display()
            )));
        }
        let config = StoreConfig::load(&paths.config_json)?;
        let repo = Self { paths, config };
        repo.reconcile()?;
        debug!(root = %repo.paths.mneme_dir.display(), "opened repository");
        Ok(repo)
    }

    pub fn paths(&self) -> &MnemePaths {
        &self.paths
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Closing releases nothing beyond dropping the handle; provided so
    /// callers can make the lifecycle explicit.
    pub fn close(self) {}

    /// HEAD names a registered branch and every registered branch has its
    /// directory. Anything else means an interrupted write we cannot repair.
    fn reconcile(&self) -> Result<()> {
        let registry = self.load_registry()?;
        let head = self.read_head()?;
        if !registry.branches.iter().any(|b| b.name == head) {
            warn!(head = %head, "HEAD names an unregistered branch");
            return Err(MemoryError::corrupt(
                &self.paths.head_file,
                format!("active branch {head:?} is not registered"),
            ));
        }
        for b in &registry.branches {
            let bp = self.paths.branch(&b.name);
            if !bp.dir.is_dir() {
                warn!(branch = %b.name, "registered branch has no directory");
                return Err(MemoryError::corrupt(
                    &self.paths.branches_yaml,
                    format!("branch {:?} is registered but {} is missing", b.name, bp.dir.display()),
                ));
            }
        }
        Ok(())
    }

    fn read_head(&self) -> Result<String> {
        let content = read_optional(&self.paths.head_file)?
            .ok_or_else(|| MemoryError::corrupt(&self.paths.head_file, "HEAD is missing"))?;
        let name = content.trim();
        if name.is_empty() {
            return Err(MemoryError::corrupt(&self.paths.head_file, "HEAD is empty"));
        }
        Ok(name.to_string())
    }

    fn load_registry(&self) -> Result<RegistryFile> {
        match read_optional(&self.paths.branches_yaml)? {
            Some(content) => serde_yaml::from_str(&content).map_err(|e| {
                MemoryError::corrupt(&self.paths.branches_yaml, format!("invalid registry: {e}"))
            }),
            None => Ok(RegistryFile::default()),
        }
    }

    fn save_registry(&self, registry: &RegistryFile) -> Result<()> {
        let yaml = serde_yaml::to_string(registry).map_err(|e| {
            MemoryError::corrupt(&self.paths.branches_yaml, format!("cannot serialize registry: {e}"))
        })?;
        write_atomic(&self.paths.branches_yaml, yaml.as_bytes())
    }

    fn write_branch_files(&self, name: &str) -> Result<()> {
        let bp = self.paths.branch(name);
        std::fs::create_dir_all(&bp.dir)?;
        write_atomic(&bp.commit_md, render_commit_log(name, &[]).as_bytes())?;
        write_atomic(&bp.log_md, render_event_log(name, &[]).as_bytes())?;
        write_atomic(&bp.metadata_yaml, EMPTY_METADATA.as_bytes())?;
        Ok(())
    }

    /// Registry entry for `name`, or `UnknownBranch`.
    pub fn branch_record(&self, name: &str) -> Result<BranchRecord> {
        self.load_registry()?
            .branches
            .into_iter()
            .find(|b| b.name == name)
            .ok_or_else(|| MemoryError::UnknownBranch(name.to_string()))
    }

    /// Paths for a registered branch, or `UnknownBranch`.
    pub(crate) fn registered_branch(&self, name: &str) -> Result<(BranchRecord, BranchPaths)> {
        let record = self.branch_record(name)?;
        Ok((record, self.paths.branch(name)))
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .load_registry()?
            .branches
            .iter()
            .any(|b| b.name == name))
    }

    /// Name of the single active branch.
    pub fn active_branch(&self) -> Result<String> {
        self.read_head()
    }

    /// Register a new branch with empty logs and metadata. The branch that
    /// was active becomes its parent. With `activate`, HEAD moves to it.
    pub fn create_branch(&self, name: &str, purpose: &str, activate: bool) -> Result<BranchRecord> {
        validate_branch_name(name)?;
        let _lock = FileLock::acquire(&self.paths.registry_lock, self.config.lock_timeout())?;

        let mut registry = self.load_registry()?;
        if registry.branches.iter().any(|b| b.name == name) {
            return Err(MemoryError::DuplicateBranch(name.to_string()));
        }
        let parent = self.read_head()?;

        self.write_branch_files(name)?;
        let record = BranchRecord {
            name: name.to_string(),
            purpose: purpose.trim().to_string(),
            parent: Some(parent),
            created_at: now_rfc3339(),
        };
        registry.branches.push(record.clone());
        self.save_registry(&registry)?;

        if activate {
            write_atomic(&self.paths.head_file, format!("{name}\n").as_bytes())?;
        }
        info!(branch = %name, activate, "created branch");
        Ok(record)
    }

    /// Make `name` the active branch. The single HEAD pointer is swapped with
    /// one atomic rename, so two branches are never active at once.
    pub fn activate(&self, name: &str) -> Result<()> {
        let _lock = FileLock::acquire(&self.paths.registry_lock, self.config.lock_timeout())?;
        let registry = self.load_registry()?;
        if !registry.branches.iter().any(|b| b.name == name) {
            return Err(MemoryError::UnknownBranch(name.to_string()));
        }
        write_atomic(&self.paths.head_file, format!("{name}\n").as_bytes())?;
        info!(branch = %name, "activated branch");
        Ok(())
    }

    /// Creation-ordered branch summaries.
    pub fn list(&self) -> Result<Vec<BranchSummary>> {
        let registry = self.load_registry()?;
        let head = self.read_head()?;
        let mut out = Vec::with_capacity(registry.branches.len());
        for b in registry.branches {
            let commit_md = self.paths.branch(&b.name).commit_md;
            let commit_count = match read_optional(&commit_md)? {
                Some(content) => parse_commit_log(&content, &commit_md)?.len(),
                None => {
                    return Err(MemoryError::corrupt(&commit_md, "commit log is missing"));
                }
            };
            out.push(BranchSummary {
                active: b.name == head,
                commit_count,
                name: b.name,
                purpose: b.purpose,
                parent: b.parent,
                created_at: b.created_at,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Repository) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init(tmp.path(), "Agent memory for the demo project").unwrap();
        (tmp, repo)
    }

    #[test]
    fn init_creates_active_main() {
        let (_tmp, repo) = setup();
        assert_eq!(repo.active_branch().unwrap(), "main");
        let list = repo.list().unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].active);
        assert_eq!(list[0].commit_count, 0);
        assert!(repo.paths.branch("main").log_md.exists());
        assert!(repo.paths.branch("main").metadata_yaml.exists());
    }

    #[test]
    fn init_is_idempotent() {
        let (tmp, repo) = setup();
        repo.create_branch("spike", "try things", true).unwrap();
        let again = Repository::init(tmp.path(), "ignored").unwrap();
        assert_eq!(again.active_branch().unwrap(), "spike");
        assert_eq!(again.list().unwrap().len(), 2);
    }

    #[test]
    fn open_without_init_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::open(tmp.path()),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[test]
    fn create_with_activation_leaves_exactly_one_active() {
        let (_tmp, repo) = setup();
        for name in ["a", "b.2", "c_3-x"] {
            repo.create_branch(name, "purpose", true).unwrap();
            let list = repo.list().unwrap();
            let active: Vec<_> = list.iter().filter(|b| b.active).collect();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].name, name);
        }
    }

    #[test]
    fn create_without_activation_keeps_head_and_records_parent() {
        let (_tmp, repo) = setup();
        let rec = repo.create_branch("spike", "  try sqlite  ", false).unwrap();
        assert_eq!(rec.parent.as_deref(), Some("main"));
        assert_eq!(rec.purpose, "try sqlite");
        assert_eq!(repo.active_branch().unwrap(), "main");
    }

    #[test]
    fn duplicate_branch_leaves_state_untouched() {
        let (_tmp, repo) = setup();
        repo.create_branch("spike", "first", false).unwrap();
        let before = std::fs::read(&repo.paths.branches_yaml).unwrap();
        let err = repo.create_branch("spike", "second", true).unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateBranch(_)));
        assert_eq!(std::fs::read(&repo.paths.branches_yaml).unwrap(), before);
        assert_eq!(repo.active_branch().unwrap(), "main");
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (_tmp, repo) = setup();
        for name in ["", "../escape", "a/b", ".hidden", "sp ace"] {
            let err = repo.create_branch(name, "", false).unwrap_err();
            assert!(matches!(err, MemoryError::InvalidName { .. }), "{name:?}");
        }
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn activate_unknown_branch_fails() {
        let (_tmp, repo) = setup();
        let err = repo.activate("nope").unwrap_err();
        assert!(matches!(err, MemoryError::UnknownBranch(_)));
        assert_eq!(repo.active_branch().unwrap(), "main");
    }

    #[test]
    fn list_is_creation_ordered_and_restartable() {
        let (_tmp, repo) = setup();
        repo.create_branch("zeta", "", false).unwrap();
        repo.create_branch("alpha", "", false).unwrap();
        let names: Vec<String> = repo.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, ["main", "zeta", "alpha"]);
        let again: Vec<String> = repo.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn head_naming_unregistered_branch_is_corrupt() {
        let (tmp, repo) = setup();
        std::fs::write(&repo.paths.head_file, "ghost\n").unwrap();
        assert!(matches!(
            Repository::open(tmp.path()),
            Err(MemoryError::Corrupt { .. })
        ));
    }

    #[test]
    fn missing_branch_dir_is_corrupt() {
        let (tmp, repo) = setup();
        repo.create_branch("spike", "", false).unwrap();
        std::fs::remove_dir_all(repo.paths.branch("spike").dir).unwrap();
        assert!(matches!(
            Repository::open(tmp.path()),
            Err(MemoryError::Corrupt { .. })
        ));
    }
}
