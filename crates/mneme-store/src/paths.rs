use std::path::{Path, PathBuf};

/// All well-known paths under `.mneme/`.
#[derive(Debug, Clone)]
pub struct MnemePaths {
    /// Workspace the memory describes (metadata scans start here).
    pub root: PathBuf,
    pub mneme_dir: PathBuf,
    pub head_file: PathBuf,
    pub branches_yaml: PathBuf,
    pub branches_dir: PathBuf,
    pub main_md: PathBuf,
    pub config_json: PathBuf,
    pub registry_lock: PathBuf,
    pub main_lock: PathBuf,
}

/// Paths of one branch directory.
#[derive(Debug, Clone)]
pub struct BranchPaths {
    pub dir: PathBuf,
    pub commit_md: PathBuf,
    pub log_md: PathBuf,
    pub metadata_yaml: PathBuf,
    pub lock_file: PathBuf,
}

impl MnemePaths {
    /// Derive all paths from a workspace root. Pure computation, no I/O.
    pub fn discover(workspace_root: impl Into<PathBuf>) -> Self {
        let root = workspace_root.into();
        let mneme_dir = root.join(".mneme");
        Self {
            head_file: mneme_dir.join("HEAD"),
            branches_yaml: mneme_dir.join("branches.yaml"),
            branches_dir: mneme_dir.join("branches"),
            main_md: mneme_dir.join("main.md"),
            config_json: mneme_dir.join("config.json"),
            registry_lock: mneme_dir.join("registry.lock"),
            main_lock: mneme_dir.join("main.lock"),
            mneme_dir,
            root,
        }
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.branches_dir)
    }

    /// Check whether `.mneme/` exists.
    pub fn is_initialized(&self) -> bool {
        self.mneme_dir.is_dir()
    }

    /// Resolve `.mneme/branches/<name>/`.
    pub fn branch(&self, name: &str) -> BranchPaths {
        let dir = self.branches_dir.join(name);
        BranchPaths {
            commit_md: dir.join("commit.md"),
            log_md: dir.join("log.md"),
            metadata_yaml: dir.join("metadata.yaml"),
            lock_file: dir.join(".lock"),
            dir,
        }
    }

    /// Walk up from `start` looking for a directory containing `.mneme/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".mneme").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_builds_correct_paths() {
        let p = MnemePaths::discover("/tmp/repo");
        assert_eq!(p.mneme_dir, PathBuf::from("/tmp/repo/.mneme"));
        assert_eq!(p.head_file, PathBuf::from("/tmp/repo/.mneme/HEAD"));
        assert_eq!(p.main_md, PathBuf::from("/tmp/repo/.mneme/main.md"));
        let b = p.branch("spike");
        assert_eq!(b.commit_md, PathBuf::from("/tmp/repo/.mneme/branches/spike/commit.md"));
        assert_eq!(b.log_md, PathBuf::from("/tmp/repo/.mneme/branches/spike/log.md"));
        assert_eq!(
            b.metadata_yaml,
            PathBuf::from("/tmp/repo/.mneme/branches/spike/metadata.yaml")
        );
    }

    #[test]
    fn find_root_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        let p = MnemePaths::discover(tmp.path());
        p.ensure_layout().unwrap();
        let nested = tmp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(MnemePaths::find_root(&nested).as_deref(), Some(tmp.path()));
    }
}
