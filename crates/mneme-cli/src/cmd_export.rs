use mneme_store::fsio::write_atomic;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ExportParams<'a> {
    pub cwd: &'a Path,
    pub branch: Option<String>,
    pub limit: usize,
    pub output: PathBuf,
}

/// `mneme export [--branch] [--limit N] [--output PATH]`
pub fn execute(p: ExportParams<'_>) -> anyhow::Result<()> {
    let repo = crate::open_repo(p.cwd)?;
    let branch = crate::resolve_branch(&repo, p.branch)?;
    let export = repo.export(&branch, p.limit)?;

    let output = p.cwd.join(&p.output);
    write_atomic(&output, export.render_markdown().as_bytes())?;
    info!(branch = %branch, path = %output.display(), "branch exported");
    println!("Exported branch {branch} to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_store::{CommitRequest, Repository};

    #[test]
    fn export_writes_markdown_file() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init(tmp.path(), "demo").unwrap();
        repo.commit("main", CommitRequest::new("Init").contribution("skeleton"), None)
            .unwrap();
        execute(ExportParams {
            cwd: tmp.path(),
            branch: None,
            limit: 10,
            output: PathBuf::from("out/context-export.md"),
        })
        .unwrap();
        let text = std::fs::read_to_string(tmp.path().join("out/context-export.md")).unwrap();
        assert!(text.starts_with("# Export: main\n"));
        assert!(text.contains("### Commit 1: Init"));
    }
}
