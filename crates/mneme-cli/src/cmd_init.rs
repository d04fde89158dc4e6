use mneme_store::Repository;
use std::path::Path;

/// `mneme init [--description]`
pub fn execute(cwd: &Path, description: &str) -> anyhow::Result<()> {
    let repo = Repository::init(cwd, description)?;
    println!("Initialized {}", repo.paths().mneme_dir.display());
    println!("  active branch: {}", repo.active_branch()?);
    Ok(())
}
