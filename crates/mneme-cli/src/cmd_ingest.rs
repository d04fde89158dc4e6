use std::path::Path;

/// `mneme ingest <path> [--branch]`
pub fn execute(cwd: &Path, path: &Path, branch: Option<String>) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    let branch = crate::resolve_branch(&repo, branch)?;
    let stats = mneme_transcript::ingest_transcript(&repo, &branch, path)?;

    println!(
        "Ingested {} into {branch}: {} new events, {} already present, {} commits",
        path.display(),
        stats.events_appended,
        stats.events_present,
        stats.commits_created
    );
    if stats.records_skipped > 0 {
        println!("  skipped {} unparsable lines", stats.records_skipped);
    }
    Ok(())
}
