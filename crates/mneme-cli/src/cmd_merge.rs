use std::path::Path;

/// `mneme merge <source> <target>`
pub fn execute(cwd: &Path, source: &str, target: &str) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    let out = repo.merge(source, target)?;

    println!("{}", out.target_context.render_markdown());
    println!(
        "Merged {source} into {target}: commit #{} ({} events copied)",
        out.merge_commit.seq, out.events_copied
    );
    Ok(())
}
