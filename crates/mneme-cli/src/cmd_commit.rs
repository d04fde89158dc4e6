use anyhow::bail;
use mneme_core::Commit;
use mneme_store::CommitRequest;
use std::path::Path;
use std::process::Command as ProcessCommand;
use tracing::debug;

pub struct CommitParams<'a> {
    pub cwd: &'a Path,
    pub title: String,
    pub message: Option<String>,
    pub external_ref: Option<String>,
    pub git: bool,
}

/// `mneme commit -t <title> [-m <notes>] [--ref <rev>] [--git]`
pub fn execute(p: CommitParams<'_>) -> anyhow::Result<()> {
    let repo = crate::open_repo(p.cwd)?;
    let branch = repo.active_branch()?;

    let mut request = CommitRequest::new(p.title);
    request.contribution = p.message;
    request.external_ref = p.external_ref;

    let workspace = repo.paths().root.clone();
    let mirror = move |c: &Commit| -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Some(git_mirror(&workspace, c)?))
    };
    let commit = if p.git {
        repo.commit(&branch, request, Some(&mirror))?
    } else {
        repo.commit(&branch, request, None)?
    };

    println!("[{branch} #{}] {}", commit.seq, commit.title);
    if let Some(r) = &commit.external_ref {
        println!("  ref: {r}");
    }
    Ok(())
}

fn run_git(root: &Path, args: &[&str]) -> anyhow::Result<String> {
    debug!(?args, "running git");
    let output = ProcessCommand::new("git")
        .args(args)
        .current_dir(root)
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Commit the whole workspace with the memory commit's title and
/// contribution as the message. Returns the new `HEAD` revision.
fn git_mirror(root: &Path, c: &Commit) -> anyhow::Result<String> {
    run_git(root, &["add", "-A"])?;
    let message = format!("{}\n\n{}", c.title, c.contribution);
    run_git(root, &["commit", "--allow-empty", "-q", "-m", &message])?;
    let rev = run_git(root, &["rev-parse", "HEAD"])?;
    debug!(rev = %rev, seq = c.seq, "workspace mirrored to git");
    Ok(rev)
}
