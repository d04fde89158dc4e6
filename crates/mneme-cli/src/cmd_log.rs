use mneme_core::Role;
use mneme_store::{AppendOutcome, EventRequest};
use std::path::Path;

/// `mneme log <role> <text> [--dedup KEY] [--branch NAME]`
pub fn execute(
    cwd: &Path,
    role: &str,
    text: String,
    dedup: Option<String>,
    branch: Option<String>,
) -> anyhow::Result<()> {
    let role: Role = role.parse()?;
    let repo = crate::open_repo(cwd)?;
    let branch = crate::resolve_branch(&repo, branch)?;

    let mut req = EventRequest::new(role, text);
    if let Some(key) = dedup {
        req = req.dedup(key);
    }
    match repo.append_event(&branch, req)? {
        AppendOutcome::Appended(e) => println!("[{}] {} on {branch}", e.pos, e.role),
        AppendOutcome::AlreadyPresent { pos } => {
            println!("already present at [{pos}] on {branch}")
        }
    }
    Ok(())
}
