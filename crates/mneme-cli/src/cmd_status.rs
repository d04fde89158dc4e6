use std::path::Path;
use std::time::Duration;

fn human(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
        _ => format!("{}d{}h", secs / 86_400, (secs % 86_400) / 3600),
    }
}

/// `mneme status`
pub fn execute(cwd: &Path) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    let branch = repo.active_branch()?;
    let commits = repo.commits(&branch)?;
    let events = repo.event_count(&branch)?;

    println!("On branch {branch}");
    println!("  commits: {}", commits.len());
    println!("  events:  {events}");
    match repo.time_since_last_commit(&branch)? {
        Some(d) => {
            let title = commits.last().map(|c| c.title.as_str()).unwrap_or("");
            println!("  last commit: {} ago ({title})", human(d));
        }
        None => println!("  last commit: (none)"),
    }
    Ok(())
}
