use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum BranchCmd {
    /// Create a branch off the active one
    Create {
        /// Branch name ([A-Za-z0-9._-], 1-64 chars)
        name: String,
        /// What the branch is for
        #[arg(long, default_value = "")]
        purpose: String,
        /// Make the new branch active
        #[arg(long)]
        activate: bool,
    },
    /// List branches in creation order
    List,
}

pub fn run(cmd: BranchCmd, cwd: &Path) -> anyhow::Result<()> {
    match cmd {
        BranchCmd::Create {
            name,
            purpose,
            activate,
        } => create(cwd, &name, &purpose, activate),
        BranchCmd::List => list(cwd),
    }
}

fn create(cwd: &Path, name: &str, purpose: &str, activate: bool) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    let record = repo.create_branch(name, purpose, activate)?;
    let parent = record.parent.as_deref().unwrap_or("-");
    if activate {
        println!("Created and switched to {name} (from {parent})");
    } else {
        println!("Created {name} (from {parent})");
    }
    Ok(())
}

fn list(cwd: &Path) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    for b in repo.list()? {
        let marker = if b.active { "*" } else { " " };
        let purpose = if b.purpose.is_empty() {
            String::new()
        } else {
            format!("  {}", b.purpose)
        };
        println!("{marker} {:<24} {:>4} commits{purpose}", b.name, b.commit_count);
    }
    Ok(())
}

/// `mneme switch <name>`
pub fn switch(cwd: &Path, name: &str) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    repo.activate(name)?;
    println!("Switched to {name}");
    Ok(())
}
