use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum MetadataCmd {
    /// Rescan the workspace (file_structure, dependencies, env_config)
    Refresh {
        /// Only this section
        #[arg(long)]
        section: Option<String>,
        /// Target branch (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Replace one section with a YAML value
    Set {
        section: String,
        /// YAML text, e.g. '[a, b]' or '{key: value}'
        yaml: String,
        /// Target branch (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,
    },
}

pub fn run(cmd: MetadataCmd, cwd: &Path) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    match cmd {
        MetadataCmd::Refresh { section, branch } => {
            let branch = crate::resolve_branch(&repo, branch)?;
            let written = repo.refresh_metadata(&branch, section.as_deref())?;
            println!("Refreshed {} on {branch}", written.join(", "));
        }
        MetadataCmd::Set {
            section,
            yaml,
            branch,
        } => {
            let branch = crate::resolve_branch(&repo, branch)?;
            let value: serde_yaml::Value =
                serde_yaml::from_str(&yaml).context("metadata value is not valid YAML")?;
            repo.set_metadata(&branch, &section, value)?;
            println!("Set {section} on {branch}");
        }
    }
    Ok(())
}
