use clap::Subcommand;
use mneme_core::MainSection;
use std::path::Path;

#[derive(Subcommand)]
pub enum MainCmd {
    /// Replace one section wholesale
    Set {
        /// Purpose | Milestones | To-Do | Active Decisions | Pending Questions
        section: String,
        /// New section content
        content: String,
    },
    /// Print one section, or the whole document
    Get {
        section: Option<String>,
    },
}

pub fn run(cmd: MainCmd, cwd: &Path) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    match cmd {
        MainCmd::Set { section, content } => {
            let section: MainSection = section.parse()?;
            repo.update_main(section, &content)?;
            println!("Updated {section}");
        }
        MainCmd::Get { section: Some(s) } => {
            let section: MainSection = s.parse()?;
            println!("{}", repo.main_section(section)?);
        }
        MainCmd::Get { section: None } => {
            let doc = repo.main_document()?;
            for (section, _) in doc.iter() {
                println!("## {section}\n{}\n", doc.get_or_placeholder(section));
            }
        }
    }
    Ok(())
}
