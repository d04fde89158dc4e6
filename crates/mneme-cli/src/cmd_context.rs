use anyhow::bail;
use mneme_store::ContextQuery;
use std::path::Path;

pub struct ContextArgs {
    pub branch: Option<String>,
    pub depth: Option<usize>,
    pub offset: usize,
    pub commit: Option<usize>,
    pub trace: Option<usize>,
    pub metadata: Option<String>,
    pub project: bool,
}

/// Pick the projection level from the flags. At most one of `--project`,
/// `--commit`, `--trace`, `--metadata` may be given; none means branch level.
/// `--offset` pages the branch and trace levels.
fn query(args: ContextArgs, active: String) -> anyhow::Result<ContextQuery> {
    let levels = [
        args.project,
        args.commit.is_some(),
        args.trace.is_some(),
        args.metadata.is_some(),
    ];
    if levels.iter().filter(|l| **l).count() > 1 {
        bail!("choose one of --project, --commit, --trace, --metadata");
    }
    let branch = args.branch.unwrap_or(active);
    Ok(if args.project {
        ContextQuery::Project
    } else if let Some(index) = args.commit {
        ContextQuery::Commit { branch, index }
    } else if let Some(limit) = args.trace {
        ContextQuery::Trace {
            branch,
            limit: Some(limit),
            offset: args.offset,
        }
    } else if let Some(section) = args.metadata {
        ContextQuery::Metadata { branch, section }
    } else {
        ContextQuery::Branch {
            branch,
            depth: args.depth,
            offset: args.offset,
        }
    })
}

/// `mneme context [...]`
pub fn execute(cwd: &Path, args: ContextArgs) -> anyhow::Result<()> {
    let repo = crate::open_repo(cwd)?;
    let q = query(args, repo.active_branch()?)?;
    let ctx = repo.context(&q)?;
    print!("{}", ctx.render_markdown());
    Ok(())
}
