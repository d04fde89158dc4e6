mod cmd_branch;
mod cmd_commit;
mod cmd_config;
mod cmd_context;
mod cmd_export;
mod cmd_init;
mod cmd_ingest;
mod cmd_log;
mod cmd_main;
mod cmd_merge;
mod cmd_metadata;
mod cmd_status;

use clap::{Parser, Subcommand};
use mneme_core::MemoryError;
use mneme_store::{MnemePaths, Repository};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "mneme", version, about = "Versioned working memory for coding agents")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize .mneme/ in the current directory
    Init {
        /// Project purpose written into the Main Document
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Branch management
    Branch {
        #[command(subcommand)]
        cmd: cmd_branch::BranchCmd,
    },
    /// Make a branch the active one
    Switch {
        /// Branch name
        name: String,
    },
    /// Record a milestone on the active branch
    Commit {
        /// Commit title
        #[arg(short, long)]
        title: String,
        /// What this commit contributed (synthesized from recent actions if omitted)
        #[arg(short, long)]
        message: Option<String>,
        /// External revision this milestone corresponds to
        #[arg(long = "ref")]
        external_ref: Option<String>,
        /// Also commit the workspace to git and record the revision
        #[arg(long)]
        git: bool,
    },
    /// Append an event (observation, thought or action) to a branch's trace
    Log {
        /// observation | thought | action
        role: String,
        /// Event text
        text: String,
        /// Idempotency key; a repeated key is a no-op
        #[arg(long)]
        dedup: Option<String>,
        /// Target branch (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Merge one branch's history into another
    Merge {
        /// Branch to merge from
        source: String,
        /// Branch to merge into
        target: String,
    },
    /// Print context at one resolution (branch level by default)
    Context {
        /// Branch (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,
        /// Number of recent commits at branch level
        #[arg(long)]
        depth: Option<usize>,
        /// Skip this many of the newest commits (branch level) or events (--trace)
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// One commit, counted back from the latest (0 = latest)
        #[arg(long)]
        commit: Option<usize>,
        /// Most recent N events
        #[arg(long)]
        trace: Option<usize>,
        /// One metadata section
        #[arg(long)]
        metadata: Option<String>,
        /// Main Document plus every branch
        #[arg(long)]
        project: bool,
    },
    /// Write a branch snapshot (Main Document, commit log, metadata, recent events) to a file
    Export {
        /// Branch (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,
        /// Number of recent events to include
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Destination file
        #[arg(long, default_value = "context-export.md")]
        output: PathBuf,
    },
    /// Read or replace Main Document sections
    Main {
        #[command(subcommand)]
        cmd: cmd_main::MainCmd,
    },
    /// Branch metadata snapshot
    Metadata {
        #[command(subcommand)]
        cmd: cmd_metadata::MetadataCmd,
    },
    /// Backfill a JSONL transcript into a branch
    Ingest {
        /// Transcript path
        path: PathBuf,
        /// Target branch (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Show the active branch and how long since its last commit
    Status,
    /// Manage .mneme/config.json
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

/// Open the repository containing `cwd` (searching parent directories).
pub(crate) fn open_repo(cwd: &Path) -> anyhow::Result<Repository> {
    let root = MnemePaths::find_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
    Ok(Repository::open(root)?)
}

/// `branch` or the active branch.
pub(crate) fn resolve_branch(repo: &Repository, branch: Option<String>) -> anyhow::Result<String> {
    match branch {
        Some(b) => Ok(b),
        None => Ok(repo.active_branch()?),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    debug!(cwd = %cwd.display(), "mneme started");

    match cli.cmd {
        Command::Init { description } => cmd_init::execute(&cwd, &description),
        Command::Branch { cmd } => cmd_branch::run(cmd, &cwd),
        Command::Switch { name } => cmd_branch::switch(&cwd, &name),
        Command::Commit {
            title,
            message,
            external_ref,
            git,
        } => cmd_commit::execute(cmd_commit::CommitParams {
            cwd: &cwd,
            title,
            message,
            external_ref,
            git,
        }),
        Command::Log {
            role,
            text,
            dedup,
            branch,
        } => cmd_log::execute(&cwd, &role, text, dedup, branch),
        Command::Merge { source, target } => cmd_merge::execute(&cwd, &source, &target),
        Command::Context {
            branch,
            depth,
            offset,
            commit,
            trace,
            metadata,
            project,
        } => cmd_context::execute(
            &cwd,
            cmd_context::ContextArgs {
                branch,
                depth,
                offset,
                commit,
                trace,
                metadata,
                project,
            },
        ),
        Command::Export {
            branch,
            limit,
            output,
        } => cmd_export::execute(cmd_export::ExportParams {
            cwd: &cwd,
            branch,
            limit,
            output,
        }),
        Command::Main { cmd } => cmd_main::run(cmd, &cwd),
        Command::Metadata { cmd } => cmd_metadata::run(cmd, &cwd),
        Command::Ingest { path, branch } => cmd_ingest::execute(&cwd, &path, branch),
        Command::Status => cmd_status::execute(&cwd),
        Command::Config { cmd } => cmd_config::run(cmd, &cwd),
    }
}

fn main() -> ExitCode {
    // RUST_LOG overrides; stdout stays clean for context output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(hint) = e
                .downcast_ref::<MemoryError>()
                .and_then(MemoryError::recovery_suggestion)
            {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
