use std::path::PathBuf;

use clap::Parser;
use eyre::{WrapErr, bail};

use crate::config::Config;
use crate::git::Repo;
use crate::runner::{self, Task};
use crate::workflow::{GitWorkflow, GitWorkflowOptions};
use crate::{Result, env, logger};

#[derive(clap::Parser)]
#[clap(name = "lint-staged", version, about = env!("CARGO_PKG_DESCRIPTION"))]
struct Cli {
    /// Path to the configuration file
    #[clap(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Directory to run in, instead of the current one
    #[clap(long, value_name = "PATH")]
    cwd: Option<PathBuf>,
    /// Allow the commit to become empty when tasks revert all staged changes
    #[clap(long)]
    allow_empty: bool,
    /// Skip the backup stash; failures can no longer be rolled back
    #[clap(long)]
    no_stash: bool,
    /// Enables verbose output
    #[clap(short, long, action = clap::ArgAction::Count, overrides_with = "quiet")]
    verbose: u8,
    /// Only print errors
    #[clap(short, long)]
    quiet: bool,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let level = if args.quiet {
        Some(log::LevelFilter::Error)
    } else {
        match args.verbose {
            0 => None,
            1 => Some(log::LevelFilter::Debug),
            _ => Some(log::LevelFilter::Trace),
        }
    };
    logger::init(level);

    if let Some(cwd) = &args.cwd {
        env::set_current_dir(cwd)
            .wrap_err_with(|| format!("failed to change directory to {}", cwd.display()))?;
    }
    let cwd = env::current_dir()?;
    let repo = Repo::discover(&cwd).await?;
    debug!("repository root: {}", repo.root.display());

    let config = Config::get(&cwd, args.config.as_deref())?;
    let staged_files = repo.staged_files().await?;
    if staged_files.is_empty() {
        info!("no staged files");
        return Ok(());
    }
    let tasks = runner::resolve_tasks(&config, &staged_files)?;
    if tasks.is_empty() {
        info!("no staged files match any configured task");
        return Ok(());
    }

    let backup = !args.no_stash;
    let mut workflow = GitWorkflow::new(
        repo.clone(),
        GitWorkflowOptions {
            allow_empty: args.allow_empty,
            matched_files: runner::matched_files(&tasks),
            max_arg_length: *env::MAX_ARG_LENGTH,
        },
    );

    workflow.prepare(backup).await?;
    match run_tasks_and_apply(&mut workflow, &repo, &tasks).await {
        Ok(()) => {
            if backup {
                if let Err(err) = workflow.cleanup().await {
                    warn!("failed to drop backup stash: {err}");
                }
            }
            Ok(())
        }
        Err(err) => {
            if backup {
                match workflow.restore_original_state().await {
                    Ok(()) => {
                        if let Err(cleanup_err) = workflow.cleanup().await {
                            warn!("failed to drop backup stash: {cleanup_err}");
                        }
                        info!("reverted to original state");
                    }
                    // worst outcome: the tree may be in an intermediate
                    // state, so keep the backup stash around for the user
                    Err(restore_err) => error!("{restore_err}"),
                }
            } else if workflow.has_partially_staged_files() {
                // without a stash there is no rollback, but the hidden
                // unstaged hunks can still be put back
                if let Err(restore_err) = workflow.restore_unstaged_changes().await {
                    error!("{restore_err}");
                }
            }
            Err(err)
        }
    }
}

async fn run_tasks_and_apply(
    workflow: &mut GitWorkflow,
    repo: &Repo,
    tasks: &[Task],
) -> Result<()> {
    workflow.hide_unstaged_changes().await?;
    let failures = runner::run_tasks(&repo.root, tasks, *env::MAX_ARG_LENGTH).await?;
    if !failures.is_empty() {
        for failure in &failures {
            let code = failure
                .code
                .map(|code| format!(" with exit code {code}"))
                .unwrap_or_default();
            error!("{} failed{code}:\n{}", failure.command, failure.output.trim_end());
        }
        bail!("{} of {} tasks failed", failures.len(), tasks.len());
    }
    workflow.apply_modifications().await?;
    workflow.restore_unstaged_changes().await?;
    Ok(())
}
