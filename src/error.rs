use thiserror::Error;

/// A git subcommand exited non-zero (or could not be spawned at all).
#[derive(Debug, Error)]
#[error("`git {}` failed with {}:\n{stderr}", .args.join(" "), render_exit_code(.code))]
pub struct GitError {
    pub args: Vec<String>,
    pub code: Option<i32>,
    pub stderr: String,
}

fn render_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".into(),
    }
}

/// Everything that can go wrong inside the git workflow engine. Each variant
/// corresponds to one lifecycle stage, so callers can match on it to decide
/// between finishing the run and rolling back.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// No entry in `git stash list` carries the backup marker message.
    /// Without it there is nothing to roll back to.
    #[error("lint-staged automatic backup is missing")]
    MissingBackupStash,

    /// Writing the merge sentinel files back failed. Losing them would make
    /// the next commit silently forget the in-progress merge.
    #[error("merge state could not be restored")]
    MergeState(#[source] std::io::Error),

    #[error("failed to hide unstaged changes")]
    HideUnstaged(#[source] GitError),

    /// Tasks reverted all staged changes and empty commits are not allowed.
    #[error("prevented an empty git commit")]
    EmptyCommit,

    /// Both the plain and the `--3way` patch apply failed.
    #[error("unstaged changes could not be restored")]
    RestoreUnstaged(#[source] GitError),

    /// Rollback itself failed; the working tree may be in an intermediate
    /// state and the backup stash is left in place.
    #[error("failed to restore the original state")]
    RestoreOriginalState(#[source] Box<Error>),
}
