use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::GitError;

/// Handle to the repository a run operates on. Cheap to clone; all state
/// lives in git itself.
#[derive(Debug, Clone)]
pub struct Repo {
    /// Absolute path to the working-tree root.
    pub root: PathBuf,
    /// Absolute path to the repository metadata directory, where `HEAD` and
    /// the `MERGE_*` sentinel files live.
    pub git_dir: PathBuf,
}

impl Repo {
    pub async fn discover(cwd: &Path) -> Result<Self, GitError> {
        let root = run_in(cwd, ["rev-parse", "--show-toplevel"]).await?;
        let root = PathBuf::from(root.trim_end_matches('\n'));
        let git_dir = run_in(&root, ["rev-parse", "--absolute-git-dir"]).await?;
        let git_dir = PathBuf::from(git_dir.trim_end_matches('\n'));
        Ok(Self { root, git_dir })
    }

    /// Run a git subcommand with the working directory pinned to the
    /// repository root, returning captured stdout. Arguments are passed as a
    /// vector so filenames with spaces or shell metacharacters stay intact.
    pub async fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        run_in(&self.root, args).await
    }

    /// Files deleted in the working tree but not staged, as absolute paths.
    pub async fn deleted_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let stdout = self.run(["ls-files", "--deleted"]).await?;
        let files = stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| self.root.join(line))
            .collect();
        trace!("deleted files: {files:?}");
        Ok(files)
    }

    /// Files with both staged and unstaged modifications, in `git status`
    /// order. Renamed entries keep the `from -> to` notation; expand them
    /// with [`flatten_renames`] before handing the list to git.
    pub async fn partially_staged_files(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.run(["status", "--porcelain"]).await?;
        let files = parse_partially_staged(&stdout);
        trace!("partially staged files: {files:?}");
        Ok(files)
    }

    /// Repo-relative paths staged for the pending commit. Deletions are
    /// excluded; there is no working-tree file for a task to operate on.
    pub async fn staged_files(&self) -> Result<Vec<String>, GitError> {
        let stdout = self
            .run([
                "diff",
                "--staged",
                "--name-only",
                "--diff-filter=ACMR",
                "--no-ext-diff",
                "-z",
            ])
            .await?;
        Ok(stdout
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect())
    }
}

async fn run_in<I, S>(cwd: &Path, args: I) -> Result<String, GitError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(|arg| arg.into()).collect();
    let lossy_args = || {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    };
    trace!("git {}", args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" "));
    let output = Command::new("git")
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|err| GitError {
            args: lossy_args(),
            code: None,
            stderr: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(GitError {
            args: lossy_args(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Interpret porcelain short-format output. The first two columns are the
/// index and working-tree status; a file is partially staged iff both sides
/// are touched and neither is the untracked marker. The path starts at
/// column 4.
fn parse_partially_staged(status: &str) -> Vec<String> {
    status
        .lines()
        .filter_map(|line| {
            let mut chars = line.chars();
            let index = chars.next()?;
            let workdir = chars.next()?;
            let touched =
                index != ' ' && workdir != ' ' && index != '?' && workdir != '?';
            touched.then(|| chars.skip(1).collect())
        })
        .collect()
}

/// Expand `from -> to` rename notation. With `with_from` both sides are
/// emitted (the old path is still part of the index, so diffing wants it);
/// without it only the new path (the old one no longer exists on disk, so
/// checkout must not see it).
pub fn flatten_renames<S: AsRef<str>>(files: &[S], with_from: bool) -> Vec<String> {
    files
        .iter()
        .flat_map(|file| match file.as_ref().split_once(" -> ") {
            Some((from, to)) if with_from => vec![from.to_string(), to.to_string()],
            Some((_, to)) => vec![to.to_string()],
            None => vec![file.as_ref().to_string()],
        })
        .collect()
}

/// Split `files` into runs whose argv byte length (each path resolved
/// against `base_dir`, plus one separator byte) stays within
/// `max_arg_length`. Input order is preserved. A single path longer than the
/// budget still gets a chunk of its own; git, not this function, is the one
/// to reject it. Empty input produces no chunks.
pub fn chunk_by_arg_length(
    base_dir: &Path,
    files: &[String],
    max_arg_length: usize,
) -> Vec<Vec<String>> {
    let mut chunks: Vec<Vec<String>> = vec![];
    let mut current: Vec<String> = vec![];
    let mut length = 0;
    for file in files {
        let arg_length = base_dir.join(file).as_os_str().len() + 1;
        if !current.is_empty() && length + arg_length > max_arg_length {
            chunks.push(std::mem::take(&mut current));
            length = 0;
        }
        length += arg_length;
        current.push(file.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
