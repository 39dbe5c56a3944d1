use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::error::{Error, GitError};
use crate::git::{self, Repo};

/// Marker message identifying the engine's backup stash. Users may see it in
/// `git stash list` during an interrupted run, so it is part of the external
/// contract.
pub const STASH_MESSAGE: &str = "lint-staged automatic backup";

/// Patch of the unstaged hunks over partially staged files, kept inside the
/// repository metadata directory for the duration of a run.
const PATCH_UNSTAGED: &str = "lint-staged_unstaged.patch";

const MERGE_HEAD: &str = "MERGE_HEAD";
const MERGE_MODE: &str = "MERGE_MODE";
const MERGE_MSG: &str = "MERGE_MSG";

const GIT_DIFF_ARGS: [&str; 8] = [
    "diff",
    "--binary",          // survive binary files
    "--unified=0",       // no context, so the patch re-applies after shifts
    "--no-color",
    "--no-ext-diff",     // never let user diff drivers shape the patch
    "--src-prefix=a/",
    "--dst-prefix=b/",
    "--patch",
];

const GIT_APPLY_ARGS: [&str; 5] = [
    "apply",
    "-v",
    "--whitespace=nowarn",
    "--recount",
    "--unidiff-zero",
];

/// Raw bytes of the three merge sentinel files, captured before stashing
/// because `git stash` erases an in-progress merge. Each buffer is absent
/// when the corresponding file did not exist.
#[derive(Debug, Default)]
struct MergeStatus {
    head: Option<Vec<u8>>,
    mode: Option<Vec<u8>>,
    msg: Option<Vec<u8>>,
}

impl MergeStatus {
    fn is_empty(&self) -> bool {
        self.head.is_none() && self.mode.is_none() && self.msg.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct GitWorkflowOptions {
    /// Permit a commit that becomes empty after tasks revert everything.
    pub allow_empty: bool,
    /// Repo-relative paths that are staged and matched at least one task.
    pub matched_files: Vec<String>,
    /// Argv byte budget for a single git invocation.
    pub max_arg_length: usize,
}

/// Transactional state machine around a git repository: isolates staged from
/// unstaged content while tasks run, captures task edits back into the
/// index, and restores the original working tree on failure.
///
/// One instance per run; the caller must not drive two instances against the
/// same repository concurrently. The lifecycle is
/// `prepare → hide_unstaged_changes → apply_modifications →
/// restore_unstaged_changes → cleanup`, with `restore_original_state`
/// replacing the tail on any failure.
pub struct GitWorkflow {
    repo: Repo,
    allow_empty: bool,
    matched_files: Vec<String>,
    max_arg_length: usize,
    partially_staged_files: Option<Vec<String>>,
    deleted_files: Vec<PathBuf>,
    merge_status: MergeStatus,
}

impl GitWorkflow {
    pub fn new(repo: Repo, options: GitWorkflowOptions) -> Self {
        Self {
            repo,
            allow_empty: options.allow_empty,
            matched_files: options.matched_files,
            max_arg_length: options.max_arg_length,
            partially_staged_files: None,
            deleted_files: vec![],
            merge_status: MergeStatus::default(),
        }
    }

    /// Path of a file the engine hides inside the repository metadata
    /// directory. Always absolute, also when unlinking.
    fn hidden_filepath(&self, filename: &str) -> PathBuf {
        self.repo.git_dir.join(filename)
    }

    fn patch_path(&self) -> PathBuf {
        self.hidden_filepath(PATCH_UNSTAGED)
    }

    pub fn has_partially_staged_files(&self) -> bool {
        self.partially_staged_files.is_some()
    }

    /// Capture everything needed to put the working tree back together:
    /// a patch of the unstaged hunks, the set of unstaged deletions, the
    /// merge sentinel files, and a backup stash of the whole tree. The stash
    /// is immediately re-applied with `--index` so the staged/unstaged split
    /// survives in the working copy.
    pub async fn prepare(&mut self, backup: bool) -> Result<(), Error> {
        debug!("backing up original state...");
        let partially_staged = self.repo.partially_staged_files().await?;
        if !partially_staged.is_empty() {
            self.create_unstaged_patch(&partially_staged).await?;
            self.partially_staged_files = Some(partially_staged);
        }
        if !backup {
            debug!("skipping backup stash");
            return Ok(());
        }
        self.deleted_files = self.repo.deleted_files().await?;
        self.merge_status = self.backup_merge_status().await?;
        self.repo.run(["stash", "save", STASH_MESSAGE]).await?;
        let stash = self.backup_stash().await?;
        self.repo
            .run(["stash", "apply", "--quiet", "--index", stash.as_str()])
            .await?;
        // stash save cleared the merge state; put it back
        self.restore_merge_status().await?;
        // stash apply may have resurrected files the user had deleted
        self.delete_removed_files().await?;
        debug!("done backing up original state");
        Ok(())
    }

    /// Drop the unstaged edits from the working copies of partially staged
    /// files; the hunks live on in the patch written by `prepare`. `--force`
    /// suppresses the local-modifications check, so a failure here is
    /// structurally unexpected.
    pub async fn hide_unstaged_changes(&self) -> Result<(), Error> {
        let Some(files) = &self.partially_staged_files else {
            return Ok(());
        };
        debug!("hiding unstaged changes...");
        let mut args: Vec<OsString> = ["checkout", "--force", "--"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.extend(git::flatten_renames(files, false).into_iter().map(OsString::from));
        self.repo.run(args).await.map_err(Error::HideUnstaged)?;
        debug!("done hiding unstaged changes");
        Ok(())
    }

    /// Stage whatever the tasks rewrote. Adds are chunked so no single
    /// invocation exceeds the argv budget and run strictly serially; git
    /// takes an exclusive index lock. Afterwards, fail the run if the index
    /// came out empty and empty commits are not allowed.
    pub async fn apply_modifications(&self) -> Result<(), Error> {
        debug!("adding task modifications to index...");
        let chunks =
            git::chunk_by_arg_length(&self.repo.root, &self.matched_files, self.max_arg_length);
        for chunk in chunks {
            let mut args: Vec<OsString> = vec!["add".into(), "--".into()];
            args.extend(chunk.into_iter().map(OsString::from));
            self.repo.run(args).await?;
        }
        debug!("done adding task modifications to index");
        let staged = self.repo.run(["diff", "--name-only", "--cached"]).await?;
        if staged.trim().is_empty() && !self.allow_empty {
            return Err(Error::EmptyCommit);
        }
        Ok(())
    }

    /// Re-apply the unstaged hunks captured during `prepare`. Tasks may have
    /// reformatted lines the hunks also touch, so a failed plain apply is
    /// retried as a 3-way merge against the post-task content. The patch
    /// artifact is removed once applied.
    pub async fn restore_unstaged_changes(&mut self) -> Result<(), Error> {
        if self.partially_staged_files.is_none() {
            return Ok(());
        }
        debug!("restoring unstaged changes...");
        let patch = self.patch_path();
        if let Err(err) = self.apply_patch(&patch, false).await {
            warn!("plain git apply failed, retrying with --3way: {err}");
            self.apply_patch(&patch, true)
                .await
                .map_err(Error::RestoreUnstaged)?;
        }
        self.partially_staged_files = None;
        tokio::fs::remove_file(&patch).await?;
        debug!("done restoring unstaged changes");
        Ok(())
    }

    /// All-or-nothing rollback to the tree captured by `prepare`: throw the
    /// current tree and index away, repopulate both from the backup stash,
    /// and undo the side effects of the stash apply.
    pub async fn restore_original_state(&mut self) -> Result<(), Error> {
        debug!("restoring original state...");
        self.rollback()
            .await
            .map_err(|err| Error::RestoreOriginalState(Box::new(err)))?;
        debug!("done restoring original state");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.repo.run(["reset", "--hard", "HEAD"]).await?;
        let stash = self.backup_stash().await?;
        self.repo
            .run(["stash", "apply", "--quiet", "--index", stash.as_str()])
            .await?;
        self.restore_merge_status().await?;
        self.delete_removed_files().await?;
        let patch = self.patch_path();
        if patch.exists() {
            tokio::fs::remove_file(&patch).await?;
        }
        self.partially_staged_files = None;
        Ok(())
    }

    /// Drop the backup stash. Last lifecycle call of a run.
    pub async fn cleanup(&mut self) -> Result<(), Error> {
        debug!("dropping backup stash...");
        let stash = self.backup_stash().await?;
        self.repo
            .run(["stash", "drop", "--quiet", stash.as_str()])
            .await?;
        debug!("done dropping backup stash");
        Ok(())
    }

    async fn create_unstaged_patch(&self, files: &[String]) -> Result<(), GitError> {
        debug!("creating patch of unstaged changes...");
        let mut args: Vec<OsString> = GIT_DIFF_ARGS.into_iter().map(OsString::from).collect();
        args.push("--output".into());
        args.push(self.patch_path().into_os_string());
        args.push("--".into());
        args.extend(git::flatten_renames(files, true).into_iter().map(OsString::from));
        self.repo.run(args).await?;
        Ok(())
    }

    async fn apply_patch(&self, patch: &Path, three_way: bool) -> Result<String, GitError> {
        let mut args: Vec<OsString> = GIT_APPLY_ARGS.into_iter().map(OsString::from).collect();
        if three_way {
            args.push("--3way".into());
        }
        args.push(patch.as_os_str().to_os_string());
        self.repo.run(args).await
    }

    /// Locate the backup stash by scanning for its marker message. The
    /// ordinal is resolved on every call; the user may have created or
    /// dropped other stashes since `prepare`.
    async fn backup_stash(&self) -> Result<String, Error> {
        let list = self.repo.run(["stash", "list"]).await?;
        let index = list
            .lines()
            .position(|line| line.contains(STASH_MESSAGE))
            .ok_or(Error::MissingBackupStash)?;
        Ok(format!("stash@{{{index}}}"))
    }

    async fn backup_merge_status(&self) -> Result<MergeStatus, Error> {
        let (head, mode, msg) = tokio::try_join!(
            read_optional(self.hidden_filepath(MERGE_HEAD)),
            read_optional(self.hidden_filepath(MERGE_MODE)),
            read_optional(self.hidden_filepath(MERGE_MSG)),
        )?;
        let status = MergeStatus { head, mode, msg };
        if !status.is_empty() {
            debug!("backed up merge state");
        }
        Ok(status)
    }

    /// Write back whichever sentinel files existed at `prepare` time. Absent
    /// buffers are skipped; they must not create empty files.
    async fn restore_merge_status(&self) -> Result<(), Error> {
        if self.merge_status.is_empty() {
            return Ok(());
        }
        debug!("restoring merge state...");
        tokio::try_join!(
            write_optional(self.hidden_filepath(MERGE_HEAD), &self.merge_status.head),
            write_optional(self.hidden_filepath(MERGE_MODE), &self.merge_status.mode),
            write_optional(self.hidden_filepath(MERGE_MSG), &self.merge_status.msg),
        )
        .map_err(Error::MergeState)?;
        Ok(())
    }

    /// Re-unlink the files that were deleted (but unstaged) at the start of
    /// the run. The unlinks touch disjoint paths and join concurrently.
    async fn delete_removed_files(&self) -> Result<(), Error> {
        if self.deleted_files.is_empty() {
            return Ok(());
        }
        debug!("removing resurrected deleted files...");
        let mut unlinks = JoinSet::new();
        for path in self.deleted_files.iter().cloned() {
            unlinks.spawn(async move {
                match tokio::fs::remove_file(&path).await {
                    Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
                    _ => Ok(()),
                }
            });
        }
        while let Some(joined) = unlinks.join_next().await {
            joined.map_err(io::Error::other)??;
        }
        Ok(())
    }
}

async fn read_optional(path: PathBuf) -> io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

async fn write_optional(path: PathBuf, contents: &Option<Vec<u8>>) -> io::Result<()> {
    match contents {
        Some(bytes) => tokio::fs::write(&path, bytes).await,
        None => Ok(()),
    }
}
