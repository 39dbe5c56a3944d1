use std::path::Path;
use std::process::Stdio;

use eyre::{WrapErr, bail};
use indexmap::IndexSet;
use tokio::process::Command;

use crate::Result;
use crate::config::Config;
use crate::git;
use crate::glob;

/// One command to spawn, paired with the staged files its pattern matched.
#[derive(Debug, Clone)]
pub struct Task {
    pub pattern: String,
    pub command: String,
    pub files: Vec<String>,
}

/// A task that exited non-zero, with everything it printed.
#[derive(Debug)]
pub struct TaskFailure {
    pub command: String,
    pub code: Option<i32>,
    pub output: String,
}

/// Pair every configured command with its matching staged files. Entries
/// whose pattern matches nothing are dropped.
pub fn resolve_tasks(config: &Config, staged_files: &[String]) -> Result<Vec<Task>> {
    let mut tasks = vec![];
    for (pattern, commands) in &config.tasks {
        let files = glob::get_matches(pattern, staged_files)
            .wrap_err_with(|| format!("invalid pattern: {pattern}"))?;
        if files.is_empty() {
            debug!("no staged files match {pattern}");
            continue;
        }
        for command in commands.as_slice() {
            tasks.push(Task {
                pattern: pattern.clone(),
                command: command.clone(),
                files: files.clone(),
            });
        }
    }
    Ok(tasks)
}

/// Union of all matched files across tasks, in first-match order.
pub fn matched_files(tasks: &[Task]) -> Vec<String> {
    let mut files: IndexSet<String> = IndexSet::new();
    for task in tasks {
        files.extend(task.files.iter().cloned());
    }
    files.into_iter().collect()
}

/// Spawn each task with its files appended to the argv, serially in config
/// order; auto-fixing tasks may rewrite the same files, so there is no safe
/// parallelism here. Later tasks still run after a failure so the user sees
/// every problem at once.
pub async fn run_tasks(
    root: &Path,
    tasks: &[Task],
    max_arg_length: usize,
) -> Result<Vec<TaskFailure>> {
    let mut failures = vec![];
    for task in tasks {
        info!("{} ({} file{})", task.command, task.files.len(), plural(task.files.len()));
        let argv = shell_words::split(&task.command)
            .wrap_err_with(|| format!("failed to parse command: {}", task.command))?;
        let Some((program, args)) = argv.split_first() else {
            bail!("empty command for pattern {}", task.pattern);
        };
        for chunk in git::chunk_by_arg_length(root, &task.files, max_arg_length) {
            let output = Command::new(program)
                .args(args)
                .args(&chunk)
                .current_dir(root)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .wrap_err_with(|| format!("failed to spawn `{}`", task.command))?;
            if !output.status.success() {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                failures.push(TaskFailure {
                    command: task.command.clone(),
                    code: output.status.code(),
                    output: combined,
                });
                break;
            }
        }
    }
    Ok(failures)
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
