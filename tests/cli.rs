//! Full binary runs against throwaway repositories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use predicates::prelude::*;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn init_repo() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    git(&root, &["init"]);
    git(&root, &["config", "user.name", "Test"]);
    git(&root, &["config", "user.email", "test@example.com"]);
    git(&root, &["config", "commit.gpgsign", "false"]);
    (dir, root)
}

fn lint_staged(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("lint-staged").unwrap();
    cmd.arg("--cwd").arg(root);
    cmd
}

#[test]
fn fixer_task_output_ends_up_in_the_commit() {
    let (_dir, root) = init_repo();
    fs::write(root.join("lint-staged.toml"), "\"*.txt\" = \"sed -i s/lint/LINT/\"\n").unwrap();
    fs::write(root.join("a.txt"), "lint me\n").unwrap();
    git(&root, &["add", "a.txt", "lint-staged.toml"]);
    git(&root, &["commit", "-m", "seed"]);

    fs::write(root.join("a.txt"), "lint again\n").unwrap();
    git(&root, &["add", "a.txt"]);

    lint_staged(&root).assert().success();

    assert_eq!(git(&root, &["show", ":a.txt"]), "LINT again");
    assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "LINT again\n");
    assert_eq!(git(&root, &["stash", "list"]), "");
}

#[test]
fn failing_task_rolls_the_tree_back() {
    let (_dir, root) = init_repo();
    fs::write(root.join("lint-staged.toml"), "\"*.txt\" = \"false\"\n").unwrap();
    fs::write(root.join("a.txt"), "original\n").unwrap();
    git(&root, &["add", "a.txt", "lint-staged.toml"]);
    git(&root, &["commit", "-m", "seed"]);

    fs::write(root.join("a.txt"), "staged\n").unwrap();
    git(&root, &["add", "a.txt"]);
    fs::write(root.join("a.txt"), "staged\nunstaged\n").unwrap();

    lint_staged(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tasks failed"));

    // both sides of the split survive the rollback
    assert_eq!(git(&root, &["show", ":a.txt"]), "staged");
    assert_eq!(
        fs::read_to_string(root.join("a.txt")).unwrap(),
        "staged\nunstaged\n"
    );
    assert_eq!(git(&root, &["stash", "list"]), "");
}

#[test]
fn no_staged_files_is_a_successful_no_op() {
    let (_dir, root) = init_repo();
    fs::write(root.join("lint-staged.toml"), "\"*.txt\" = \"false\"\n").unwrap();
    git(&root, &["add", "lint-staged.toml"]);
    git(&root, &["commit", "-m", "seed"]);

    lint_staged(&root).assert().success();
}

#[test]
fn missing_config_is_reported() {
    let (_dir, root) = init_repo();
    fs::write(root.join("a.txt"), "hello\n").unwrap();
    git(&root, &["add", "a.txt"]);

    lint_staged(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no lint-staged config file"));
}
