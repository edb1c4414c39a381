#![allow(dead_code)]

use git_reword::git::{CommandResult, CommandRunner, GitCommand, GitExecutor};
use git_reword::GitResult;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in `repo_path` and return trimmed stdout
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .expect("Failed to run git");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Helper to create a test git repository
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    git(&repo_path, &["init"]);
    git(&repo_path, &["config", "user.name", "Test User"]);
    git(&repo_path, &["config", "user.email", "test@example.com"]);
    git(&repo_path, &["config", "commit.gpgsign", "false"]);

    (temp_dir, repo_path)
}

/// Helper to create a commit
pub fn create_commit(repo_path: &Path, file: &str, content: &str, message: &str) {
    fs::write(repo_path.join(file), content).expect("Failed to write file");
    git(repo_path, &["add", file]);
    git(repo_path, &["commit", "-m", message]);
}

/// Repository with `count` commits whose subjects are "Commit 1".."Commit N"
pub fn create_repo_with_commits(count: usize) -> (TempDir, PathBuf) {
    let (temp_dir, repo_path) = create_test_repo();
    for i in 1..=count {
        create_commit(
            &repo_path,
            &format!("file{}.txt", i),
            &format!("content {}", i),
            &format!("Commit {}", i),
        );
    }
    (temp_dir, repo_path)
}

pub fn head(repo_path: &Path) -> String {
    git(repo_path, &["rev-parse", "HEAD"])
}

/// Subjects from HEAD backwards
pub fn subjects(repo_path: &Path) -> Vec<String> {
    git(repo_path, &["log", "--format=%s"])
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn backup_tags(repo_path: &Path) -> Vec<String> {
    git(repo_path, &["tag", "--list", "backup-before-reword-*"])
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn rebase_in_progress(repo_path: &Path) -> bool {
    let git_dir = repo_path.join(".git");
    git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
}

pub fn is_clean(repo_path: &Path) -> bool {
    git(repo_path, &["status", "--porcelain"]).is_empty()
}

type Intercept = Box<dyn Fn(&GitCommand, &GitExecutor) -> Option<GitResult<CommandResult>>>;

/// A [`CommandRunner`] over the real git binary that can fake individual results
///
/// The intercept sees every command first; returning `Some` replaces the real
/// result (it may still run the command through the executor it is handed).
/// Every command is recorded, intercepted or not.
pub struct FaultyRunner {
    inner: GitExecutor,
    intercept: Intercept,
    calls: RefCell<Vec<String>>,
}

impl FaultyRunner {
    pub fn passthrough<P: AsRef<Path>>(repo_path: P) -> Self {
        Self::new(repo_path, |_, _| None)
    }

    pub fn new<P, F>(repo_path: P, intercept: F) -> Self
    where
        P: AsRef<Path>,
        F: Fn(&GitCommand, &GitExecutor) -> Option<GitResult<CommandResult>> + 'static,
    {
        Self {
            inner: GitExecutor::new(repo_path),
            intercept: Box::new(intercept),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|call| call.starts_with(prefix))
    }
}

impl CommandRunner for FaultyRunner {
    fn run(&self, command: &GitCommand) -> GitResult<CommandResult> {
        self.calls.borrow_mut().push(command.display());
        match (self.intercept)(command, &self.inner) {
            Some(result) => result,
            None => self.inner.run(command),
        }
    }

    fn repo_path(&self) -> &Path {
        self.inner.repo_path()
    }
}

/// Whether `command` is `git <subcommand>` with `arg` among its arguments
pub fn is_command(command: &GitCommand, subcommand: &str, arg: &str) -> bool {
    command.subcommand() == subcommand && command.argv().any(|a| a == arg)
}
