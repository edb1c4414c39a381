use crate::error::{GitError, GitResult};
use crate::git::command::{GitCommand, SedFlavor, SequenceEditor};
use crate::git::executor::{CommandResult, CommandRunner, GitExecutor};
use crate::git::parser::{self, COMMIT_RECORD_FORMAT, CommitRecord, StatusEntry};
use crate::git::version::{GitVersion, LfsVersion};
use crate::security::{CommitMessage, RefValidator, ValidatedRef};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directories git keeps while a rebase is paused
const REWRITE_STATE_DIRS: &[&str] = &["rebase-merge", "rebase-apply"];

/// Semantic repository queries and mutations on top of a [`CommandRunner`]
///
/// Every ref-like argument is a [`ValidatedRef`]; mutations hand back the raw
/// [`CommandResult`] so callers can decide how to compensate.
#[derive(Debug)]
pub struct Repository<R: CommandRunner = GitExecutor> {
    runner: R,
}

impl Repository<GitExecutor> {
    /// Create a Repository backed by the real git binary
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_runner(GitExecutor::new(path))
    }
}

impl<R: CommandRunner> Repository<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        self.runner.repo_path()
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn run(&self, command: GitCommand) -> GitResult<CommandResult> {
        self.runner.run(&command)
    }

    /// Trimmed stdout of a successful command, `None` if git reported failure
    fn stdout_of(&self, command: GitCommand) -> GitResult<Option<String>> {
        let result = self.run(command)?;
        Ok(result.success.then(|| result.stdout.trim().to_string()))
    }

    // --- State queries ---

    /// Installed git version, if git can be run and is recent enough
    pub fn git_version(&self) -> GitResult<GitVersion> {
        GitVersion::validate()
    }

    pub fn is_git_available(&self) -> bool {
        self.git_version().is_ok()
    }

    pub fn lfs_version(&self) -> Option<LfsVersion> {
        let output = self.stdout_of(GitCommand::new("lfs").flag("version")).ok()??;
        LfsVersion::parse(&output).ok()
    }

    pub fn is_lfs_available(&self) -> bool {
        self.lfs_version().is_some()
    }

    pub fn is_repository(&self) -> bool {
        if !self.path().is_dir() {
            return false;
        }
        matches!(
            self.stdout_of(GitCommand::new("rev-parse").flag("--is-inside-work-tree")),
            Ok(Some(out)) if out == "true"
        )
    }

    /// Every pending change, untracked files included
    pub fn dirty_entries(&self) -> GitResult<Vec<StatusEntry>> {
        let result = self.run(
            GitCommand::new("status")
                .flag("--porcelain=v2")
                .flag("--untracked-files=all"),
        )?;

        if !result.success {
            return Err(GitError::CommandFailed(result.output.trim().to_string()));
        }
        Ok(parser::parse_status_porcelain_v2(&result.stdout))
    }

    pub fn is_working_tree_clean(&self) -> bool {
        self.dirty_entries().is_ok_and(|entries| entries.is_empty())
    }

    /// Absolute path of the git directory (handles worktrees and `.git` files)
    pub fn git_dir(&self) -> GitResult<PathBuf> {
        self.stdout_of(GitCommand::new("rev-parse").flag("--absolute-git-dir"))?
            .map(PathBuf::from)
            .ok_or(GitError::NotARepository)
    }

    fn rewrite_state_dirs(&self) -> GitResult<Vec<PathBuf>> {
        let git_dir = self.git_dir()?;
        Ok(REWRITE_STATE_DIRS
            .iter()
            .map(|dir| git_dir.join(dir))
            .filter(|dir| dir.is_dir())
            .collect())
    }

    pub fn is_rewrite_in_progress(&self) -> bool {
        self.rewrite_state_dirs().is_ok_and(|dirs| !dirs.is_empty())
    }

    /// A rewrite-state marker exists but there is no step git could resume
    ///
    /// A marker holding `head-name` is never orphaned, even when
    /// `rebase --show-current-patch` fails: a rebase paused at `break` or `exec`
    /// looks exactly like that.
    pub fn has_orphaned_rewrite_state(&self) -> bool {
        let Ok(dirs) = self.rewrite_state_dirs() else {
            return false;
        };
        if dirs.is_empty() {
            return false;
        }

        // A `git am` session also lives in rebase-apply and is never ours to remove
        if dirs.iter().any(|dir| dir.join("applying").exists()) {
            return false;
        }

        // head-name is written when a rebase starts; `rebase --abort` can still use it
        if dirs.iter().any(|dir| dir.join("head-name").exists()) {
            return false;
        }

        match self.run(GitCommand::new("rebase").flag("--show-current-patch")) {
            Ok(result) => !result.success,
            Err(_) => false,
        }
    }

    /// Commit an interactive rebase stopped at, as recorded by git
    ///
    /// May be abbreviated depending on the git version.
    pub fn stopped_commit(&self) -> Option<String> {
        let path = self.git_dir().ok()?.join("rebase-merge").join("stopped-sha");
        let sha = fs::read_to_string(path).ok()?.trim().to_string();
        (!sha.is_empty()).then_some(sha)
    }

    /// Force-remove the rewrite-state markers
    pub fn cleanup_orphaned_rewrite_state(&self) -> GitResult<()> {
        for dir in self.rewrite_state_dirs()? {
            warn!(path = %dir.display(), "Removing orphaned rebase state");
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    // --- Read queries ---

    /// Full hash of the current tip
    pub fn head_commit(&self) -> GitResult<String> {
        self.resolve(&ValidatedRef::head())?
            .ok_or_else(|| GitError::CommandFailed("Failed to resolve HEAD".to_string()))
    }

    /// Full commit hash a reference points at, `None` if it does not resolve
    pub fn resolve(&self, reference: &ValidatedRef) -> GitResult<Option<String>> {
        // `^0` peels annotated tags down to the commit
        let peeled = RefValidator::new().validate(&format!("{}^0", reference))?;
        self.stdout_of(
            GitCommand::new("rev-parse")
                .flag("--verify")
                .flag("--quiet")
                .reference(&peeled),
        )
    }

    /// Metadata of a single commit
    ///
    /// Returns `None` when the reference does not resolve or the record cannot
    /// be split into all five fields.
    pub fn commit_record(&self, reference: &ValidatedRef) -> GitResult<Option<CommitRecord>> {
        let output = self.stdout_of(
            GitCommand::new("log")
                .count(1)
                .flag(COMMIT_RECORD_FORMAT)
                .reference(reference)
                .flag("--"),
        )?;
        Ok(output.as_deref().and_then(parser::parse_commit_record))
    }

    /// The `count` most recent commits reachable from HEAD
    pub fn recent_commits(&self, count: usize) -> GitResult<Vec<CommitRecord>> {
        let result = self.run(GitCommand::new("log").count(count).flag(COMMIT_RECORD_FORMAT))?;
        if !result.success {
            // Empty repo has no commits
            return Ok(Vec::new());
        }
        Ok(parser::parse_commit_log(&result.stdout))
    }

    /// Abbreviated hash exactly as git writes it into a rebase todo list
    pub fn short_hash(&self, reference: &ValidatedRef) -> GitResult<Option<ValidatedRef>> {
        let short = self.stdout_of(GitCommand::new("rev-parse").flag("--short").reference(reference))?;
        match short {
            Some(short) => Ok(Some(RefValidator::new().validate(&short)?)),
            None => Ok(None),
        }
    }

    /// Whether the commit has a first parent (false for a root commit)
    pub fn has_parent(&self, reference: &ValidatedRef) -> GitResult<bool> {
        let parent = reference.parent()?;
        Ok(self.resolve(&parent)?.is_some())
    }

    /// Whether the commit is reachable from HEAD
    pub fn is_ancestor_of_head(&self, reference: &ValidatedRef) -> GitResult<bool> {
        let result = self.run(
            GitCommand::new("merge-base")
                .flag("--is-ancestor")
                .reference(reference)
                .reference(&ValidatedRef::head()),
        )?;

        match result.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(GitError::CommandFailed(result.output.trim().to_string())),
        }
    }

    /// Number of merge commits between the commit's parent and HEAD
    pub fn merge_count_since(&self, reference: &ValidatedRef) -> GitResult<usize> {
        let range = if self.has_parent(reference)? {
            reference.inclusive_range_to_head()?
        } else {
            ValidatedRef::head()
        };

        let output = self
            .stdout_of(
                GitCommand::new("rev-list")
                    .flag("--merges")
                    .flag("--count")
                    .reference(&range),
            )?
            .ok_or_else(|| GitError::CommandFailed(format!("rev-list failed for {}", range)))?;

        output
            .parse::<usize>()
            .map_err(|_| GitError::ParseError(format!("Unexpected rev-list count: {}", output)))
    }

    /// Number of commits on top of `reference` up to HEAD
    pub fn commits_after(&self, reference: &ValidatedRef) -> GitResult<usize> {
        let range = reference.range_to_head()?;
        let output = self
            .stdout_of(GitCommand::new("rev-list").flag("--count").reference(&range))?
            .ok_or_else(|| GitError::CommandFailed(format!("rev-list failed for {}", range)))?;

        output
            .parse::<usize>()
            .map_err(|_| GitError::ParseError(format!("Unexpected rev-list count: {}", output)))
    }

    pub fn tag_exists(&self, tag: &ValidatedRef) -> GitResult<bool> {
        Ok(self.resolve(&tag.qualified_tag()?)?.is_some())
    }

    /// Tag names matching a static glob such as `backup-before-reword-*`
    pub fn list_tags(&self, pattern: &'static str) -> GitResult<Vec<String>> {
        let output = self
            .stdout_of(GitCommand::new("tag").flag("--list").flag(pattern))?
            .unwrap_or_default();

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    // --- Mutations ---

    /// Create a lightweight tag at HEAD
    pub fn create_tag(&self, tag: &ValidatedRef) -> GitResult<CommandResult> {
        self.run(GitCommand::mutation("tag").reference(tag))
    }

    pub fn delete_tag(&self, tag: &ValidatedRef) -> GitResult<CommandResult> {
        self.run(GitCommand::mutation("tag").flag("-d").reference(tag))
    }

    /// Check that a tag points at `expected`
    ///
    /// Both sides are resolved to full hashes first, so a short expected hash
    /// compares correctly.
    pub fn verify_tag(&self, tag: &ValidatedRef, expected: &ValidatedRef) -> GitResult<bool> {
        let Some(tag_commit) = self.resolve(&tag.qualified_tag()?)? else {
            debug!(tag = %tag, "tag does not resolve");
            return Ok(false);
        };
        let Some(expected_full) = self.resolve(expected)? else {
            debug!(expected = %expected, "expected commit does not resolve");
            return Ok(false);
        };

        Ok(tag_commit == expected_full)
    }

    /// Start `rebase -i` that stops for editing at exactly `target`
    ///
    /// The sequence editor rewrites only the todo line of `target` from `pick`
    /// to `edit`; every other commit keeps its `pick`. A root commit is
    /// rebased with `--root`.
    pub fn start_reword_rebase(
        &self,
        target: &ValidatedRef,
        flavor: SedFlavor,
    ) -> GitResult<CommandResult> {
        let short = self.short_hash(target)?.ok_or_else(|| {
            GitError::CommandFailed(format!("Failed to abbreviate commit {}", target))
        })?;
        let editor = SequenceEditor::mark_for_edit(&short, flavor)?;

        let command = GitCommand::mutation("rebase")
            .flag("-i")
            .flag("--keep-empty")
            .flag("--no-autosquash");

        let command = if self.has_parent(target)? {
            command.reference(&target.parent()?)
        } else {
            command.flag("--root")
        };

        self.run(command.sequence_editor(editor))
    }

    /// Replace the message of the commit the rebase is paused at
    pub fn amend_commit_message(&self, message: &CommitMessage) -> GitResult<CommandResult> {
        self.run(
            GitCommand::mutation("commit")
                .flag("--amend")
                .flag("--allow-empty")
                .flag("--cleanup=verbatim")
                .flag("-m")
                .message(message),
        )
    }

    pub fn continue_rebase(&self) -> GitResult<CommandResult> {
        self.run(GitCommand::mutation("rebase").flag("--continue"))
    }

    pub fn abort_rebase(&self) -> GitResult<CommandResult> {
        self.run(GitCommand::mutation("rebase").flag("--abort"))
    }

    pub fn reset_hard(&self, reference: &ValidatedRef) -> GitResult<CommandResult> {
        self.run(GitCommand::mutation("reset").flag("--hard").reference(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(repo_path: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_path)
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn create_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        git(&repo_path, &["init"]);
        git(&repo_path, &["config", "user.name", "Test User"]);
        git(&repo_path, &["config", "user.email", "test@example.com"]);
        git(&repo_path, &["config", "commit.gpgsign", "false"]);

        (temp_dir, repo_path)
    }

    fn commit(repo_path: &Path, file: &str, message: &str) {
        fs::write(repo_path.join(file), message).unwrap();
        git(repo_path, &["add", file]);
        git(repo_path, &["commit", "-m", message]);
    }

    fn validated(s: &str) -> ValidatedRef {
        RefValidator::new().validate(s).unwrap()
    }

    #[test]
    fn test_is_repository() {
        let (_temp, repo_path) = create_test_repo();
        assert!(Repository::new(&repo_path).is_repository());

        let not_repo = TempDir::new().unwrap();
        assert!(!Repository::new(not_repo.path()).is_repository());
        assert!(!Repository::new(not_repo.path().join("missing")).is_repository());
    }

    #[test]
    fn test_working_tree_clean_and_dirty() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        let repo = Repository::new(&repo_path);
        assert!(repo.is_working_tree_clean());

        fs::write(repo_path.join("untracked.txt"), "x").unwrap();
        assert!(!repo.is_working_tree_clean());
        let entries = repo.dirty_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "untracked.txt");
    }

    #[test]
    fn test_head_and_commit_record() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first commit");
        commit(&repo_path, "b.txt", "second commit");
        let repo = Repository::new(&repo_path);

        let head = repo.head_commit().unwrap();
        assert_eq!(head, git(&repo_path, &["rev-parse", "HEAD"]));

        let record = repo.commit_record(&validated("HEAD~1")).unwrap().unwrap();
        assert_eq!(record.subject, "first commit");
        assert_eq!(record.author, "Test User");
        assert!(head.starts_with(&repo.commit_record(&ValidatedRef::head()).unwrap().unwrap().short_hash));
    }

    #[test]
    fn test_commit_record_missing() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        let repo = Repository::new(&repo_path);

        assert!(repo.commit_record(&validated("deadbeef")).unwrap().is_none());
    }

    #[test]
    fn test_recent_commits() {
        let (_temp, repo_path) = create_test_repo();
        let repo = Repository::new(&repo_path);
        assert!(repo.recent_commits(5).unwrap().is_empty());

        for i in 0..3 {
            commit(&repo_path, &format!("f{i}.txt"), &format!("commit {i}"));
        }

        let commits = repo.recent_commits(2).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject, "commit 2");
        assert_eq!(commits[1].subject, "commit 1");
    }

    #[test]
    fn test_tag_lifecycle() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        let repo = Repository::new(&repo_path);
        let tag = validated("backup-before-reword-1");
        let head = validated(&repo.head_commit().unwrap());

        assert!(repo.create_tag(&tag).unwrap().success);
        assert!(repo.tag_exists(&tag).unwrap());
        assert!(repo.verify_tag(&tag, &head).unwrap());
        assert_eq!(repo.list_tags("backup-before-reword-*").unwrap(), vec!["backup-before-reword-1"]);

        assert!(repo.delete_tag(&tag).unwrap().success);
        assert!(!repo.tag_exists(&tag).unwrap());
        assert!(!repo.verify_tag(&tag, &head).unwrap());
    }

    #[test]
    fn test_verify_tag_with_short_hash() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        commit(&repo_path, "b.txt", "second");
        let repo = Repository::new(&repo_path);
        let tag = validated("marker");
        repo.create_tag(&tag).unwrap();

        let short = repo.short_hash(&ValidatedRef::head()).unwrap().unwrap();
        assert!(repo.verify_tag(&tag, &short).unwrap());
        assert!(!repo.verify_tag(&tag, &validated("HEAD~1")).unwrap());
    }

    #[test]
    fn test_root_and_ancestry() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        commit(&repo_path, "b.txt", "second");
        let repo = Repository::new(&repo_path);

        assert!(repo.has_parent(&ValidatedRef::head()).unwrap());
        assert!(!repo.has_parent(&validated("HEAD~1")).unwrap());
        assert!(repo.is_ancestor_of_head(&validated("HEAD~1")).unwrap());
        assert_eq!(repo.merge_count_since(&validated("HEAD~1")).unwrap(), 0);
        assert_eq!(repo.merge_count_since(&ValidatedRef::head()).unwrap(), 0);
        assert_eq!(repo.commits_after(&validated("HEAD~1")).unwrap(), 1);
        assert_eq!(repo.commits_after(&ValidatedRef::head()).unwrap(), 0);
    }

    #[test]
    fn test_rewrite_state_detection() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        let repo = Repository::new(&repo_path);
        assert!(!repo.is_rewrite_in_progress());
        assert!(!repo.has_orphaned_rewrite_state());

        // A marker directory without any rebase behind it
        fs::create_dir_all(repo_path.join(".git").join("rebase-merge")).unwrap();
        assert!(repo.is_rewrite_in_progress());
        assert!(repo.has_orphaned_rewrite_state());

        repo.cleanup_orphaned_rewrite_state().unwrap();
        assert!(!repo.is_rewrite_in_progress());
    }

    #[test]
    fn test_rewrite_state_with_head_name_is_kept() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        let repo = Repository::new(&repo_path);

        // No current patch, but git still knows which branch to return to
        let state = repo_path.join(".git").join("rebase-merge");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("head-name"), "refs/heads/main\n").unwrap();

        assert!(repo.is_rewrite_in_progress());
        assert!(!repo.has_orphaned_rewrite_state());
    }

    #[test]
    fn test_paused_rebase_stops_at_target() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        commit(&repo_path, "b.txt", "second");
        commit(&repo_path, "c.txt", "third");
        let repo = Repository::new(&repo_path);
        let target = repo.resolve(&validated("HEAD~1")).unwrap().unwrap();

        let flavor = crate::config::RuntimeInfo::detect().sed_flavor();
        let result = repo.start_reword_rebase(&validated(&target), flavor).unwrap();
        assert!(result.success, "{}", result.output);
        assert!(repo.is_rewrite_in_progress());
        assert!(!repo.has_orphaned_rewrite_state());
        assert_eq!(repo.head_commit().unwrap(), target);
        if let Some(stopped) = repo.stopped_commit() {
            assert!(target.starts_with(&stopped));
        }

        assert!(repo.abort_rebase().unwrap().success);
        assert!(!repo.is_rewrite_in_progress());
    }

    #[test]
    fn test_reset_hard() {
        let (_temp, repo_path) = create_test_repo();
        commit(&repo_path, "a.txt", "first");
        let first = git(&repo_path, &["rev-parse", "HEAD"]);
        commit(&repo_path, "b.txt", "second");
        let repo = Repository::new(&repo_path);

        assert!(repo.reset_hard(&validated(&first)).unwrap().success);
        assert_eq!(repo.head_commit().unwrap(), first);
        assert!(repo.is_working_tree_clean());
    }
}
