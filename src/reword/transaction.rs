use crate::audit::AuditLogger;
use crate::config::{Config, RuntimeInfo};
use crate::error::GitResult;
use crate::git::{CommandResult, CommandRunner, GitExecutor, Repository};
use crate::reword::backup::{self, BackupTag};
use crate::reword::outcome::{OperationOutcome, RewordStatus};
use crate::reword::progress::ProgressSink;
use crate::security::{CommitMessage, RefValidator, ValidatedRef};
use chrono::Utc;
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Offending paths named in a dirty-tree failure
const MAX_LISTED_PATHS: usize = 5;

const LFS_WARNING: &str =
    "Warning: Git LFS is not available. If this repository uses LFS, the rebase may fail.";

/// Where a reword currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    PreflightPassed,
    BackupVerified,
    RewriteStarted,
    MessageAmended,
    RewriteResumed,
    Verified,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::PreflightPassed => "preflight-passed",
            Stage::BackupVerified => "backup-verified",
            Stage::RewriteStarted => "rewrite-started",
            Stage::MessageAmended => "message-amended",
            Stage::RewriteResumed => "rewrite-resumed",
            Stage::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// What compensation managed to undo
#[derive(Debug, Clone, Copy)]
struct Compensation {
    restored: bool,
    tag_kept: bool,
}

/// Facts about a reword that survive until its terminal outcome
struct Attempt<'a> {
    tag: &'a ValidatedRef,
    original_head: &'a str,
    target_hash: &'a str,
}

/// Rewrites the message of one past commit as a single all-or-nothing unit
///
/// A backup tag is created and verified before history is touched. Any failure
/// after that point aborts the rebase, hard-resets to the tag and only then
/// deletes it, so the caller either gets the new history or the old one.
pub struct RewordTransaction<R: CommandRunner = GitExecutor> {
    repo: Repository<R>,
    runtime: RuntimeInfo,
    progress: Option<Box<dyn ProgressSink>>,
    audit: Option<AuditLogger>,
}

impl RewordTransaction<GitExecutor> {
    /// Engine for the repository at `path` with default settings
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_repository(Repository::new(path), RuntimeInfo::detect())
    }

    /// Engine configured from the user's config file
    ///
    /// The git timeout comes from `[git]`; when `[behavior] audit_log` is set
    /// both mutating commands and terminal outcomes go to the audit log.
    pub fn from_config<P: AsRef<Path>>(path: P, config: &Config, runtime: RuntimeInfo) -> Self {
        let mut executor = GitExecutor::new(path).with_timeout(config.git_timeout());
        let mut audit = None;

        if config.behavior.audit_log {
            match AuditLogger::new() {
                Ok(logger) => {
                    executor = executor.with_audit(logger.clone());
                    audit = Some(logger);
                }
                Err(e) => warn!("Audit log disabled: {}", e),
            }
        }

        let mut transaction = Self::with_repository(Repository::with_runner(executor), runtime);
        transaction.audit = audit;
        transaction
    }
}

impl<R: CommandRunner> RewordTransaction<R> {
    pub fn with_repository(repo: Repository<R>, runtime: RuntimeInfo) -> Self {
        Self {
            repo,
            runtime,
            progress: None,
            audit: None,
        }
    }

    /// Attach a progress sink
    pub fn with_progress<P: ProgressSink + 'static>(mut self, sink: P) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Replace or detach the progress sink
    pub fn set_progress(&mut self, sink: Option<Box<dyn ProgressSink>>) {
        self.progress = sink;
    }

    /// Record terminal outcomes in `audit`
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn repository(&self) -> &Repository<R> {
        &self.repo
    }

    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    pub fn version(&self) -> &'static str {
        self.runtime.version
    }

    /// Backup tags currently in the repository, oldest first
    pub fn list_backups(&self) -> GitResult<Vec<BackupTag>> {
        backup::list_backup_tags(&self.repo)
    }

    // --- Preflight ---

    /// Check that a reword could start right now
    ///
    /// Missing git-lfs is not a failure; it only adds a warning to the message.
    pub fn preflight(&self) -> OperationOutcome {
        match self.run_preflight() {
            Ok(warning) => OperationOutcome::success(append_warning(
                "All preflight checks passed".to_string(),
                warning.as_deref(),
            )),
            Err(outcome) => outcome,
        }
    }

    fn run_preflight(&self) -> Result<Option<String>, OperationOutcome> {
        self.report("Checking git installation", None);
        if let Err(e) = self.repo.git_version() {
            return Err(OperationOutcome::failure(
                RewordStatus::ToolUnavailable,
                format!("Git is not available: {}", e),
            ));
        }

        self.report("Checking repository", Some(&self.repo.path().display().to_string()));
        if !self.repo.is_repository() {
            return Err(OperationOutcome::failure(
                RewordStatus::NotARepository,
                format!("Not a git repository: {}", self.repo.path().display()),
            ));
        }

        if self.repo.has_orphaned_rewrite_state() {
            warn!(repo = %self.repo.path().display(), "Found orphaned rebase state");
            self.report("Cleaning up orphaned rebase state", None);
            if let Err(e) = self.repo.cleanup_orphaned_rewrite_state() {
                return Err(OperationOutcome::failure(
                    RewordStatus::RewriteAlreadyInProgress,
                    format!("Failed to cleanup orphaned rebase state: {}", e),
                ));
            }
        }

        if self.repo.is_rewrite_in_progress() {
            return Err(OperationOutcome::failure(
                RewordStatus::RewriteAlreadyInProgress,
                "A rebase is already in progress. Please complete or abort it first.",
            ));
        }

        self.report("Checking working tree", None);
        let entries = self.repo.dirty_entries().map_err(|e| {
            OperationOutcome::failure(
                RewordStatus::DirtyWorkingTree,
                format!("Could not read working tree status: {}", e),
            )
        })?;

        if !entries.is_empty() {
            let mut message = String::from(
                "Working directory has uncommitted changes. Please commit or stash them first.",
            );
            for entry in entries.iter().take(MAX_LISTED_PATHS) {
                message.push_str("\n  ");
                message.push_str(&entry.path);
            }
            if entries.len() > MAX_LISTED_PATHS {
                message.push_str(&format!("\n  ... and {} more", entries.len() - MAX_LISTED_PATHS));
            }
            return Err(OperationOutcome::failure(RewordStatus::DirtyWorkingTree, message));
        }

        if self.repo.is_lfs_available() {
            Ok(None)
        } else {
            warn!("git-lfs not found");
            Ok(Some(LFS_WARNING.to_string()))
        }
    }

    // --- Reword ---

    /// Replace the message of `commit` with `message`
    ///
    /// `commit` may be any reference that names a non-merge ancestor of HEAD
    /// (`HEAD~2`, a short or full hash, ...). With `keep_backup` the backup tag
    /// survives a successful reword and its name is returned in the outcome.
    pub fn reword(&self, commit: &str, message: &str, keep_backup: bool) -> OperationOutcome {
        let outcome = self.run_reword(commit, message, keep_backup);
        self.audit_outcome("reword", &outcome);
        outcome
    }

    fn run_reword(&self, commit: &str, message: &str, keep_backup: bool) -> OperationOutcome {
        let mut stage = Stage::Idle;

        // Both inputs are checked before any git process is started
        let message = match CommitMessage::new(message) {
            Ok(message) => message,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::InvalidMessage,
                    format!("Invalid commit message: {}", e),
                );
            }
        };
        let target = match RefValidator::new().validate(commit) {
            Ok(target) => target,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::InvalidReference,
                    format!("Invalid commit reference: {}", e),
                );
            }
        };

        let warning = match self.run_preflight() {
            Ok(warning) => warning,
            Err(outcome) => return outcome,
        };
        self.advance(&mut stage, Stage::PreflightPassed);

        // --- Resolve the target ---
        self.report("Resolving commit", Some(target.as_str()));
        let record = match self.repo.commit_record(&target) {
            Ok(Some(record)) => record,
            Ok(None) => return commit_not_found(&target),
            Err(e) => {
                warn!(target = %target, error = %e, "commit lookup failed");
                return OperationOutcome::failure(
                    RewordStatus::Unknown,
                    format!("Failed to look up commit {}: {}", target, e),
                );
            }
        };
        let Ok(full) = RefValidator::new().validate(&record.hash) else {
            return commit_not_found(&target);
        };

        match self.repo.is_ancestor_of_head(&full) {
            Ok(true) => {}
            Ok(false) => {
                return OperationOutcome::failure(
                    RewordStatus::CommitNotFound,
                    format!("Commit {} is not reachable from HEAD", target),
                )
                .with_old_commit(Some(record.hash));
            }
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::CommitNotFound,
                    format!("Could not check whether {} is reachable from HEAD: {}", target, e),
                );
            }
        }

        match self.repo.merge_count_since(&full) {
            Ok(0) => {}
            Ok(merges) => {
                return OperationOutcome::failure(
                    RewordStatus::RewriteStartFailed,
                    format!(
                        "Cannot reword {}: history above it contains {} merge commit(s)",
                        record.short_hash, merges
                    ),
                )
                .with_old_commit(Some(record.hash));
            }
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::RewriteStartFailed,
                    format!("Could not inspect history above {}: {}", record.short_hash, e),
                );
            }
        }

        let distance = match self.repo.commits_after(&full) {
            Ok(distance) => Some(distance),
            Err(e) => {
                debug!(error = %e, "could not count commits above target");
                None
            }
        };

        // --- Backup ---
        let original_head = match self.repo.head_commit() {
            Ok(head) => head,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::Unknown,
                    format!("Failed to get HEAD commit: {}", e),
                );
            }
        };
        let Ok(original_head_ref) = RefValidator::new().validate(&original_head) else {
            return OperationOutcome::failure(
                RewordStatus::Unknown,
                format!("Unexpected HEAD commit: {}", original_head),
            );
        };

        let tag = match backup::unique_backup_tag(&self.repo, Utc::now()) {
            Ok(tag) => tag,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::Unknown,
                    format!("Failed to choose a backup tag name: {}", e),
                );
            }
        };

        self.report("Creating backup tag", Some(tag.as_str()));
        if let Some(failure) = failure_output(self.repo.create_tag(&tag)) {
            return OperationOutcome::failure(
                RewordStatus::Unknown,
                format!("Failed to create backup tag: {}", failure),
            )
            .with_old_commit(Some(record.hash));
        }

        let verified = self.repo.verify_tag(&tag, &original_head_ref);
        if !matches!(verified, Ok(true)) {
            if let Err(e) = &verified {
                warn!(tag = %tag, error = %e, "backup tag lookup failed");
            }
            let tag_kept = !self.delete_backup(&tag);
            return OperationOutcome::failure(
                RewordStatus::BackupVerificationFailed,
                format!("Backup tag verification failed: {} does not point at HEAD", tag),
            )
            .with_old_commit(Some(record.hash))
            .with_backup_tag(tag_kept.then(|| tag.to_string()));
        }
        self.advance(&mut stage, Stage::BackupVerified);

        let attempt = Attempt {
            tag: &tag,
            original_head: &original_head,
            target_hash: &record.hash,
        };

        // --- Rewrite ---
        self.report("Starting interactive rebase", Some(&record.short_hash));
        let started = self.repo.start_reword_rebase(&full, self.runtime.sed_flavor());
        if let Some(failure) = failure_output(started) {
            let (status, message) = if failure.contains("git-lfs") {
                (
                    RewordStatus::LfsRequired,
                    format!(
                        "Git LFS is required for this repository. Please install git-lfs.\n{}",
                        failure
                    ),
                )
            } else {
                (RewordStatus::RewriteStartFailed, format!("Rebase failed: {}", failure))
            };
            return self.fail_after_backup(&attempt, stage, status, message, false);
        }

        if !self.repo.is_rewrite_in_progress() {
            return self.fail_after_backup(
                &attempt,
                stage,
                RewordStatus::RewriteStartFailed,
                format!("Rebase did not stop at commit {}", record.short_hash),
                true,
            );
        }
        // A root commit may be re-created on its way to the stop, so git's own
        // record of where it stopped counts as well
        let paused = self.repo.head_commit();
        let at_target = paused.as_ref().is_ok_and(|head| *head == record.hash)
            || self
                .repo
                .stopped_commit()
                .is_some_and(|stopped| record.hash.starts_with(&stopped));
        if !at_target {
            let at = paused.unwrap_or_else(|_| "an unknown commit".to_string());
            return self.fail_after_backup(
                &attempt,
                stage,
                RewordStatus::RewriteStartFailed,
                format!("Rebase stopped at {} instead of {}", at, record.short_hash),
                true,
            );
        }
        self.advance(&mut stage, Stage::RewriteStarted);

        self.report("Amending commit message", None);
        if let Some(failure) = failure_output(self.repo.amend_commit_message(&message)) {
            return self.fail_after_backup(
                &attempt,
                stage,
                RewordStatus::AmendFailed,
                format!("Failed to amend commit message: {}", failure),
                true,
            );
        }
        self.advance(&mut stage, Stage::MessageAmended);

        self.report("Continuing rebase", None);
        if let Some(failure) = failure_output(self.repo.continue_rebase()) {
            if !failure.to_lowercase().contains("no rebase in progress") {
                return self.fail_after_backup(
                    &attempt,
                    stage,
                    RewordStatus::RewriteResumeFailed,
                    format!("Failed to complete rebase: {}", failure),
                    true,
                );
            }
            debug!("rebase had already finished");
        }
        if self.repo.is_rewrite_in_progress() {
            return self.fail_after_backup(
                &attempt,
                stage,
                RewordStatus::RewriteResumeFailed,
                "Failed to complete rebase: rebase is still in progress".to_string(),
                true,
            );
        }
        self.advance(&mut stage, Stage::RewriteResumed);

        // --- Verify ---
        let new_head = self.repo.head_commit().ok();
        let reworded = distance
            .and_then(|n| RefValidator::new().validate(&format!("HEAD~{}", n)).ok())
            .and_then(|reference| self.repo.commit_record(&reference).ok().flatten());
        if let Some(reworded) = &reworded {
            self.report(
                "Reword complete",
                Some(&format!("{} {}", reworded.short_hash, reworded.subject)),
            );
        }
        self.advance(&mut stage, Stage::Verified);

        // --- Cleanup ---
        let kept_tag = if keep_backup {
            Some(tag.to_string())
        } else {
            self.report("Removing backup tag", Some(tag.as_str()));
            (!self.delete_backup(&tag)).then(|| tag.to_string())
        };

        let mut summary = format!("Successfully reworded commit {}", record.short_hash);
        if let Some(reworded) = &reworded {
            summary.push_str(&format!(" (now {})", reworded.short_hash));
        }
        if let Some(kept) = &kept_tag {
            summary.push_str(&format!("\nBackup tag: {}", kept));
        }

        OperationOutcome::success(append_warning(summary, warning.as_deref()))
            .with_old_commit(Some(record.hash))
            .with_new_commit(new_head)
            .with_backup_tag(kept_tag)
    }

    /// Undo a reword that failed after the backup was verified
    ///
    /// `force_reset` is set once history may have been rewritten; before that
    /// a hard reset only happens if HEAD moved anyway.
    fn fail_after_backup(
        &self,
        attempt: &Attempt<'_>,
        stage: Stage,
        status: RewordStatus,
        message: String,
        force_reset: bool,
    ) -> OperationOutcome {
        warn!(stage = %stage, status = status.as_str(), "reword failed, compensating");
        let compensation = self.compensate(attempt, force_reset);

        let mut message = message;
        if !compensation.restored {
            message.push_str(&format!(
                "\nThe repository could not be restored automatically. Backup tag {} was kept; \
                 roll back with: git-reword rollback {}",
                attempt.tag, attempt.tag
            ));
        }

        OperationOutcome::failure(status, message)
            .with_old_commit(Some(attempt.target_hash.to_string()))
            .with_backup_tag(compensation.tag_kept.then(|| attempt.tag.to_string()))
    }

    fn compensate(&self, attempt: &Attempt<'_>, force_reset: bool) -> Compensation {
        self.report("Rolling back", Some(attempt.tag.as_str()));

        if let Some(failure) = failure_output(self.repo.abort_rebase()) {
            debug!(output = %failure, "rebase --abort reported failure");
        }

        let moved = self
            .repo
            .head_commit()
            .map_or(true, |head| head != attempt.original_head);

        if force_reset || moved {
            match attempt.tag.qualified_tag() {
                Ok(qualified) => {
                    if let Some(failure) = failure_output(self.repo.reset_hard(&qualified)) {
                        warn!(tag = %attempt.tag, output = %failure, "reset to backup tag failed");
                    }
                }
                Err(e) => warn!(tag = %attempt.tag, error = %e, "invalid backup tag"),
            }
        }

        let restored = !self.repo.is_rewrite_in_progress()
            && self
                .repo
                .head_commit()
                .is_ok_and(|head| head == attempt.original_head);

        if !restored {
            error!(
                tag = %attempt.tag,
                expected = attempt.original_head,
                "could not restore repository, keeping backup tag"
            );
            return Compensation {
                restored,
                tag_kept: true,
            };
        }

        Compensation {
            restored,
            tag_kept: !self.delete_backup(attempt.tag),
        }
    }

    // --- Rollback ---

    /// Restore HEAD and the working tree to a backup tag
    ///
    /// An interrupted rebase is aborted first. The tag itself is never removed.
    pub fn rollback(&self, tag: &str) -> OperationOutcome {
        let outcome = self.run_rollback(tag);
        self.audit_outcome("rollback", &outcome);
        outcome
    }

    fn run_rollback(&self, tag: &str) -> OperationOutcome {
        let tag = match RefValidator::new().validate(tag) {
            Ok(tag) => tag,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::RollbackFailed,
                    format!("Invalid backup tag: {}", e),
                );
            }
        };
        let qualified = match tag.qualified_tag() {
            Ok(qualified) => qualified,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::RollbackFailed,
                    format!("Invalid backup tag: {}", e),
                );
            }
        };

        self.report("Rolling back to backup", Some(tag.as_str()));

        if self.repo.is_rewrite_in_progress() {
            warn!("Aborting rebase in progress before rollback");
            if let Some(failure) = failure_output(self.repo.abort_rebase()) {
                return OperationOutcome::failure(
                    RewordStatus::RollbackFailed,
                    format!("Failed to abort rebase in progress: {}", failure),
                );
            }
        }

        if let Some(failure) = failure_output(self.repo.reset_hard(&qualified)) {
            return OperationOutcome::failure(
                RewordStatus::RollbackFailed,
                format!("Failed to reset to backup: {}", failure),
            );
        }

        let head = match self.repo.head_commit() {
            Ok(head) => head,
            Err(e) => {
                return OperationOutcome::failure(
                    RewordStatus::RollbackFailed,
                    format!("Failed to read HEAD after reset: {}", e),
                );
            }
        };
        let verified = RefValidator::new()
            .validate(&head)
            .ok()
            .is_some_and(|head_ref| matches!(self.repo.verify_tag(&tag, &head_ref), Ok(true)));
        if !verified {
            return OperationOutcome::failure(
                RewordStatus::RollbackFailed,
                format!("HEAD {} does not match backup tag {}", head, tag),
            )
            .with_new_commit(Some(head));
        }

        if !self.repo.is_working_tree_clean() {
            return OperationOutcome::failure(
                RewordStatus::RollbackFailed,
                "Working tree is not clean after rollback",
            )
            .with_new_commit(Some(head));
        }

        OperationOutcome::success(format!("Successfully rolled back to {}", tag))
            .with_new_commit(Some(head))
            .with_backup_tag(Some(tag.to_string()))
    }

    // --- Helpers ---

    /// Delete a backup tag, reporting whether it is gone
    fn delete_backup(&self, tag: &ValidatedRef) -> bool {
        match failure_output(self.repo.delete_tag(tag)) {
            None => true,
            Some(failure) => {
                warn!(tag = %tag, output = %failure, "failed to delete backup tag");
                false
            }
        }
    }

    fn advance(&self, stage: &mut Stage, next: Stage) {
        info!(from = %stage, to = %next, "reword stage");
        *stage = next;
    }

    fn report(&self, step: &str, detail: Option<&str>) {
        debug!(step, detail = detail.unwrap_or_default(), "progress");
        if let Some(sink) = &self.progress {
            sink.on_step(step, detail);
        }
    }

    fn audit_outcome(&self, operation: &str, outcome: &OperationOutcome) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.log_outcome(
            operation,
            outcome.status().as_str(),
            outcome.message(),
            outcome.backup_tag(),
            self.repo.path(),
        ) {
            warn!("Failed to write audit log: {}", e);
        }
    }
}

/// Combined output of a failed step, `None` when it succeeded
fn failure_output(result: GitResult<CommandResult>) -> Option<String> {
    match result {
        Ok(result) if result.success => None,
        Ok(result) => Some(result.output.trim().to_string()),
        Err(e) => Some(e.to_string()),
    }
}

fn commit_not_found(target: &ValidatedRef) -> OperationOutcome {
    OperationOutcome::failure(
        RewordStatus::CommitNotFound,
        format!("Commit not found: {}", target),
    )
}

fn append_warning(mut message: String, warning: Option<&str>) -> String {
    if let Some(warning) = warning {
        message.push('\n');
        message.push_str(warning);
    }
    message
}
