use serde::Serialize;
use std::fmt;

/// Terminal status of a preflight, reword or rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RewordStatus {
    Success,
    ToolUnavailable,
    /// Only ever a warning; preflight does not fail on it
    LargeFileSupportUnavailable,
    NotARepository,
    DirtyWorkingTree,
    RewriteAlreadyInProgress,
    InvalidReference,
    InvalidMessage,
    CommitNotFound,
    BackupVerificationFailed,
    RewriteStartFailed,
    LfsRequired,
    AmendFailed,
    RewriteResumeFailed,
    RollbackFailed,
    Unknown,
}

impl RewordStatus {
    pub fn is_success(self) -> bool {
        self == RewordStatus::Success
    }

    /// Variant name, stable for logs and machine output
    pub fn as_str(self) -> &'static str {
        match self {
            RewordStatus::Success => "Success",
            RewordStatus::ToolUnavailable => "ToolUnavailable",
            RewordStatus::LargeFileSupportUnavailable => "LargeFileSupportUnavailable",
            RewordStatus::NotARepository => "NotARepository",
            RewordStatus::DirtyWorkingTree => "DirtyWorkingTree",
            RewordStatus::RewriteAlreadyInProgress => "RewriteAlreadyInProgress",
            RewordStatus::InvalidReference => "InvalidReference",
            RewordStatus::InvalidMessage => "InvalidMessage",
            RewordStatus::CommitNotFound => "CommitNotFound",
            RewordStatus::BackupVerificationFailed => "BackupVerificationFailed",
            RewordStatus::RewriteStartFailed => "RewriteStartFailed",
            RewordStatus::LfsRequired => "LfsRequired",
            RewordStatus::AmendFailed => "AmendFailed",
            RewordStatus::RewriteResumeFailed => "RewriteResumeFailed",
            RewordStatus::RollbackFailed => "RollbackFailed",
            RewordStatus::Unknown => "Unknown",
        }
    }

    /// Short human readable description
    pub fn description(self) -> &'static str {
        match self {
            RewordStatus::Success => "Success",
            RewordStatus::ToolUnavailable => "Git is not available",
            RewordStatus::LargeFileSupportUnavailable => "Git LFS is not available",
            RewordStatus::NotARepository => "Not a git repository",
            RewordStatus::DirtyWorkingTree => "Working tree has uncommitted changes",
            RewordStatus::RewriteAlreadyInProgress => "A rebase is already in progress",
            RewordStatus::InvalidReference => "Invalid reference",
            RewordStatus::InvalidMessage => "Invalid commit message",
            RewordStatus::CommitNotFound => "Commit not found",
            RewordStatus::BackupVerificationFailed => "Backup tag verification failed",
            RewordStatus::RewriteStartFailed => "Rebase operation failed to start",
            RewordStatus::LfsRequired => {
                "Git LFS is required for this repository (install git-lfs)"
            }
            RewordStatus::AmendFailed => "Failed to amend commit message",
            RewordStatus::RewriteResumeFailed => "Failed to complete rebase",
            RewordStatus::RollbackFailed => "Rollback failed",
            RewordStatus::Unknown => "Unknown error",
        }
    }
}

impl fmt::Display for RewordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// The value every engine entry point returns
///
/// Read-only once built; only the engine constructs outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    status: RewordStatus,
    message: String,
    old_commit_hash: Option<String>,
    new_commit_hash: Option<String>,
    backup_tag: Option<String>,
}

impl OperationOutcome {
    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self {
            status: RewordStatus::Success,
            message: message.into(),
            old_commit_hash: None,
            new_commit_hash: None,
            backup_tag: None,
        }
    }

    pub(crate) fn failure(status: RewordStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            old_commit_hash: None,
            new_commit_hash: None,
            backup_tag: None,
        }
    }

    pub(crate) fn with_old_commit(mut self, hash: Option<String>) -> Self {
        self.old_commit_hash = hash;
        self
    }

    pub(crate) fn with_new_commit(mut self, hash: Option<String>) -> Self {
        self.new_commit_hash = hash;
        self
    }

    pub(crate) fn with_backup_tag(mut self, tag: Option<String>) -> Self {
        self.backup_tag = tag;
        self
    }

    pub fn status(&self) -> RewordStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn old_commit_hash(&self) -> Option<&str> {
        self.old_commit_hash.as_deref()
    }

    pub fn new_commit_hash(&self) -> Option<&str> {
        self.new_commit_hash.as_deref()
    }

    /// Backup tag the caller now owns, if any
    pub fn backup_tag(&self) -> Option<&str> {
        self.backup_tag.as_deref()
    }
}
