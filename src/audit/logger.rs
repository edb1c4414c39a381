use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only record of history-changing git commands and their outcomes
///
/// When a reword goes wrong this is the trail that tells which tag to roll
/// back to and which commands already ran.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        Self::with_path(Self::default_log_path()?)
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/git-reword/history.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "HOME environment variable not set")
        })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("git-reword")
            .join("history.log"))
    }

    /// Log a mutating command execution
    pub fn log_command(&self, command: &str, repo_path: &Path, exit_code: i32) -> std::io::Result<()> {
        self.append(repo_path, &format!("[exit:{}] {}", exit_code, command))
    }

    /// Log the terminal outcome of a reword or rollback
    pub fn log_outcome(
        &self,
        operation: &str,
        status: &str,
        message: &str,
        backup_tag: Option<&str>,
        repo_path: &Path,
    ) -> std::io::Result<()> {
        let entry = format!(
            "[OUTCOME:{}] operation={} backup_tag=\"{}\" message=\"{}\"",
            status,
            operation,
            backup_tag.unwrap_or_default(),
            single_line(message)
        );
        self.append(repo_path, &entry)
    }

    fn append(&self, repo_path: &Path, entry: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());

        let line = format!("[{}] [{}] [{}] {}\n", timestamp, user, repo_path.display(), entry);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(line.as_bytes())?;
        file.flush()
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        if fs::metadata(&self.log_path)?.len() > MAX_LOG_SIZE {
            // history.log -> history.log.1
            fs::rename(&self.log_path, self.log_path.with_extension("log.1"))?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn single_line(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join(" | ")
}
