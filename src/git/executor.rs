use crate::audit::AuditLogger;
use crate::error::{GitError, GitResult};
use crate::git::command::{BASE_ENV, GitCommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of executing a git command
///
/// A non-zero exit is not an error at this level; callers inspect `success`
/// and keep `output` for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    /// stdout followed by stderr
    pub output: String,
    pub stdout: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn from_output(output: &Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut combined = stdout.clone();
        combined.push_str(&stderr);

        Self {
            success: output.status.success(),
            output: combined,
            stdout,
            exit_code: output.status.code().unwrap_or(-1),
        }
    }

    /// A failed result that never reached git
    pub fn failed(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            output: output.into(),
            stdout: String::new(),
            exit_code,
        }
    }

    /// A successful result with the given stdout
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        Self {
            success: true,
            output: stdout.clone(),
            stdout,
            exit_code: 0,
        }
    }

    /// The raw combined output when the command failed
    pub fn error(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            Some(self.output.trim())
        }
    }
}

/// The external command-execution capability
///
/// [`GitExecutor`] is the production implementation; tests wrap it to inject
/// failures or count invocations.
pub trait CommandRunner {
    /// Run a command to completion
    fn run(&self, command: &GitCommand) -> GitResult<CommandResult>;

    /// Working directory the commands run in
    fn repo_path(&self) -> &Path;
}

/// Executes git commands within a repository
#[derive(Debug, Clone)]
pub struct GitExecutor {
    repo_path: PathBuf,
    timeout: Option<Duration>,
    audit: Option<AuditLogger>,
}

impl GitExecutor {
    /// Create a new GitExecutor for the given repository path
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            timeout: None,
            audit: None,
        }
    }

    /// Kill any git process still running after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record every mutating command in the audit log
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn spawn(&self, command: &GitCommand) -> GitResult<Child> {
        let mut cmd = Command::new("git");
        cmd.args(command.argv())
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in BASE_ENV {
            cmd.env(key, value);
        }
        for (key, value) in command.env() {
            cmd.env(key, value);
        }

        cmd.spawn()
            .map_err(|e| GitError::CommandFailed(format!("Failed to execute git: {}", e)))
    }

    fn wait_with_timeout(
        &self,
        mut child: Child,
        timeout: Duration,
        command: &GitCommand,
    ) -> GitResult<Output> {
        // Drain both pipes while polling so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout));
        let stderr_reader = thread::spawn(move || drain(stderr));

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!(command = %command.display(), "git did not finish in time, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    command: command.display(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(Output {
            status,
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
        })
    }

    fn audit(&self, command: &GitCommand, result: &CommandResult) {
        if !command.is_mutation() {
            return;
        }
        if let Some(audit) = &self.audit {
            let line = format!("git {}", command.display());
            if let Err(e) = audit.log_command(&line, &self.repo_path, result.exit_code) {
                warn!("Failed to write audit log: {}", e);
            }
        }
    }
}

impl CommandRunner for GitExecutor {
    fn run(&self, command: &GitCommand) -> GitResult<CommandResult> {
        debug!(command = %command.display(), repo = %self.repo_path.display(), "running git");

        let child = self.spawn(command)?;
        let output = match self.timeout {
            Some(timeout) => self.wait_with_timeout(child, timeout, command)?,
            None => child.wait_with_output()?,
        };

        let result = CommandResult::from_output(&output);
        if !result.success {
            debug!(
                command = %command.display(),
                exit_code = result.exit_code,
                output = %result.output.trim(),
                "git command failed"
            );
        }

        self.audit(command, &result);
        Ok(result)
    }

    fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
