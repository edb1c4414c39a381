use crate::error::{GitError, GitResult};
use std::fmt;
use std::process::Command;

/// Minimum required git version
///
/// `rebase --show-current-patch` and `rev-parse --absolute-git-dir` are both
/// older than this.
const MIN_GIT_VERSION: (u32, u32) = (2, 20);

/// Represents a git version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Detect the installed git version
    pub fn detect() -> GitResult<Self> {
        let output = Command::new("git")
            .arg("--version")
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| GitError::GitVersionDetectionFailed(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            return Err(GitError::GitVersionDetectionFailed(
                "git --version command failed".to_string(),
            ));
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse git version from string like "git version 2.39.2"
    pub fn parse(version_str: &str) -> GitResult<Self> {
        // Also seen: "git version 2.39.2.windows.1", "git version 2.39.3 (Apple Git-146)"
        let parts: Vec<&str> = version_str.split_whitespace().collect();

        if parts.len() < 3 || parts[0] != "git" || parts[1] != "version" {
            return Err(GitError::ParseError(format!(
                "Unexpected git version format: {}",
                version_str.trim()
            )));
        }

        let (major, minor, patch) = parse_dotted(parts[2])?;
        Ok(GitVersion { major, minor, patch })
    }

    /// Check if this version meets minimum requirements
    pub fn is_supported(&self) -> bool {
        (self.major, self.minor) >= MIN_GIT_VERSION
    }

    /// Detect git and check that it is recent enough
    pub fn validate() -> GitResult<Self> {
        let version = Self::detect()?;

        if !version.is_supported() {
            return Err(GitError::GitVersionTooOld(format!(
                "{}\n\nPlease upgrade git to version {}.{} or higher.",
                version, MIN_GIT_VERSION.0, MIN_GIT_VERSION.1
            )));
        }

        Ok(version)
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version of the git-lfs extension, from `git lfs version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LfsVersion {
    /// Parse output like "git-lfs/3.4.1 (GitHub; linux amd64; go 1.21.5)"
    pub fn parse(version_str: &str) -> GitResult<Self> {
        let first = version_str.split_whitespace().next().unwrap_or_default();
        let numbers = first.strip_prefix("git-lfs/").ok_or_else(|| {
            GitError::ParseError(format!("Unexpected git-lfs version format: {}", version_str.trim()))
        })?;

        let (major, minor, patch) = parse_dotted(numbers)?;
        Ok(LfsVersion { major, minor, patch })
    }
}

impl fmt::Display for LfsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn parse_dotted(version_nums: &str) -> GitResult<(u32, u32, u32)> {
    let nums: Vec<&str> = version_nums.split('.').collect();

    if nums.len() < 2 {
        return Err(GitError::ParseError(format!(
            "Invalid version number format: {}",
            version_nums
        )));
    }

    let major = nums[0]
        .parse::<u32>()
        .map_err(|_| GitError::ParseError(format!("Invalid major version: {}", nums[0])))?;

    let minor = nums[1]
        .parse::<u32>()
        .map_err(|_| GitError::ParseError(format!("Invalid minor version: {}", nums[1])))?;

    // Patch may carry a non-numeric suffix
    let patch = nums.get(2).and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);

    Ok((major, minor, patch))
}
