use crate::git::SedFlavor;
use std::fmt;

/// Operating system family the binary was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Bsd,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") || cfg!(target_os = "android") {
            Platform::Linux
        } else if cfg!(target_os = "macos") || cfg!(target_os = "ios") {
            Platform::MacOs
        } else if cfg!(any(
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            Platform::Bsd
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    /// `sed` dialect used for in-place todo list edits
    ///
    /// Git for Windows ships GNU sed in its shell.
    pub fn sed_flavor(self) -> SedFlavor {
        match self {
            Platform::MacOs | Platform::Bsd => SedFlavor::Bsd,
            Platform::Linux | Platform::Windows | Platform::Other => SedFlavor::Gnu,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Bsd => "BSD",
            Platform::Windows => "Windows",
            Platform::Other => "Unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only facts about the running process, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub version: &'static str,
    pub platform: Platform,
}

impl RuntimeInfo {
    pub fn detect() -> Self {
        Self {
            version: crate::VERSION,
            platform: Platform::current(),
        }
    }

    pub fn sed_flavor(&self) -> SedFlavor {
        self.platform.sed_flavor()
    }
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self::detect()
    }
}
