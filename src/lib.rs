pub mod audit;
pub mod config;
pub mod error;
pub mod git;
pub mod reword;
pub mod security;

/// Crate version reported by `--version` and `RuntimeInfo`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types for convenience
pub use config::{Config, RuntimeInfo};
pub use error::{AppError, AppResult, GitError, GitResult};
pub use git::{CommandRunner, GitExecutor, GitVersion, Repository};
pub use reword::{OperationOutcome, ProgressSink, RewordStatus, RewordTransaction};
pub use security::{RefValidator, ValidatedRef};
