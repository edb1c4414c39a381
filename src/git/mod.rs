pub mod command;
pub mod executor;
pub mod parser;
pub mod repository;
pub mod version;

// Re-export commonly used types
pub use command::{GitCommand, SedFlavor, SequenceEditor};
pub use executor::{CommandResult, CommandRunner, GitExecutor};
pub use parser::{CommitRecord, FileStatus, StatusEntry, parse_commit_log, parse_commit_record, parse_status_porcelain_v2};
pub use repository::Repository;
pub use version::{GitVersion, LfsVersion};
