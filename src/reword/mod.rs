//! The reword engine: backup, rewrite, compensation and rollback

pub mod backup;
pub mod outcome;
pub mod progress;
pub mod transaction;

pub use backup::{BACKUP_TAG_PREFIX, BackupTag, backup_tag_name, list_backup_tags};
pub use outcome::{OperationOutcome, RewordStatus};
pub use progress::ProgressSink;
pub use transaction::RewordTransaction;
