use crate::error::{GitError, GitResult};
use crate::git::{CommandRunner, Repository};
use crate::security::{RefValidator, ValidatedRef};
use chrono::{DateTime, Utc};

pub const BACKUP_TAG_PREFIX: &str = "backup-before-reword-";

/// Glob matching every backup tag, for `git tag --list`
pub const BACKUP_TAG_GLOB: &str = "backup-before-reword-*";

/// Suffixes tried when the timestamped name is already taken
const MAX_COLLISION_SUFFIX: u32 = 100;

/// A backup tag left in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTag {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub commit: Option<String>,
}

/// `backup-before-reword-<unix-timestamp>`
pub fn backup_tag_name(at: DateTime<Utc>) -> String {
    format!("{}{}", BACKUP_TAG_PREFIX, at.timestamp())
}

/// Creation time encoded in a backup tag name
pub fn backup_tag_time(name: &str) -> Option<DateTime<Utc>> {
    let rest = name.strip_prefix(BACKUP_TAG_PREFIX)?;
    // Drop a collision suffix such as "-2"
    let seconds = rest.split('-').next()?;
    DateTime::from_timestamp(seconds.parse().ok()?, 0)
}

/// Pick a backup tag name that does not exist yet
///
/// Two rewords in the same second would otherwise share a name, so a
/// `-1`, `-2`, ... suffix is appended until a free name is found.
pub fn unique_backup_tag<R: CommandRunner>(
    repo: &Repository<R>,
    at: DateTime<Utc>,
) -> GitResult<ValidatedRef> {
    let validator = RefValidator::new();
    let base = backup_tag_name(at);

    let candidate = validator.validate(&base)?;
    if !repo.tag_exists(&candidate)? {
        return Ok(candidate);
    }

    for suffix in 1..=MAX_COLLISION_SUFFIX {
        let candidate = validator.validate(&format!("{}-{}", base, suffix))?;
        if !repo.tag_exists(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(GitError::CommandFailed(format!(
        "No free backup tag name for {} after {} attempts",
        base, MAX_COLLISION_SUFFIX
    )))
}

/// All backup tags in the repository, oldest first
pub fn list_backup_tags<R: CommandRunner>(repo: &Repository<R>) -> GitResult<Vec<BackupTag>> {
    let validator = RefValidator::new();
    let mut tags = Vec::new();

    for name in repo.list_tags(BACKUP_TAG_GLOB)? {
        let commit = match validator.validate(&name) {
            Ok(tag) => repo.resolve(&tag.qualified_tag()?)?,
            Err(_) => None,
        };
        tags.push(BackupTag {
            created: backup_tag_time(&name),
            name,
            commit,
        });
    }

    tags.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
    Ok(tags)
}
