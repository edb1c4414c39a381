use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::security::{FORBIDDEN_REF_CHARS, MAX_REF_LENGTH};

static ALLOWED_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-~^/]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Reference is empty")]
    Empty,

    #[error("Reference is {len} characters long (maximum {max})")]
    TooLong { len: usize, max: usize },

    #[error("Reference contains forbidden character {0:?}")]
    ForbiddenCharacter(char),

    #[error("Reference may not start with '-': {0}")]
    LeadingDash(String),

    #[error("Reference contains characters outside [A-Za-z0-9_.-~^/]: {0}")]
    InvalidCharacters(String),

    #[error("Commit message is empty")]
    EmptyMessage,

    #[error("Commit message contains a NUL byte")]
    MessageContainsNul,
}

/// A reference-like string that passed [`RefValidator`]
///
/// The field is private: the only way to build one is through
/// `RefValidator::validate`, which makes the check impossible to skip at the
/// command builder boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedRef(String);

impl ValidatedRef {
    /// The symbolic `HEAD` reference
    pub fn head() -> Self {
        Self("HEAD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First parent of this reference (`<ref>^`)
    pub fn parent(&self) -> Result<ValidatedRef, ValidationError> {
        RefValidator::new().validate(&format!("{}^", self.0))
    }

    /// Fully qualified tag reference (`refs/tags/<ref>`)
    ///
    /// Resolving through the qualified name keeps a branch with the same name
    /// from shadowing the tag.
    pub fn qualified_tag(&self) -> Result<ValidatedRef, ValidationError> {
        if self.0.starts_with("refs/tags/") {
            return Ok(self.clone());
        }
        RefValidator::new().validate(&format!("refs/tags/{}", self.0))
    }

    /// Commits after this reference up to HEAD (`<ref>..HEAD`)
    pub fn range_to_head(&self) -> Result<ValidatedRef, ValidationError> {
        RefValidator::new().validate(&format!("{}..HEAD", self.0))
    }

    /// This reference and everything after it up to HEAD (`<ref>^..HEAD`)
    pub fn inclusive_range_to_head(&self) -> Result<ValidatedRef, ValidationError> {
        RefValidator::new().validate(&format!("{}^..HEAD", self.0))
    }
}

impl fmt::Display for ValidatedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rejects reference strings that are unsafe to hand to git
#[derive(Debug, Clone, Copy, Default)]
pub struct RefValidator;

impl RefValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a commit reference, tag name or reset target
    pub fn validate(&self, candidate: &str) -> Result<ValidatedRef, ValidationError> {
        if candidate.is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = candidate.chars().count();
        if len > MAX_REF_LENGTH {
            return Err(ValidationError::TooLong {
                len,
                max: MAX_REF_LENGTH,
            });
        }

        self.check_forbidden_chars(candidate)?;

        // Would be parsed as an option by git
        if candidate.starts_with('-') {
            return Err(ValidationError::LeadingDash(candidate.to_string()));
        }

        if !ALLOWED_REF.is_match(candidate) {
            return Err(ValidationError::InvalidCharacters(candidate.to_string()));
        }

        Ok(ValidatedRef(candidate.to_string()))
    }

    /// Check whether a candidate would be accepted
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.validate(candidate).is_ok()
    }

    fn check_forbidden_chars(&self, candidate: &str) -> Result<(), ValidationError> {
        match candidate.chars().find(|c| FORBIDDEN_REF_CHARS.contains(c)) {
            Some(c) => Err(ValidationError::ForbiddenCharacter(c)),
            None => Ok(()),
        }
    }
}

/// New commit message text
///
/// Passed to git as a single argument, so quotes and other punctuation reach
/// the commit exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage(String);

impl CommitMessage {
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();

        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if text.contains('\0') {
            return Err(ValidationError::MessageContainsNul);
        }

        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First line of the message, as git reports it in `%s`
    pub fn subject(&self) -> &str {
        self.0.lines().next().unwrap_or_default()
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
