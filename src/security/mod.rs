pub mod validator;

pub use validator::{CommitMessage, RefValidator, ValidatedRef, ValidationError};

/// Longest reference string accepted for interpolation into a git command
pub const MAX_REF_LENGTH: usize = 256;

/// Shell metacharacters that are never allowed inside a reference
///
/// Commands are executed without a shell, but references also end up inside
/// the sequence-editor script that git hands to `sh`, so the list stays strict.
pub const FORBIDDEN_REF_CHARS: &[char] = &[
    ';', '|', '&', '$', '`', '\\', '!', '(', ')', '{', '}', '[', ']', '<', '>', '"', '\'',
    '\n', '\r', '\t',
];
