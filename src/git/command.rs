use crate::security::{CommitMessage, ValidatedRef, ValidationError};

/// Environment applied to every git child process
///
/// `GIT_EDITOR=true` turns any editor git would open into a no-op, and the C
/// locale keeps the output text stable for the few signatures we match on.
pub const BASE_ENV: &[(&str, &str)] = &[
    ("GIT_EDITOR", "true"),
    ("GIT_TERMINAL_PROMPT", "0"),
    ("LC_ALL", "C"),
];

/// Flavor of `sed` used to rewrite the rebase todo list in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SedFlavor {
    /// GNU sed: `sed -i`
    Gnu,
    /// BSD/macOS sed: `sed -i ''`
    Bsd,
}

/// Value for `GIT_SEQUENCE_EDITOR` that edits exactly one todo line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEditor(String);

impl SequenceEditor {
    /// Build a sed script that turns `pick <short>` into `edit <short>`
    ///
    /// `short` must be the abbreviation git writes into the todo list
    /// (`rev-parse --short`). Only hex digits are accepted because the value
    /// is embedded in a script that git runs through `sh`.
    pub fn mark_for_edit(short: &ValidatedRef, flavor: SedFlavor) -> Result<Self, ValidationError> {
        let hash = short.as_str();
        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidCharacters(hash.to_string()));
        }

        let mut script = match flavor {
            SedFlavor::Gnu => String::from("sed -i"),
            SedFlavor::Bsd => String::from("sed -i ''"),
        };

        // `p` is what git writes when rebase.abbreviateCommands is set
        for keyword in ["pick", "p"] {
            script.push_str(&format!(" -e 's/^{keyword} {hash} /edit {hash} /'"));
            script.push_str(&format!(" -e 's/^{keyword} {hash}$/edit {hash}/'"));
        }

        Ok(Self(script))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A git invocation assembled from trusted pieces only
///
/// Arguments come from `&'static str` flags, [`ValidatedRef`]s,
/// [`CommitMessage`]s and counts. There is no way to push an
/// arbitrary `String`, so every ref-like value went through the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    subcommand: &'static str,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
    mutation: bool,
}

impl GitCommand {
    /// A read-only query
    pub fn new(subcommand: &'static str) -> Self {
        Self {
            subcommand,
            args: Vec::new(),
            env: Vec::new(),
            mutation: false,
        }
    }

    /// A command that changes repository state
    pub fn mutation(subcommand: &'static str) -> Self {
        Self {
            mutation: true,
            ..Self::new(subcommand)
        }
    }

    pub fn flag(mut self, flag: &'static str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    pub fn reference(mut self, reference: &ValidatedRef) -> Self {
        self.args.push(reference.as_str().to_string());
        self
    }

    pub fn message(mut self, message: &CommitMessage) -> Self {
        self.args.push(message.as_str().to_string());
        self
    }

    /// Limit output to `count` entries (`-n<count>`)
    pub fn count(mut self, count: usize) -> Self {
        self.args.push(format!("-n{count}"));
        self
    }

    pub fn sequence_editor(mut self, editor: SequenceEditor) -> Self {
        self.env.push(("GIT_SEQUENCE_EDITOR", editor.0));
        self
    }

    pub fn subcommand(&self) -> &'static str {
        self.subcommand
    }

    /// Full argument vector, subcommand first
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.subcommand).chain(self.args.iter().map(String::as_str))
    }

    /// Extra environment on top of [`BASE_ENV`]
    pub fn env(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_mutation(&self) -> bool {
        self.mutation
    }

    /// Human readable form for logs, without the `git` prefix
    pub fn display(&self) -> String {
        self.argv().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::RefValidator;

    fn validated(s: &str) -> ValidatedRef {
        RefValidator::new().validate(s).unwrap()
    }

    #[test]
    fn test_build_query() {
        let cmd = GitCommand::new("log")
            .count(5)
            .flag("--format=%H|%h|%s|%an|%ai")
            .reference(&validated("HEAD~2"));

        let argv: Vec<&str> = cmd.argv().collect();
        assert_eq!(argv, vec!["log", "-n5", "--format=%H|%h|%s|%an|%ai", "HEAD~2"]);
        assert!(!cmd.is_mutation());
    }

    #[test]
    fn test_message_is_one_argument() {
        let message = CommitMessage::new("Fix: it's a \"typo\"").unwrap();
        let cmd = GitCommand::mutation("commit").flag("--amend").flag("-m").message(&message);

        let argv: Vec<&str> = cmd.argv().collect();
        assert_eq!(argv.len(), 4);
        assert_eq!(argv[3], "Fix: it's a \"typo\"");
        assert!(cmd.is_mutation());
    }

    #[test]
    fn test_display() {
        let cmd = GitCommand::mutation("tag").flag("-d").reference(&validated("backup-1"));
        assert_eq!(cmd.display(), "tag -d backup-1");
    }

    #[test]
    fn test_sequence_editor_gnu() {
        let editor = SequenceEditor::mark_for_edit(&validated("1a2b3c4"), SedFlavor::Gnu).unwrap();
        assert!(editor.as_str().starts_with("sed -i -e"));
        assert!(editor.as_str().contains("'s/^pick 1a2b3c4 /edit 1a2b3c4 /'"));
        assert!(editor.as_str().contains("'s/^p 1a2b3c4 /edit 1a2b3c4 /'"));
    }

    #[test]
    fn test_sequence_editor_bsd() {
        let editor = SequenceEditor::mark_for_edit(&validated("1a2b3c4"), SedFlavor::Bsd).unwrap();
        assert!(editor.as_str().starts_with("sed -i '' -e"));
    }

    #[test]
    fn test_sequence_editor_rejects_non_hex() {
        let result = SequenceEditor::mark_for_edit(&validated("HEAD~1"), SedFlavor::Gnu);
        assert!(matches!(result, Err(ValidationError::InvalidCharacters(_))));
    }

    #[test]
    fn test_sequence_editor_sets_env() {
        let editor = SequenceEditor::mark_for_edit(&validated("abcdef0"), SedFlavor::Gnu).unwrap();
        let cmd = GitCommand::mutation("rebase").flag("-i").sequence_editor(editor.clone());

        let env: Vec<(&str, &str)> = cmd.env().collect();
        assert_eq!(env, vec![("GIT_SEQUENCE_EDITOR", editor.as_str())]);
    }
}
