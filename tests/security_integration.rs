// Security integration tests
// Unsafe references never reach git; messages reach it only as inert data

mod helpers;

use git_reword::config::RuntimeInfo;
use git_reword::git::{GitCommand, SedFlavor, SequenceEditor};
use git_reword::security::{CommitMessage, RefValidator};
use git_reword::{Repository, RewordStatus, RewordTransaction};
use helpers::{FaultyRunner, backup_tags, create_repo_with_commits, git, head, subjects};

const HOSTILE_REFS: &[&str] = &[
    "HEAD; rm -rf /",
    "HEAD && whoami",
    "HEAD | cat /etc/passwd",
    "$(whoami)",
    "`whoami`",
    "HEAD\nrm -rf /",
    "HEAD > /tmp/out",
    "--exec=whoami",
    "-n1",
    "",
];

fn counting_transaction(repo_path: &std::path::Path) -> RewordTransaction<FaultyRunner> {
    RewordTransaction::with_repository(
        Repository::with_runner(FaultyRunner::passthrough(repo_path)),
        RuntimeInfo::detect(),
    )
}

#[test]
fn test_hostile_references_never_reach_git() {
    let (_temp, repo_path) = create_repo_with_commits(2);
    let transaction = counting_transaction(&repo_path);

    for reference in HOSTILE_REFS {
        let outcome = transaction.reword(reference, "Harmless message", false);
        assert_eq!(
            outcome.status(),
            RewordStatus::InvalidReference,
            "{:?} should be rejected",
            reference
        );
    }

    assert_eq!(transaction.repository().runner().call_count(), 0);
    assert!(backup_tags(&repo_path).is_empty());
}

#[test]
fn test_overlong_reference_never_reaches_git() {
    let (_temp, repo_path) = create_repo_with_commits(1);
    let transaction = counting_transaction(&repo_path);

    let outcome = transaction.reword(&"a".repeat(257), "Harmless message", false);

    assert_eq!(outcome.status(), RewordStatus::InvalidReference);
    assert_eq!(transaction.repository().runner().call_count(), 0);
}

#[test]
fn test_invalid_message_never_reaches_git() {
    let (_temp, repo_path) = create_repo_with_commits(1);
    let transaction = counting_transaction(&repo_path);

    for message in ["", "   \n", "null\0byte"] {
        let outcome = transaction.reword("HEAD", message, false);
        assert_eq!(outcome.status(), RewordStatus::InvalidMessage);
    }

    assert_eq!(transaction.repository().runner().call_count(), 0);
}

#[test]
fn test_hostile_rollback_tag_never_reaches_git() {
    let (_temp, repo_path) = create_repo_with_commits(1);
    let before = head(&repo_path);
    let transaction = counting_transaction(&repo_path);

    for tag in HOSTILE_REFS {
        let outcome = transaction.rollback(tag);
        assert_eq!(outcome.status(), RewordStatus::RollbackFailed);
    }

    assert_eq!(transaction.repository().runner().call_count(), 0);
    assert_eq!(head(&repo_path), before);
}

#[test]
fn test_shell_syntax_in_message_is_literal() {
    let (_temp, repo_path) = create_repo_with_commits(2);
    let message = "Fix $(touch pwned) and `touch pwned2`; rm -rf / | cat";

    let outcome = RewordTransaction::new(&repo_path).reword("HEAD~1", message, false);

    assert!(outcome.is_success(), "{}", outcome.message());
    assert_eq!(subjects(&repo_path), vec!["Commit 2", message]);
    assert!(!repo_path.join("pwned").exists());
    assert!(!repo_path.join("pwned2").exists());
}

#[test]
fn test_message_starting_with_dash_is_not_an_option() {
    let (_temp, repo_path) = create_repo_with_commits(2);

    let outcome = RewordTransaction::new(&repo_path).reword("HEAD", "--amend is a word too", false);

    assert!(outcome.is_success(), "{}", outcome.message());
    assert_eq!(git(&repo_path, &["log", "-1", "--format=%s"]), "--amend is a word too");
}

#[test]
fn test_sequence_editor_requires_hex_hash() {
    let validator = RefValidator::new();

    let symbolic = validator.validate("HEAD~1").unwrap();
    assert!(SequenceEditor::mark_for_edit(&symbolic, SedFlavor::Gnu).is_err());

    let short = validator.validate("abc1234").unwrap();
    let editor = SequenceEditor::mark_for_edit(&short, SedFlavor::Gnu).unwrap();
    assert!(editor.as_str().contains("abc1234"));
}

#[test]
fn test_command_carries_message_as_single_argument() {
    let message = CommitMessage::new("one; two && three").unwrap();
    let command = GitCommand::mutation("commit")
        .flag("--amend")
        .flag("-m")
        .message(&message);

    let argv: Vec<&str> = command.argv().collect();
    assert_eq!(argv, vec!["commit", "--amend", "-m", "one; two && three"]);
}
