use clap::{Parser, Subcommand};
use git_reword::reword::BackupTag;
use git_reword::{AppResult, Config, OperationOutcome, RewordTransaction, RuntimeInfo};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "git-reword")]
#[command(version)]
#[command(about = "Safely rewrite the message of any past commit")]
struct Cli {
    /// Run as if started in <path>
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Print each step and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the message of a commit
    Reword {
        /// Commit to reword (hash, HEAD~2, ...)
        commit: String,

        /// New commit message
        message: String,

        /// Keep the backup tag after a successful reword
        #[arg(long)]
        keep_backup: bool,
    },

    /// Run the preflight checks only
    Check,

    /// Restore the repository to a backup tag
    Rollback {
        /// Backup tag name (backup-before-reword-...)
        tag: String,
    },

    /// List backup tags left in the repository
    Backups,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "git_reword=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> AppResult<ExitCode> {
    let config = Config::load()?;
    let mut transaction = RewordTransaction::from_config(&cli.repo, &config, RuntimeInfo::detect());

    if cli.verbose && !cli.json {
        transaction.set_progress(Some(Box::new(|step: &str, detail: Option<&str>| match detail {
            Some(detail) => eprintln!(">> {}: {}", step, detail),
            None => eprintln!(">> {}", step),
        })));
    }

    let outcome = match cli.command {
        Command::Reword {
            commit,
            message,
            keep_backup,
        } => transaction.reword(&commit, &message, keep_backup || config.behavior.keep_backup),
        Command::Check => transaction.preflight(),
        Command::Rollback { tag } => transaction.rollback(&tag),
        Command::Backups => {
            let backups = transaction.list_backups()?;
            print_backups(&backups, cli.json)?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    print_outcome(&outcome, cli.json)?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_outcome(outcome: &OperationOutcome, json: bool) -> AppResult<()> {
    if json {
        println!("{}", to_json(outcome)?);
        return Ok(());
    }

    if outcome.is_success() {
        println!("{}", outcome.message());
    } else {
        eprintln!("Error [{}]: {}", outcome.status().as_str(), outcome.message());
    }

    if let Some(old) = outcome.old_commit_hash() {
        println!("Old commit: {}", old);
    }
    if let Some(new) = outcome.new_commit_hash() {
        println!("New commit: {}", new);
    }
    if let Some(tag) = outcome.backup_tag() {
        println!("Backup tag: {}", tag);
        if outcome.is_success() {
            println!("To restore: git-reword rollback {}", tag);
        }
    }

    Ok(())
}

fn print_backups(backups: &[BackupTag], json: bool) -> AppResult<()> {
    if json {
        let entries: Vec<_> = backups
            .iter()
            .map(|tag| {
                serde_json::json!({
                    "name": tag.name,
                    "created": tag.created.map(|at| at.to_rfc3339()),
                    "commit": tag.commit,
                })
            })
            .collect();
        println!("{}", to_json(&entries)?);
        return Ok(());
    }

    if backups.is_empty() {
        println!("No backup tags found");
        return Ok(());
    }

    for tag in backups {
        let created = tag
            .created
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        let commit = tag.commit.as_deref().map_or("?", |hash| &hash[..hash.len().min(7)]);
        println!("{}  {}  {}", tag.name, commit, created);
    }

    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}
