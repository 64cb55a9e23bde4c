mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gs_telemetry::logging::{self, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// gitscribe -- record file edits as commits on per-session git refs.
#[derive(Parser)]
#[command(name = "gitscribe", version, about)]
struct Cli {
    /// Session (chat) id. Required by every command that records a change.
    #[arg(long, global = true)]
    chat_id: Option<String>,

    /// Repository directory (defaults to the current directory).
    #[arg(short = 'C', long, global = true)]
    repo: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session and print its chat id.
    Init {
        /// Reuse the chat id recorded in HEAD's commit message.
        #[arg(long)]
        reuse_head: bool,
        /// Subject line of the session marker commit.
        #[arg(long)]
        subject: Option<String>,
        /// Prompt stored in the marker commit body.
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Write a file (content from --content or stdin) and record it.
    Write {
        path: PathBuf,
        #[arg(short, long)]
        description: String,
        #[arg(long)]
        content: Option<String>,
    },

    /// Remove a tracked file and record the removal.
    Rm {
        path: PathBuf,
        #[arg(short, long)]
        description: String,
    },

    /// Add (a+x) or remove (a-x) the executable bits.
    Chmod { path: PathBuf, mode: String },

    /// Record a change made outside gitscribe. Files must be tracked; a
    /// directory is recorded whole, untracked files included.
    Record {
        path: PathBuf,
        #[arg(short, long)]
        description: String,
    },

    /// Show the line-ending policy for a path and where it came from.
    Eol { path: PathBuf },

    /// List the rules that apply to a path.
    Rules { path: PathBuf },

    /// List sessions and their tips.
    Sessions,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let dir = match cli.repo {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let chat_id = cli.chat_id.as_deref();
    tracing::debug!(dir = %dir.display(), chat_id = ?chat_id, "running command");

    match cli.command {
        Commands::Init {
            reuse_head,
            subject,
            prompt,
        } => commands::init::run(&dir, reuse_head, subject, prompt).await,
        Commands::Write {
            path,
            description,
            content,
        } => commands::edit::write(&dir, chat_id, &path, &description, content).await,
        Commands::Rm { path, description } => {
            commands::edit::remove(&dir, chat_id, &path, &description).await
        }
        Commands::Chmod { path, mode } => commands::edit::chmod(&dir, chat_id, &path, &mode).await,
        Commands::Record { path, description } => {
            commands::record::run(&dir, chat_id, &path, &description).await
        }
        Commands::Eol { path } => commands::inspect::eol(&dir, &path).await,
        Commands::Rules { path } => commands::inspect::rules(&dir, &path).await,
        Commands::Sessions => commands::inspect::sessions(&dir).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    logging::init(format, "gitscribe", logging::level_for_verbosity(cli.verbose));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gitscribe", "write", "/r/a.txt", "-d", "add a", "--content", "x", "--chat-id", "abc",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.chat_id.as_deref(), Some("abc"));
        assert!(cli.log_json);
        match cli.command {
            Commands::Write {
                path,
                description,
                content,
            } => {
                assert_eq!(path, PathBuf::from("/r/a.txt"));
                assert_eq!(description, "add a");
                assert_eq!(content.as_deref(), Some("x"));
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn init_flags() {
        let cli =
            Cli::try_parse_from(["gitscribe", "-vv", "init", "--reuse-head", "--subject", "s"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Init { reuse_head: true, subject: Some(ref s), prompt: None } if s == "s"
        ));
    }

    #[test]
    fn rm_requires_description() {
        assert!(Cli::try_parse_from(["gitscribe", "rm", "/r/a.txt"]).is_err());
    }
}
