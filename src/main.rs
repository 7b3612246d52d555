//! # Context Ledger CLI (`ctxl`)
//!
//! ## Usage
//!
//! ```bash
//! ctxl --config ./config/ctxl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxl ingest <PATH>...` | Hash, index and register files on the ledger |
//! | `ctxl ask "<query>" --path <PATH>... [--json] [--progress off\|human\|json]` | Ingest paths and answer a question |
//! | `ctxl ledger show` | Print the persisted chain |
//! | `ctxl ledger verify` | Audit the persisted chain (exit 1 when tampered) |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use context_ledger::progress::ProgressMode;
use context_ledger::{ask, config, ingest, ledger_cmd};

/// Context Ledger CLI — provenance-verified context ingestion and retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "ctxl",
    about = "Context Ledger — provenance-verified context ingestion and retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ctxl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files and directories.
    ///
    /// Directories are walked using `[ingest]` include/exclude globs. Files
    /// are ingested concurrently; each successful file gets a REGISTRATION
    /// block. The ledger is saved to `ledger.path` when configured.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ingest paths, then answer a question from them.
    ///
    /// Stage progress is printed to stderr when it is a TTY. Ctrl-C cancels
    /// the query until synthesis is dispatched.
    Ask {
        /// The question.
        query: String,

        /// Files or directories to answer from.
        #[arg(long = "path", required = true)]
        paths: Vec<PathBuf>,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,

        /// Stage progress on stderr: off, human or json. Defaults to human
        /// on a TTY, off otherwise or with `--json`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Inspect the persisted ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Print every block of the persisted chain.
    Show,
    /// Re-validate every block; exits with status 1 when tampered.
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths } => {
            ingest::run_ingest(&cfg, &paths).await?;
        }
        Commands::Ask {
            query,
            paths,
            json,
            progress,
        } => {
            ask::run_ask(&cfg, &query, &paths, json, progress).await?;
        }
        Commands::Ledger { action } => match action {
            LedgerAction::Show => {
                ledger_cmd::run_ledger_show(&cfg)?;
            }
            LedgerAction::Verify => {
                if !ledger_cmd::run_ledger_verify(&cfg)? {
                    std::process::exit(1);
                }
            }
        },
    }

    Ok(())
}
