//! provtrace CLI: trace the provenance lineage of ledger assets.
//!
//! Walks back from an asset version through the transactions that produced
//! it, printing one block per producing function.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// provtrace: provenance lineage for ledger assets
#[derive(Parser, Debug)]
#[command(name = "provtrace", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (for `.provtrace/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Walk an asset's lineage back through its producing transactions
    #[command(group(
        clap::ArgGroup::new("policy")
            .required(true)
            .args(["follow", "path", "self_history"])
    ))]
    Trace {
        /// Asset to start from
        asset: String,
        /// Block of the starting version (latest version if omitted)
        #[arg(long, requires = "tx")]
        block: Option<u64>,
        /// Transaction index of the starting version within its block
        #[arg(long, requires = "block")]
        tx: Option<u64>,
        /// Follow this dependency at every hop
        #[arg(long)]
        follow: Option<String>,
        /// Follow these dependencies in order, one per hop (comma-separated)
        #[arg(long, value_delimiter = ',')]
        path: Vec<String>,
        /// Follow the asset's own previous versions
        #[arg(long = "self-history")]
        self_history: bool,
        /// Fail when a `--path` hop has no resolved dependency
        #[arg(long, requires = "path")]
        strict: bool,
        /// Maximum number of steps (overrides `walk.max_depth`)
        #[arg(long)]
        max_depth: Option<usize>,
        /// Ledger snapshot file (overrides `ledger.snapshot`)
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Print the chain as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the dependencies of one asset version
    Inspect {
        asset: String,
        #[arg(long)]
        block: u64,
        #[arg(long)]
        tx: u64,
        #[arg(long)]
        ledger: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print a transaction's read/write sets
    #[command(group(
        clap::ArgGroup::new("lookup")
            .required(true)
            .args(["block", "id"])
    ))]
    Tx {
        #[arg(long, requires = "tx")]
        block: Option<u64>,
        #[arg(long, requires = "block")]
        tx: Option<u64>,
        /// Transaction id instead of a block/tx position
        #[arg(long, conflicts_with_all = ["block", "tx"])]
        id: Option<String>,
        #[arg(long)]
        ledger: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Write the phone assembly sample ledger as a JSON snapshot
    Sample {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the current effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "provtrace", "provtrace")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "provtrace.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
