//! clipflow CLI: the main entry point.
//!
//! Commands:
//! - `run`       Execute a blueprint over clipboard entries
//! - `check`     Validate a blueprint and list its steps
//! - `fmt`       Print a blueprint in canonical form
//! - `classify`  Classify entries or a single piece of text
//! - `predict`   Guess the current workflow from clipboard history
//! - `roles`     List built-in roles
//! - `serve`     Start the HTTP gateway
//! - `config`    Print the default configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clipflow_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipflow",
    about = "clipflow: route clipboard content through declarative blueprints",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.clipflow/config.toml)
    #[arg(long, global = true, env = "CLIPFLOW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a blueprint over clipboard entries
    Run(commands::run::RunArgs),

    /// Validate a blueprint and list its steps
    Check {
        /// Blueprint source file
        blueprint: PathBuf,
    },

    /// Print a blueprint in canonical form
    Fmt {
        /// Blueprint source file
        blueprint: PathBuf,

        /// Rewrite the file in place
        #[arg(short, long)]
        write: bool,
    },

    /// Classify entries from a file, or a single piece of text
    Classify(commands::classify::ClassifyArgs),

    /// Guess the current workflow from clipboard history
    Predict {
        /// JSON file of entries (`-` for stdin)
        #[arg(short, long)]
        entries: PathBuf,
    },

    /// List built-in roles
    Roles,

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Run(args) => return commands::run::run(&config, args).await,
        Commands::Check { blueprint } => return commands::check::run(&blueprint),
        Commands::Fmt { blueprint, write } => commands::fmt::run(&blueprint, write)?,
        Commands::Classify(args) => commands::classify::run(args)?,
        Commands::Predict { entries } => commands::predict::run(&config, &entries)?,
        Commands::Roles => commands::roles::run(),
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Config => commands::config_cmd::run(),
    }

    Ok(ExitCode::SUCCESS)
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level (which
/// `CLIPFLOW_LOG` has already overridden). Logs go to stderr so that
/// `--json` output stays machine-readable.
fn init_tracing(config: &AppConfig, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
