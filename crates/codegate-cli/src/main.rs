//! codegate CLI — review practice submissions and track progress.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "codegate", version, about = "LLM-backed code review gate for practice challenges")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output format for commands that print results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a submission against a challenge and record the outcome
    Review {
        /// Challenge catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Challenge ID
        #[arg(long)]
        task: String,

        /// File containing the submitted code
        #[arg(long)]
        file: PathBuf,

        /// Provider name from the config (defaults to `default_provider`)
        #[arg(long)]
        provider: Option<String>,

        /// Model to use (defaults to `default_model`)
        #[arg(long)]
        model: Option<String>,

        /// Data directory for progress and history
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show progress statistics
    Stats {
        /// Limit to one challenge
        #[arg(long)]
        task: Option<String>,

        /// Data directory for progress and history
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Clear all recorded history and progress
    Reset {
        /// Data directory for progress and history
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate challenge catalog TOML files
    Validate {
        /// Catalog file or directory
        #[arg(long)]
        catalog: PathBuf,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codegate=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Review {
            catalog,
            task,
            file,
            provider,
            model,
            data_dir,
            format,
            config,
        } => {
            commands::review::execute(commands::review::ReviewArgs {
                catalog,
                task,
                file,
                provider,
                model,
                data_dir,
                format,
                config,
            })
            .await
        }
        Commands::Stats {
            task,
            data_dir,
            format,
            config,
        } => commands::stats::execute(task, data_dir, format, config),
        Commands::Reset { data_dir, config } => commands::reset::execute(data_dir, config),
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
