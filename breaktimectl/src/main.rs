use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{audit::AuditArgs, run::RunArgs};

#[derive(Parser)]
#[command(
    name = "breaktimectl",
    version,
    about = "Apply control-plane commands to pipeline jobs in credential-checked batches"
)]
struct Cli {
    /// Env file loaded before reading the environment (missing is fine)
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
    /// TOML file with request payloads and the cron table
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply one command to every job in the list
    Run(RunArgs),
    /// List stale storage directories for every job
    Audit(AuditArgs),
    /// Show the available job commands
    Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries reports.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let files = cli::ConfigFiles {
        env_file: cli.env_file,
        config: cli.config,
    };

    match cli.command {
        Command::Run(args) => cli::run::execute(&files, args).await,
        Command::Audit(args) => cli::audit::execute(&files, args).await,
        Command::Commands => {
            cli::print_commands();
            Ok(ExitCode::SUCCESS)
        }
    }
}
