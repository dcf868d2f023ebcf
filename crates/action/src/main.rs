//! Tasksync binary.
//!
//! Synchronizes GitHub pull-request and issue events with Asana tasks
//! according to a declarative rule file.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tasksync_action::config::ActionConfig;
use tasksync_action::runner;

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(version, about = "Sync GitHub PR and issue events to Asana tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync for the event in the GitHub Actions environment
    Run,

    /// Validate a rule file without running anything
    ///
    /// Examples:
    ///     tasksync validate .github/tasksync.yml
    ///     tasksync validate rules/production.yml
    #[command(verbatim_doc_comment)]
    Validate {
        /// Path to the rule file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tasksync_action=debug,tasksync_rules=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Validate { file }) => runner::validate_file(&file),
        Some(Commands::Run) | None => {
            tracing::info!("Starting tasksync");
            let config = ActionConfig::from_env()?;
            tracing::info!(
                event = %config.event_name,
                repository = %config.repository,
                rules_file = %config.rules_file,
                "Configuration loaded"
            );
            runner::run(&config).await
        }
    }
}
