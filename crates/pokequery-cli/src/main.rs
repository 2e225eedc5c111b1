//! pokequery CLI - main entry point

use clap::Parser;
use tracing::{error, info};

use pokequery_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration before logging so the configured level applies
    let config = load_configuration(&cli);
    let level = match &config {
        Ok(config) if !cli.verbose => config.log_level().unwrap_or(tracing::Level::INFO),
        _ if cli.verbose => tracing::Level::DEBUG,
        _ => tracing::Level::INFO,
    };
    setup_logging(level);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("pokequery exited successfully");
    Ok(())
}

/// Setup logging at the given level
fn setup_logging(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(config_path) => AppConfig::load_from_file(config_path),
        None => Ok(AppConfig::default()),
    }
}
