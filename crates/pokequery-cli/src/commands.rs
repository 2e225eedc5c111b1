//! Command handlers for the pokequery CLI

use std::path::PathBuf;

use pokequery_core::ResourceError;
use pokequery_runtime::{PokequeryError, QueryClient, QueryServer, SessionStats, ShutdownMode};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::Result;
use crate::terminal::{spawn_event_printer, MenuChoice, Terminal};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Serve { dataset, listen } => {
                Self::handle_serve_command(config.with_serve_overrides(dataset, listen)).await
            }
            Commands::Client { server } => {
                Self::handle_client_command(config.with_client_overrides(server)).await
            }
            Commands::ConfigExample => Self::handle_config_example_command(),
        }
    }

    /// Serve a single client, prompting for the dataset when none is configured
    async fn handle_serve_command(config: AppConfig) -> Result<()> {
        let mut terminal = Terminal::new();
        let dataset = match Self::configured_dataset(&config) {
            Some(path) => path,
            None => match terminal.prompt_dataset().await? {
                Some(path) => path,
                None => {
                    info!("No dataset chosen, exiting");
                    return Ok(());
                }
            },
        };

        let server = QueryServer::bind(config.server).await?;
        println!("Waiting for a client on {}", server.local_addr()?);
        let summary = server.serve_one(dataset).await?;

        println!(
            "Served {} request(s); {} scan(s) completed, {} failed.",
            summary.requests_received, summary.scans_completed, summary.scans_failed
        );
        println!("Shutting down");
        Ok(())
    }

    /// A configured dataset is used only if it exists; otherwise prompt
    fn configured_dataset(config: &AppConfig) -> Option<PathBuf> {
        let path = config.server.dataset_path.clone()?;
        if path.is_file() {
            Some(path)
        } else {
            warn!("Dataset {} not found", path.display());
            println!("Pokemon file is not found.");
            None
        }
    }

    /// Run the interactive client menu until exit
    async fn handle_client_command(config: AppConfig) -> Result<()> {
        let (mut client, events) = QueryClient::connect(&config.client).await?;
        let printer = spawn_event_printer(events);
        let mut terminal = Terminal::new();

        loop {
            match terminal.prompt_menu().await? {
                Some(MenuChoice::Search) => Self::search(&mut client, &mut terminal).await?,
                Some(MenuChoice::Save) => Self::save(&mut client, &mut terminal).await?,
                Some(MenuChoice::Exit) | None => break,
            }
        }

        let report = client.shutdown(ShutdownMode::Cancel).await?;
        if let Err(e) = printer.await {
            warn!("Event printer ended abnormally: {}", e);
        }
        println!();
        println!("{report}");
        Ok(())
    }

    /// Ask for a category until a valid one is given
    async fn search(
        client: &mut QueryClient<tokio::net::TcpStream>,
        terminal: &mut Terminal,
    ) -> Result<()> {
        while let Some(answer) = terminal.prompt("Enter Type (e.g. Fire): ").await? {
            match client.submit_category(answer.trim()).await {
                Ok(category) => {
                    println!("Searching for {category} in the background.");
                    break;
                }
                Err(PokequeryError::InvalidCategory { name }) => {
                    println!("{name:?} is not a recognized type, please try again.");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Ask for a destination until a usable one is given
    async fn save(
        client: &mut QueryClient<tokio::net::TcpStream>,
        terminal: &mut Terminal,
    ) -> Result<()> {
        if nothing_to_save(&client.stats()) {
            println!("No queries have completed yet, nothing to save.");
            return Ok(());
        }
        while let Some(answer) = terminal
            .prompt("Enter the name of the file to save the results to: ")
            .await?
        {
            match client.persist_to(&answer).await {
                Ok(()) => {
                    println!("Saving to {answer} in the background.");
                    break;
                }
                Err(PokequeryError::NoData) => {
                    println!("No queries have completed yet, nothing to save.");
                    break;
                }
                Err(PokequeryError::Resource(ResourceError::InvalidDestination {
                    reason, ..
                })) => {
                    println!("Invalid file name ({reason}), please try again.");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Print an example configuration file
    fn handle_config_example_command() -> Result<()> {
        print!("{}", AppConfig::example_config()?);
        Ok(())
    }
}

/// Saving is refused until some query has captured records
fn nothing_to_save(stats: &SessionStats) -> bool {
    stats.records_captured == 0
}
