//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve one client from a dataset file
    Serve {
        /// Dataset to scan; prompted for when omitted
        dataset: Option<PathBuf>,
        /// Address to listen on
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Connect to a server and start the interactive menu
    Client {
        /// Server address
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Print an example configuration file
    ConfigExample,
}
