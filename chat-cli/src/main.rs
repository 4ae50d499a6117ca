//! # parley
//!
//! CLI tool for driving a Parley messaging session.
//!
//! ## Commands
//!
//! - `register`: Register under a display name
//! - `resume`: Resume the stored session and show the roster
//! - `send`: Send a direct message
//! - `listen`: Stream roster changes until the connection closes
//! - `status`: Show local state
//! - `logout`: Forget the stored session
//!
//! ## Example
//!
//! ```bash
//! # Register once
//! parley register --name alice
//!
//! # Later runs resume silently
//! parley send u2 "hello bob"
//! parley listen
//!
//! # Try everything without a server
//! parley --mock register --name alice
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{listen, logout, register, resume, send, status};

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "parley_chat_cli=info,parley_chat_client=info,parley_chat_core=info";

/// CLI tool for driving a Parley messaging session.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the session token and configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Server address (host:port); defaults to the stored one
    #[arg(long, global = true)]
    server: Option<String>,

    /// Use mock transport instead of a real server (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register under a display name
    Register {
        /// Display name
        #[arg(long, short)]
        name: String,
    },

    /// Resume the stored session and show the roster
    Resume,

    /// Send a direct message
    Send {
        /// Recipient peer id
        peer: String,

        /// Message text
        message: String,
    },

    /// Stream roster changes until the connection closes
    Listen,

    /// Show local state
    Status,

    /// Forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    tracing::debug!(data_dir = %data_dir.display(), mock = cli.mock, "starting");

    let server = cli.server.as_deref();
    match cli.command {
        Commands::Register { name } => {
            register::run(&data_dir, server, &name, cli.mock).await?;
        }
        Commands::Resume => {
            resume::run(&data_dir, server, cli.mock).await?;
        }
        Commands::Send { peer, message } => {
            send::run(&data_dir, server, &peer, &message, cli.mock).await?;
        }
        Commands::Listen => {
            listen::run(&data_dir, server, cli.mock).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::Logout => {
            logout::run(&data_dir).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for parley.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "parley", "parley")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
