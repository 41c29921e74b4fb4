//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// safelink - URL shortener with continuous safety classification
#[derive(Parser)]
#[command(name = "safelink")]
#[command(version)]
#[command(about = "URL shortener with continuous safety classification", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Restore the store and run the watchdog until Ctrl+C (default)
    Serve,

    /// Shorten an address and print its code
    #[cfg(feature = "cli")]
    Shorten {
        /// Target URL (http/https)
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a short code
    #[cfg(feature = "cli")]
    Resolve {
        /// Short code or request path (e.g. /AAAAAA)
        code: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    #[cfg(feature = "cli")]
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

impl Commands {
    /// Whether the command runs the long-lived serve mode
    pub fn is_serve(&self) -> bool {
        matches!(self, Commands::Serve)
    }
}

/// Configuration management commands
#[cfg(feature = "cli")]
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
