//! CLI argument parsing for sessionstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Inspect the durable botsync key-value store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store file (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print values for one or more keys
    Get {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set a key to a JSON value
    Set {
        #[arg(required = true)]
        key: String,

        /// JSON text (bare words are stored as strings)
        #[arg(required = true)]
        value: String,
    },

    /// Remove a key
    Remove {
        #[arg(required = true)]
        key: String,
    },

    /// List all keys
    List,
}
