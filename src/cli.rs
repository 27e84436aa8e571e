use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediarelay")]
#[command(author, version, about = "Adaptive media delivery to a messaging session")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the session supervisor
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Deliver a single file and print the outcome
    Deliver {
        /// File to send
        #[arg(required = true)]
        file: PathBuf,

        /// Recipient: chat name, +<number>, or the status label
        #[arg(long)]
        to: String,

        /// Caption to attach
        #[arg(long, default_value = "")]
        caption: String,

        /// Seconds to wait for the session to become ready
        #[arg(long, default_value = "60")]
        wait: u64,
    },

    /// Show format compatibility and size class for a file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
