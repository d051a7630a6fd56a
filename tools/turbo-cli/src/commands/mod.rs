//! CLI command implementations.

pub mod config;
pub mod request;
pub mod session;

use clap::{Args, Subcommand};

/// Arguments for the request command.
#[derive(Args)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    pub method: String,

    /// Path relative to the configured base URL, e.g. /api/cart-items.
    pub path: String,

    /// JSON request body.
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header as `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Query parameter as `key=value`. Repeatable.
    #[arg(short, long)]
    pub query: Vec<String>,
}

/// Arguments for the session command.
#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Show the stored session.
    Show,
    /// Store a session obtained from a login flow.
    Set {
        /// Access token.
        #[arg(long)]
        access_token: String,
        /// Refresh token.
        #[arg(long)]
        refresh_token: String,
    },
    /// Sign out and delete the stored session.
    Clear {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// API base URL.
        #[arg(long)]
        base_url: Option<String>,
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}
