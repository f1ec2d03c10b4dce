use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "maildesk-cli", about = "Local mail desk: receive, validate, send.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an address, a comma-separated list, or a port string
    Validate {
        /// single address to check
        address: Option<String>,
        /// comma-separated address list
        #[arg(long)]
        list: Option<String>,
        /// port string
        #[arg(long)]
        port: Option<String>,
    },
    /// Build a message and send it via the chosen strategy
    Send(SendArgs),
    /// Run the local SMTP receiving endpoint and print incoming mail
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 2525)]
        port: u16,
    },
}

#[derive(Args)]
pub struct SendArgs {
    /// sender address
    #[arg(long)]
    pub from: String,

    /// comma-separated recipient list
    #[arg(long)]
    pub to: String,

    /// comma-separated Cc list (optional)
    #[arg(long, default_value = "")]
    pub cc: String,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub body: String,

    /// attachment file, repeatable
    #[arg(long)]
    pub attach: Vec<PathBuf>,

    #[arg(long, value_enum, default_value = "local")]
    pub mode: Mode,

    /// relay host (local and auth modes)
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// relay port; defaults to 2525 for local, 587 for auth
    #[arg(long)]
    pub port: Option<u16>,

    /// account for the authenticated relay
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// EHLO identity for the direct path
    #[arg(long)]
    pub helo: Option<String>,

    /// per-connection timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,

    /// print the SMTP transcript of direct sessions
    #[arg(long)]
    pub trace: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// unauthenticated relay, e.g. a local test server
    Local,
    /// direct delivery to each recipient's MX host
    Direct,
    /// authenticated relay (STARTTLS + AUTH PLAIN)
    Auth,
}
