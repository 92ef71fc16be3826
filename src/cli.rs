//! Command-line argument parsing for ahti-connect.

use crate::config::{ConnectionConfig, ConnectionMode};
use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Connection tester for libSQL databases managed by the Ahti operator.
#[derive(Parser, Debug)]
#[command(name = "ahti-connect")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Use named connection from config
    #[arg(short = 'c', long = "connection", value_name = "NAME", global = true)]
    pub connection_name: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Never prompt; fail if the URL is missing
    #[arg(long, global = true)]
    pub no_prompt: bool,

    /// Write logs to a file (`--log-file=PATH`, default location when PATH is omitted)
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        require_equals = true,
        global = true
    )]
    pub log_file: Option<Option<PathBuf>>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: rows, table, or json
    #[arg(long, value_name = "FORMAT", default_value = "rows", global = true)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub probe: ProbeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Connection overrides shared by every subcommand that opens a database.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Sync URL of the database server (e.g., http://localhost:8082)
    #[arg(short = 'u', long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Auth token
    #[arg(short = 't', long, value_name = "TOKEN", global = true)]
    pub token: Option<String>,

    /// Local replica or database file
    #[arg(short = 'l', long, value_name = "PATH", global = true)]
    pub local_path: Option<PathBuf>,

    /// Connection mode: replica, remote, or local
    #[arg(long, value_name = "MODE", global = true)]
    pub mode: Option<ConnectionMode>,

    /// Mint a session token from this Ed25519 private key instead of --token
    #[arg(
        long,
        value_name = "KEY",
        env = "AHTI_PRIVATE_KEY",
        hide_env_values = true,
        global = true
    )]
    pub private_key: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a table, insert and commit a row, then read the table back (default)
    Probe,

    /// Run one SQL statement and print its result
    Query {
        /// SQL to run
        #[arg(value_name = "SQL")]
        sql: String,
    },

    /// Generate an Ed25519 key pair for token signing
    Keygen,

    /// Mint an auth token from a private key
    Token {
        /// Lifetime in seconds (no expiry when omitted)
        #[arg(long, value_name = "SECS")]
        expires_in: Option<i64>,

        /// Grant read-only access
        #[arg(long)]
        read_only: bool,
    },
}

/// Probe settings, accepted with or without the `probe` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Table to create and query (default: users)
    #[arg(long, value_name = "NAME", global = true)]
    pub table: Option<String>,

    /// Value to insert (default: 1)
    #[arg(long, value_name = "N", allow_negative_numbers = true, global = true)]
    pub value: Option<i64>,

    /// Skip replica syncs
    #[arg(long, global = true)]
    pub no_sync: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the subcommand, defaulting to `probe`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Probe)
    }

    /// Converts CLI arguments to a ConnectionConfig.
    ///
    /// This creates a config from CLI args only, without merging with file config.
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            mode: self.connection.mode,
            sync_url: self.connection.url.clone(),
            auth_token: self.connection.token.clone(),
            local_path: self.connection.local_path.clone(),
            ..Default::default()
        }
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    /// Returns the log file path, if file logging was requested.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(crate::logging::default_log_path))
    }
}
