//! CLI arguments and subcommands for bookmarks-alive-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, environment fallbacks, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "bookmarks-alive-exporter",
    about = "Prometheus exporter reporting the HTTP status of bookmarked URLs",
    long_about = "Prometheus exporter reporting the HTTP status of bookmarked URLs.\n\n\
                  Every scrape of /metrics reads the bookmarks from a SQLite database, \
                  probes each URL with a bounded pool of workers and exposes the latest \
                  status code per URL (0 when no status could be obtained).",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the SQLite bookmarks database (or a sqlite: URL)
    #[arg(long, env = "BOOKMARKS_DB")]
    pub db: Option<String>,

    /// Query returning one URL per row
    #[arg(long)]
    pub query: Option<String>,

    /// HTTP listen port
    #[arg(short = 'p', long, env = "BOOKMARKS_PORT")]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// User-Agent header sent with every probe
    #[arg(long, env = "BOOKMARKS_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Number of concurrent probe workers
    #[arg(long, env = "BOOKMARKS_WORKERS")]
    pub workers: Option<usize>,

    /// Per-probe timeout in seconds
    #[arg(long)]
    pub probe_timeout: Option<u64>,

    /// Deadline of one scrape-triggered collection run in seconds
    #[arg(long)]
    pub scrape_timeout: Option<u64>,

    /// Run at most one collection at a time instead of letting scrapes race
    #[arg(long)]
    pub serialize_scrapes: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal bookmarks_alive_exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the bookmarks database and count readable URLs
    Check {
        /// List every URL that was read
        #[arg(long)]
        verbose: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run collection without the HTTP server and print the exposition
    Test {
        /// Number of collection runs
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print per-run statistics
        #[arg(long)]
        verbose: bool,
    },
}
