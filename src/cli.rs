//! CLI arguments and subcommands for herakles-proc-cpu-exporter.
//!
//! This module defines the command-line interface structure using the clap
//! library, including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-proc-cpu-exporter",
    about = "Prometheus exporter for per-thread CPU time and utilization of the running process",
    long_about = "Prometheus exporter for per-thread CPU time and utilization of the running process.\n\n\
                  Samples the threads of its own process through the kernel's accounting \
                  interfaces on every scrape and exposes cumulative CPU time and instantaneous \
                  utilization. The collector is also embeddable as a library into any \
                  application's own Prometheus registry.",
    author = "Michael Moll <proc-cpu@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/herakles-io/herakles-proc-cpu-exporter — More info: https://www.herakles.io — Support: proc-cpu@herakles.io"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

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

    /// Disable /health endpoint + health statistics
    #[arg(long)]
    pub disable_health: bool,

    /// Disable /doc endpoint
    #[arg(long)]
    pub disable_doc: bool,

    /// Disable internal exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// TLS certificate file (PEM); requires --tls-key-file
    #[arg(long)]
    pub tls_cert_file: Option<PathBuf>,

    /// TLS private key file (PEM); requires --tls-cert-file
    #[arg(long)]
    pub tls_key_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check thread enumeration and per-thread stat reads
        #[arg(long)]
        threads: bool,

        /// Check instrument registration and one collection cycle
        #[arg(long)]
        instruments: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Test CPU sampling
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Show detailed per-thread information
        #[arg(long)]
        verbose: bool,
    },
}
