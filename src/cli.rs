//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, init), and their associated argument
//! structs. Every `run` flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use http::HeaderName;

#[derive(Parser)]
#[command(
    name = "broadcaster",
    version,
    about = "HTTP request broadcaster for cache clusters",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        broadcaster init                     Create a starter config\n  \
        broadcaster run                      Start with ./broadcaster.yaml\n  \
        broadcaster run -c caches.yaml       Start with a specific config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the broadcaster
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        broadcaster run                                       Auto-detect config\n  \
        broadcaster run -c caches.yaml --enforce              Reply with first non-200\n  \
        broadcaster run -c caches.yaml --crt s.crt --key s.key  Serve HTTPS\n\n  \
        Reload the cache list with SIGHUP.")]
pub struct RunArgs {
    /// Cache config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Plaintext listen port
    #[arg(short, long, env = "PORT", default_value_t = 8088)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- TLS --
    /// HTTPS listen port, used when both --crt and --key are given
    #[arg(long, env = "HTTPS_PORT", default_value_t = 8443, help_heading = "TLS")]
    pub https_port: u16,

    /// PEM certificate chain
    #[arg(long, env = "TLS_CRT", requires = "key", help_heading = "TLS")]
    pub crt: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "TLS_KEY", requires = "crt", help_heading = "TLS")]
    pub key: Option<PathBuf>,

    // -- Broadcasting --
    /// Reply with the first non-200 status received from a cache
    #[arg(long, env = "ENFORCE", help_heading = "Broadcasting")]
    pub enforce: bool,

    /// Replay inbound headers to caches
    #[arg(
        long,
        env = "FORWARD_HEADERS",
        default_value_t = true,
        action = clap::ArgAction::Set,
        help_heading = "Broadcasting"
    )]
    pub forward_headers: bool,

    /// Header selecting the cache group (matched case-insensitively)
    #[arg(
        long,
        env = "GROUP_HEADER",
        default_value = "x-group",
        value_parser = parse_header_name,
        help_heading = "Broadcasting"
    )]
    pub group_header: HeaderName,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Dispatch workers. Higher is not implicitly better
    #[arg(
        short,
        long,
        env = "WORKERS",
        default_value_t = 8,
        value_parser = clap::value_parser!(u16).range(1..),
        help_heading = "Tuning"
    )]
    pub workers: u16,

    /// Extra attempts against a cache after a failed request
    #[arg(long, env = "RETRIES", default_value_t = 1, help_heading = "Tuning")]
    pub retries: u32,

    /// Dispatch queue capacity
    #[arg(
        long,
        env = "QUEUE_CAPACITY",
        default_value_t = 8192,
        help_heading = "Tuning"
    )]
    pub queue_capacity: usize,

    /// Per-cache request timeout in milliseconds
    #[arg(
        long,
        env = "REQUEST_TIMEOUT_MS",
        default_value_t = 5000,
        help_heading = "Tuning"
    )]
    pub timeout: u64,

    /// TCP keep-alive and idle connection lifetime in seconds
    #[arg(
        long,
        env = "KEEP_ALIVE_SECS",
        default_value_t = 120,
        help_heading = "Tuning"
    )]
    pub keep_alive: u64,

    /// Idle connections kept per cache
    #[arg(
        long,
        env = "MAX_IDLE_PER_HOST",
        default_value_t = 100,
        help_heading = "Tuning"
    )]
    pub max_idle_per_host: usize,
}

fn parse_header_name(value: &str) -> Result<HeaderName, String> {
    HeaderName::from_bytes(value.trim().as_bytes())
        .map_err(|_| format!("'{value}' is not a valid header name"))
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        broadcaster init                          Quick start config (yaml)\n  \
        broadcaster init -f toml -o caches.toml   TOML format\n  \
        broadcaster init --full                   Documented template")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include documentation as comments (yaml and toml)
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "broadcaster.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
