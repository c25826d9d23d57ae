//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Record Sink - route JSON records to queue, console and file outputs
#[derive(Parser, Debug)]
#[command(
    name = "record-sink",
    author,
    version,
    about = "Route JSON records to queue, console and file sinks",
    long_about = "Loads sink definitions from configuration, reads newline-delimited JSON \n\
                  records and delivers each one to every configured sink whose daily \n\
                  time window admits the record's timestamp."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RECORD_SINK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RECORD_SINK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver newline-delimited JSON records to the configured sinks
    ///
    /// Queue sinks publish to Kafka and are only available when the binary
    /// is built with `--features kafka`.
    Send(SendArgs),

    /// Validate configuration file without sending anything
    Validate(ValidateArgs),

    /// Display configured sinks
    Info(InfoArgs),
}

/// Arguments for the `send` command
#[derive(Parser, Debug, Clone)]
pub struct SendArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "sinks.toml", env = "RECORD_SINK_CONFIG")]
    pub config: PathBuf,

    /// Input file with one JSON object per line ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Record field holding the record timestamp
    #[arg(long, default_value = "ts", env = "RECORD_SINK_TIMESTAMP_FIELD")]
    pub timestamp_field: String,

    /// Channel buffer size between reader and dispatcher
    #[arg(long, default_value = "100", env = "RECORD_SINK_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Stop on the first malformed input line instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RECORD_SINK_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print final per-sink metrics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "sinks.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "sinks.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show type-specific params of every sink
    #[arg(long)]
    pub params: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
