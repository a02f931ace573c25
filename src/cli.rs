use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Summary line and errors only
    Quiet,
    /// Summary and non-passing checks
    #[default]
    Normal,
    /// Every check
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Coloured summary for terminals
    #[default]
    Human,
    /// The full report as pretty-printed JSON
    Json,
}

/// Validate a point-cloud file against the COPC specification
#[derive(Parser, Debug, Clone)]
#[command(name = "copc-validator")]
#[command(about = "Validate point-cloud files against the Cloud-Optimized Point Cloud specification")]
#[command(version)]
pub struct Cli {
    /// Local path or http(s) URL of the file to validate
    #[arg(help = "File path or URL to validate")]
    pub source: String,

    /// Read every point of every node instead of the first
    #[arg(short = 'd', long = "deep")]
    pub deep: bool,

    /// Number of concurrent node scans
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<usize>,

    /// Node scans allowed in flight at once
    #[arg(long = "queue-limit")]
    pub queue_limit: Option<usize>,

    /// In deep mode, read at most this many points per node
    #[arg(long = "sample-size")]
    pub sample_size: Option<u64>,

    /// Show scan progress on stderr
    #[arg(long = "progress")]
    pub progress: bool,

    /// Omit decoded metadata from the report
    #[arg(long = "mini")]
    pub mini: bool,

    /// Name recorded in the report, defaults to the source
    #[arg(long = "name")]
    pub name: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "List every check")]
    pub verbose: bool,

    /// Enable quiet mode
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Number of retry attempts for failed range requests
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn report_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.source.clone())
    }
}
