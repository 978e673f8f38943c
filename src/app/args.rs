//! Command-line arguments
//!
//! Every option is optional so that values from the configuration file apply
//! unless overridden on the command line.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatsFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "outflow")]
#[command(about = "Deliver newline-delimited records from stdin to an HTTP endpoint")]
#[command(version, long_version = crate::core::version::long_version())]
pub struct Args {
    /// Delivery endpoint (http:// or https://)
    #[arg(short = 'e', long = "endpoint", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Bearer token sent with every delivery
    #[arg(short = 't', long = "token", value_name = "TOKEN")]
    pub bearer_token: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Maximum number of records waiting for delivery
    #[arg(long = "capacity", value_name = "COUNT")]
    pub capacity: Option<usize>,

    /// Post records in batches as JSON arrays
    #[arg(short = 'b', long = "batch")]
    pub batch: bool,

    /// Records per batch
    #[arg(long = "batch-size", value_name = "COUNT")]
    pub batch_size: Option<usize>,

    /// Number of delivery workers
    #[arg(short = 'w', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Delivery retries before a record is dead-lettered
    #[arg(long = "max-retries", value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Seconds to wait for the queue to drain after input ends
    #[arg(long = "drain-timeout", value_name = "SECONDS")]
    pub drain_timeout: Option<u64>,

    /// Seconds between statistics log lines (0 disables)
    #[arg(long = "stats-interval", value_name = "SECONDS")]
    pub stats_interval: Option<u64>,

    /// Final statistics output format
    #[arg(long = "stats-format", value_enum, value_name = "FORMAT")]
    pub stats_format: Option<StatsFormat>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Force colored log output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Args {
    /// `Some(true)` / `Some(false)` when forced, `None` for automatic
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_everything_unset() {
        let args = Args::try_parse_from(["outflow"]).unwrap();
        assert!(args.endpoint.is_none());
        assert!(args.capacity.is_none());
        assert!(!args.batch);
        assert_eq!(args.color_override(), None);
    }

    #[test]
    fn test_parses_delivery_options() {
        let args = Args::try_parse_from([
            "outflow",
            "-e",
            "https://collector.example/ingest",
            "--batch",
            "--batch-size",
            "25",
            "-w",
            "4",
            "--stats-format",
            "json",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(
            args.endpoint.as_deref(),
            Some("https://collector.example/ingest")
        );
        assert!(args.batch);
        assert_eq!(args.batch_size, Some(25));
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.stats_format, Some(StatsFormat::Json));
        assert_eq!(args.color_override(), Some(false));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        assert!(Args::try_parse_from(["outflow", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_color_flags_conflict() {
        assert!(Args::try_parse_from(["outflow", "--color", "--no-color"]).is_err());
    }
}
