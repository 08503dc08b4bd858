//! CLI argument definitions for fxfeed.
//!
//! The CLI reads an on-chain exchange-rate aggregator through the resilient
//! access layer in `fxfeed-core`. Connection settings come from the
//! `FXFEED_*` environment variables unless `--mock` is given.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `price` | Read the current price in both directions |
//! | `round` | Read the latest raw round |
//! | `history` | Query recent `AnswerUpdated` events in block windows |
//! | `watch` | Poll the price on an interval until interrupted |
//! | `listen` | Print pushed `AnswerUpdated` events until interrupted |
//! | `endpoints` | Show the configured endpoint pool |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, text) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use the in-process scripted provider |
//! | `--log-level` | `warn` | Log filter when `RUST_LOG` is unset |
//!
//! # Examples
//!
//! ```bash
//! # Current price against the configured endpoints
//! FXFEED_RPC_URLS=https://rpc-a.example,https://rpc-b.example \
//! FXFEED_FEED_ADDRESS=0x5e2b26b0a3ef2b2b4f3e6d2b8f3c1f0b9a8d7c6e \
//!   fxfeed price --format text
//!
//! # Last 500 blocks of history in windows of 100
//! fxfeed history --blocks 500 --batch-size 100 --pretty
//!
//! # Offline walkthrough
//! fxfeed --mock watch --interval-ms 5000
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

/// fxfeed - resilient exchange-rate feed reader
#[derive(Debug, Parser)]
#[command(
    name = "fxfeed",
    author,
    version,
    about = "Resilient exchange-rate feed reader",
    long_about = "fxfeed reads an on-chain exchange-rate aggregator through a pool of \
interchangeable JSON-RPC endpoints. Features include:\n\
\n\
  • Endpoint failover on throttling\n\
  • Exponential backoff between attempts\n\
  • Batched historical event queries\n\
  • Continuous price monitoring\n\
\n\
Use 'fxfeed <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    ///
    /// - json: One JSON document per result (default)
    /// - text: Human-readable lines
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve every call from a deterministic in-process provider.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON documents.
    Json,
    /// Human-readable lines.
    Text,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read the current price.
    ///
    /// Returns the rate in both directions along with the raw answer,
    /// decimals and feed description.
    ///
    /// # Examples
    ///
    ///   fxfeed price
    ///   fxfeed price --format text
    Price,

    /// Read the latest raw round.
    ///
    /// # Examples
    ///
    ///   fxfeed round --pretty
    Round,

    /// Query recent `AnswerUpdated` events.
    ///
    /// The range ends at the current head block and is fetched in
    /// consecutive windows. Windows that keep failing are skipped.
    ///
    /// # Examples
    ///
    ///   fxfeed history
    ///   fxfeed history --blocks 500 --batch-size 100
    History(HistoryArgs),

    /// Poll the price on an interval until Ctrl-C.
    ///
    /// # Examples
    ///
    ///   fxfeed watch
    ///   fxfeed watch --interval-ms 5000 --format text
    Watch(WatchArgs),

    /// Print pushed `AnswerUpdated` events until Ctrl-C.
    Listen,

    /// Show the configured endpoint pool.
    Endpoints,
}

/// Arguments for the `history` command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of blocks back from the head block.
    #[arg(long, default_value_t = 1_000)]
    pub blocks: u64,

    /// Blocks per query window (default: configured batch size).
    #[arg(long)]
    pub batch_size: Option<u64>,
}

/// Arguments for the `watch` command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in milliseconds (default: configured poll interval).
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["fxfeed", "price", "--mock", "--format", "text"])
            .expect("valid arguments");

        assert!(cli.mock);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(matches!(cli.command, Command::Price));
    }

    #[test]
    fn history_defaults_leave_batch_size_to_configuration() {
        let cli = Cli::try_parse_from(["fxfeed", "history"]).expect("valid arguments");

        match cli.command {
            Command::History(args) => {
                assert_eq!(args.blocks, 1_000);
                assert_eq!(args.batch_size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn watch_accepts_an_interval() {
        let cli = Cli::try_parse_from(["fxfeed", "watch", "--interval-ms", "5000"])
            .expect("valid arguments");

        match cli.command {
            Command::Watch(args) => assert_eq!(args.interval_ms, Some(5_000)),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["fxfeed", "price", "--format", "table"]).is_err());
    }
}
