mod endpoints;
mod history;
mod listen;
mod price;
mod round;
mod watch;

use std::sync::Arc;

use fxfeed_core::{FeedConfig, PriceFeed, ScriptedProvider};
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, Command, OutputFormat};
use crate::error::CliError;
use crate::output;

const MOCK_RPC_URLS: [&str; 2] = ["https://mock-rpc-a.invalid", "https://mock-rpc-b.invalid"];
const MOCK_FEED_ADDRESS: &str = "0x5e2b26b0a3ef2b2b4f3e6d2b8f3c1f0b9a8d7c6e";

/// Output settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
    pretty: bool,
}

impl Printer {
    pub fn print<T: Serialize>(&self, value: &T, text: &[String]) -> Result<(), CliError> {
        output::render(value, text, self.format, self.pretty)
    }
}

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let feed = build_feed(cli.mock)?;
    let printer = Printer {
        format: cli.format,
        pretty: cli.pretty,
    };

    match &cli.command {
        Command::Price => price::run(&feed, printer).await,
        Command::Round => round::run(&feed, printer).await,
        Command::History(args) => history::run(args, &feed, printer).await,
        Command::Watch(args) => watch::run(args, &feed, printer).await,
        Command::Listen => listen::run(&feed, printer).await,
        Command::Endpoints => endpoints::run(&feed, printer),
    }
}

fn build_feed(mock: bool) -> Result<PriceFeed, CliError> {
    if !mock {
        let config = FeedConfig::from_env()?;
        return Ok(PriceFeed::connect(config)?);
    }

    info!("using scripted provider");
    let config = FeedConfig::builder()
        .with_rpc_urls(MOCK_RPC_URLS)
        .with_feed_address(MOCK_FEED_ADDRESS)
        .build()?;
    let provider = ScriptedProvider::sample();

    Ok(PriceFeed::builder(config)
        .with_factory(Arc::new(provider.factory()))
        .build()?)
}

/// Blocks until Ctrl-C, then stops the monitor and its subscriptions.
async fn wait_for_interrupt(feed: &PriceFeed) -> Result<(), CliError> {
    let outcome = tokio::signal::ctrl_c().await;
    feed.stop_monitoring().await;
    outcome.map_err(CliError::from)
}
