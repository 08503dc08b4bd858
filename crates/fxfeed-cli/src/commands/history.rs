use fxfeed_core::{HistoricalEvent, PriceFeed};
use serde::Serialize;

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::Printer;

#[derive(Debug, Serialize)]
struct HistoryResponseData {
    blocks: u64,
    batch_size: u64,
    events: Vec<HistoricalEvent>,
}

pub async fn run(args: &HistoryArgs, feed: &PriceFeed, printer: Printer) -> Result<(), CliError> {
    let batch_size = args
        .batch_size
        .unwrap_or(feed.config().history_batch_size);
    let events = feed
        .query_historical_events(args.blocks, Some(batch_size))
        .await?;

    let text = events.iter().map(describe).collect::<Vec<_>>();
    let data = HistoryResponseData {
        blocks: args.blocks,
        batch_size,
        events,
    };
    printer.print(&data, &text)
}

fn describe(event: &HistoricalEvent) -> String {
    match &event.quote {
        Some(quote) => format!(
            "block {} round {}: {}",
            event.block_number, event.round_id, quote.direct_display
        ),
        None => format!(
            "block {} round {}: raw answer {}",
            event.block_number, event.round_id, event.answer
        ),
    }
}
