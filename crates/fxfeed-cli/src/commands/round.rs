use fxfeed_core::PriceFeed;

use crate::error::CliError;

use super::Printer;

pub async fn run(feed: &PriceFeed, printer: Printer) -> Result<(), CliError> {
    let round = feed.get_latest_round_data().await?;
    let updated = round
        .updated_at_utc()
        .map_or_else(|| round.updated_at.to_string(), |at| at.to_string());
    let text = vec![format!(
        "round {} answer {} updated {}",
        round.round_id, round.answer, updated
    )];
    printer.print(&round, &text)
}
