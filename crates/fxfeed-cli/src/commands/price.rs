use fxfeed_core::PriceFeed;

use crate::error::CliError;

use super::Printer;

pub async fn run(feed: &PriceFeed, printer: Printer) -> Result<(), CliError> {
    let price = feed.get_current_price().await?;
    let text = vec![
        price.direct_display.clone(),
        price.inverse_display.clone(),
        format!("feed: {} ({} decimals)", price.description, price.decimals),
    ];
    printer.print(&price, &text)
}
