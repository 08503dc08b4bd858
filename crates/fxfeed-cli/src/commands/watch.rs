use std::sync::Arc;
use std::time::Duration;

use fxfeed_core::{Price, PriceFeed, PriceReporter};
use tracing::warn;

use crate::cli::WatchArgs;
use crate::error::CliError;

use super::{wait_for_interrupt, Printer};

pub async fn run(args: &WatchArgs, feed: &PriceFeed, printer: Printer) -> Result<(), CliError> {
    let interval = args
        .interval_ms
        .map_or(feed.config().poll_interval, Duration::from_millis);

    let reporter: PriceReporter = Arc::new(move |price: &Price| {
        let text = [format!(
            "{} {} | {}",
            price.captured_at, price.direct_display, price.inverse_display
        )];
        if let Err(error) = printer.print(price, &text) {
            warn!(error = %error, "failed to write price");
        }
    });

    feed.monitor_price_with(interval, reporter)?;
    wait_for_interrupt(feed).await
}
