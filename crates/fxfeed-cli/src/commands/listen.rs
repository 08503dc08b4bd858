use std::sync::Arc;

use fxfeed_core::{AnswerUpdatedLog, EventHandler, PriceFeed};
use tracing::{info, warn};

use crate::error::CliError;

use super::{wait_for_interrupt, Printer};

pub async fn run(feed: &PriceFeed, printer: Printer) -> Result<(), CliError> {
    let handler: EventHandler = Arc::new(move |log: AnswerUpdatedLog| {
        let text = [format!(
            "block {} round {} answer {}",
            log.block_number, log.round_id, log.answer
        )];
        if let Err(error) = printer.print(&log, &text) {
            warn!(error = %error, "failed to write event");
        }
    });

    feed.setup_event_listeners(handler).await?;
    info!(endpoint = %feed.current_endpoint(), "listening for AnswerUpdated");
    wait_for_interrupt(feed).await
}
