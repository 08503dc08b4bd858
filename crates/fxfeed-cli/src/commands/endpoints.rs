use fxfeed_core::{Endpoint, PriceFeed};
use serde::Serialize;

use crate::error::CliError;

use super::Printer;

#[derive(Debug, Serialize)]
struct EndpointsResponseData {
    current: Endpoint,
    endpoints: Vec<Endpoint>,
}

pub fn run(feed: &PriceFeed, printer: Printer) -> Result<(), CliError> {
    let current = feed.current_endpoint();
    let endpoints = feed.endpoints();

    let text = endpoints
        .iter()
        .map(|endpoint| {
            let marker = if *endpoint == current { "*" } else { " " };
            format!("{marker} {endpoint}")
        })
        .collect::<Vec<_>>();

    printer.print(&EndpointsResponseData { current, endpoints }, &text)
}
