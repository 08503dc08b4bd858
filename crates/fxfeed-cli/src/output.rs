use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes one result to stdout.
///
/// JSON mode emits the serialized document; text mode emits the
/// pre-rendered summary lines.
pub fn render<T: Serialize>(
    value: &T,
    text: &[String],
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Json => {
            let encoded = if pretty {
                serde_json::to_string_pretty(value)?
            } else {
                serde_json::to_string(value)?
            };
            writeln!(handle, "{encoded}")?;
        }
        OutputFormat::Text => {
            for line in text {
                writeln!(handle, "{line}")?;
            }
        }
    }

    handle.flush()?;
    Ok(())
}
