//! Block-window planning for historical log queries.

use serde::Serialize;

use crate::error::ValidationError;

/// Default number of blocks queried per provider call.
pub const DEFAULT_BATCH_SIZE: u64 = 50;

/// Inclusive range of blocks covered by one log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockWindow {
    pub const fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
        }
    }

    pub const fn block_count(self) -> u64 {
        self.to_block - self.from_block + 1
    }
}

/// Splits `[head - block_range, head]` into consecutive inclusive windows.
///
/// A range that fits in one batch becomes a single window. Otherwise every
/// window spans `batch_size` blocks and the last one is truncated at `head`.
pub fn plan_windows(
    head: u64,
    block_range: u64,
    batch_size: u64,
) -> Result<Vec<BlockWindow>, ValidationError> {
    if batch_size == 0 {
        return Err(ValidationError::ZeroValue {
            field: "batch_size",
        });
    }

    let from = head.saturating_sub(block_range);
    if block_range <= batch_size {
        return Ok(vec![BlockWindow::new(from, head)]);
    }

    let mut windows = Vec::new();
    let mut start = from;
    loop {
        let end = start.saturating_add(batch_size - 1).min(head);
        windows.push(BlockWindow::new(start, end));
        if end >= head {
            break;
        }
        start = end + 1;
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_of_120_with_batch_50_yields_three_windows() {
        let windows = plan_windows(1_000, 120, 50).expect("valid plan");

        assert_eq!(
            windows,
            vec![
                BlockWindow::new(880, 929),
                BlockWindow::new(930, 979),
                BlockWindow::new(980, 1_000),
            ]
        );
    }

    #[test]
    fn small_range_is_a_single_window() {
        let windows = plan_windows(500, 20, 50).expect("valid plan");
        assert_eq!(windows, vec![BlockWindow::new(480, 500)]);

        let exact = plan_windows(500, 50, 50).expect("valid plan");
        assert_eq!(exact, vec![BlockWindow::new(450, 500)]);
    }

    #[test]
    fn range_beyond_genesis_starts_at_zero() {
        let windows = plan_windows(30, 100, 50).expect("valid plan");
        assert_eq!(windows, vec![BlockWindow::new(0, 30)]);
    }

    #[test]
    fn windows_are_contiguous_and_cover_the_range() {
        let windows = plan_windows(10_000, 777, 64).expect("valid plan");

        assert_eq!(windows.first().map(|w| w.from_block), Some(10_000 - 777));
        assert_eq!(windows.last().map(|w| w.to_block), Some(10_000));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].to_block + 1, pair[1].from_block);
            assert_eq!(pair[0].block_count(), 64);
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert_eq!(
            plan_windows(100, 10, 0),
            Err(ValidationError::ZeroValue {
                field: "batch_size"
            })
        );
    }
}
