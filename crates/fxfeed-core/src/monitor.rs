//! Repeating price poll.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{FeedError, ValidationError};
use crate::Price;

/// Receives every successfully polled price.
pub type PriceReporter = Arc<dyn Fn(&Price) + Send + Sync>;

/// Reporter that logs each price at `info`.
pub fn log_reporter() -> PriceReporter {
    Arc::new(|price: &Price| {
        info!(
            pair = %price.pair,
            direct = %price.direct_display,
            inverse = %price.inverse_display,
            "price update"
        );
    })
}

/// Running monitor task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Polls once immediately, then every `interval` until stopped.
    ///
    /// `poll` returns `None` once its source is gone, which ends the task.
    /// A failed tick is logged and the schedule continues.
    pub fn spawn<P, Fut>(
        interval: Duration,
        mut poll: P,
        reporter: PriceReporter,
    ) -> Result<Self, ValidationError>
    where
        P: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = Result<Price, FeedError>> + Send,
    {
        if interval.is_zero() {
            return Err(ValidationError::ZeroValue { field: "interval" });
        }

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(tick) = poll() else {
                    debug!("price source dropped; monitor exiting");
                    return;
                };
                match tick.await {
                    Ok(price) => reporter(&price),
                    Err(error) => warn!(error = %error, "price poll failed; monitor continues"),
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "price monitor started");
        Ok(Self { task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancels future ticks. Safe to call more than once.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::quote::RateQuote;
    use crate::{CurrencyPair, TransportError};

    fn price() -> Price {
        let pair = CurrencyPair::default();
        let quote = RateQuote::from_answer(689, 6, &pair).expect("valid answer");
        Price::new(pair, quote, "NGN / USD")
    }

    fn counting_reporter() -> (PriceReporter, Arc<AtomicU32>) {
        let reports = Arc::new(AtomicU32::new(0));
        let sink = Arc::clone(&reports);
        let reporter: PriceReporter = Arc::new(move |_price: &Price| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        (reporter, reports)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_every_interval() {
        let (reporter, reports) = counting_reporter();
        let monitor = MonitorHandle::spawn(
            Duration::from_secs(60),
            || Some(async { Ok(price()) }),
            reporter,
        )
        .expect("valid interval");

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(reports.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(reports.load(Ordering::SeqCst), 3);
        assert!(monitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_does_not_stop_the_schedule() {
        let (reporter, reports) = counting_reporter();
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let _monitor = MonitorHandle::spawn(
            Duration::from_secs(1),
            move || {
                let tick = counter.fetch_add(1, Ordering::SeqCst);
                Some(async move {
                    if tick == 0 {
                        Err(TransportError::connection("reset").into())
                    } else {
                        Ok(price())
                    }
                })
            },
            reporter,
        )
        .expect("valid interval");

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(reports.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks_and_is_idempotent() {
        let (reporter, reports) = counting_reporter();
        let monitor = MonitorHandle::spawn(
            Duration::from_secs(1),
            || Some(async { Ok(price()) }),
            reporter,
        )
        .expect("valid interval");
        tokio::time::sleep(Duration::from_millis(10)).await;

        monitor.stop();
        monitor.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(reports.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_source_is_gone() {
        let (reporter, _) = counting_reporter();
        let source = Arc::new(Mutex::new(Some(())));
        let watched = Arc::clone(&source);
        let monitor = MonitorHandle::spawn(
            Duration::from_secs(1),
            move || {
                let alive = watched.lock().expect("source lock").is_some();
                alive.then(|| async { Ok(price()) })
            },
            reporter,
        )
        .expect("valid interval");

        source.lock().expect("source lock").take();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let (reporter, _) = counting_reporter();
        let result = MonitorHandle::spawn(
            Duration::ZERO,
            || Some(async { Ok(price()) }),
            reporter,
        );

        assert_eq!(
            result.err().map(|e| e.to_string()),
            Some(String::from("field 'interval' must be greater than zero"))
        );
    }
}
