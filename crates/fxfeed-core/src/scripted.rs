//! Deterministic in-process provider.
//!
//! [`ScriptedProvider`] holds the state a real aggregator would expose and
//! hands out [`ScriptedTransport`] handles through
//! [`ScriptedTransportFactory`]. Failures can be injected per endpoint or
//! per log window, and every call is recorded so tests can assert on
//! ordering, rotation and concurrency. The CLI `--mock` mode runs on it too.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::FeedError;
use crate::history::BlockWindow;
use crate::subscription::FeedEvent;
use crate::transport::{
    FeedTransport, FilterId, TransportError, TransportFactory, TransportFuture,
};
use crate::{AnswerUpdatedLog, RoundData, RoundId};

/// Provider method names recorded in the call log.
pub mod methods {
    pub const DECIMALS: &str = "decimals";
    pub const DESCRIPTION: &str = "description";
    pub const LATEST_ANSWER: &str = "latestAnswer";
    pub const LATEST_ROUND_DATA: &str = "latestRoundData";
    pub const BLOCK_NUMBER: &str = "eth_blockNumber";
    pub const GET_LOGS: &str = "eth_getLogs";
    pub const NEW_FILTER: &str = "eth_newFilter";
    pub const FILTER_CHANGES: &str = "eth_getFilterChanges";
    pub const UNINSTALL_FILTER: &str = "eth_uninstallFilter";
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub endpoint: String,
    pub method: &'static str,
    pub window: Option<BlockWindow>,
}

#[derive(Debug, Clone)]
struct ScriptedFilter {
    endpoint: String,
    pending: Vec<AnswerUpdatedLog>,
}

#[derive(Debug)]
struct ScriptState {
    decimals: u8,
    description: String,
    answer: i128,
    round: RoundData,
    head: u64,
    logs: Vec<AnswerUpdatedLog>,
    queued_failures: HashMap<String, VecDeque<TransportError>>,
    persistent_failures: HashMap<String, TransportError>,
    failing_windows: HashSet<BlockWindow>,
    refused_endpoints: HashSet<String>,
    filters: BTreeMap<String, ScriptedFilter>,
    next_filter: u64,
    calls: Vec<ScriptedCall>,
    connects: Vec<String>,
    latency: Duration,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            decimals: 6,
            description: String::from("NGN / USD"),
            answer: 689,
            round: RoundData {
                round_id: RoundId::new(18_446_744_073_709_551_621),
                answer: 689,
                started_at: 1_700_000_000,
                updated_at: 1_700_000_000,
                answered_in_round: RoundId::new(18_446_744_073_709_551_621),
            },
            head: 1_000,
            logs: Vec::new(),
            queued_failures: HashMap::new(),
            persistent_failures: HashMap::new(),
            failing_windows: HashSet::new(),
            refused_endpoints: HashSet::new(),
            filters: BTreeMap::new(),
            next_filter: 1,
            calls: Vec::new(),
            connects: Vec::new(),
            latency: Duration::ZERO,
        }
    }
}

/// Shared, scriptable aggregator state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider preloaded with a short `AnswerUpdated` history ending at the
    /// head block.
    pub fn sample() -> Self {
        let provider = Self::new();
        let answers = [688_i128, 690, 687, 689];
        for (offset, answer) in answers.iter().enumerate() {
            let step = offset as u64;
            provider.push_log(AnswerUpdatedLog {
                block_number: 940 + step * 20,
                transaction_hash: format!("0x{:064x}", 0xfeed_u64 + step),
                round_id: RoundId::new(18_446_744_073_709_551_618 + u128::from(step)),
                answer: *answer,
                updated_at: 1_700_000_000 - 3_600 * (3 - step),
            });
        }
        provider
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().expect("scripted provider lock is not poisoned")
    }

    pub fn factory(&self) -> ScriptedTransportFactory {
        ScriptedTransportFactory {
            provider: self.clone(),
        }
    }

    pub fn set_decimals(&self, decimals: u8) {
        self.lock().decimals = decimals;
    }

    pub fn set_description(&self, description: impl Into<String>) {
        self.lock().description = description.into();
    }

    pub fn set_answer(&self, answer: i128) {
        let mut state = self.lock();
        state.answer = answer;
        state.round.answer = answer;
    }

    pub fn set_round(&self, round: RoundData) {
        self.lock().round = round;
    }

    pub fn set_head(&self, head: u64) {
        self.lock().head = head;
    }

    /// Delay applied inside every call, used to widen race windows.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Adds a historical log without notifying installed filters.
    pub fn push_log(&self, log: AnswerUpdatedLog) {
        self.lock().logs.push(log);
    }

    /// Records a new log and delivers it to every installed filter.
    pub fn emit(&self, log: AnswerUpdatedLog) {
        let mut state = self.lock();
        for filter in state.filters.values_mut() {
            filter.pending.push(log.clone());
        }
        state.logs.push(log);
    }

    /// The next `times` calls routed to `endpoint` fail with `error`.
    pub fn fail_next(&self, endpoint: &str, error: TransportError, times: usize) {
        let mut state = self.lock();
        let queue = state.queued_failures.entry(endpoint.to_owned()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Every call routed to `endpoint` fails with `error` until cleared.
    pub fn fail_always(&self, endpoint: &str, error: TransportError) {
        self.lock()
            .persistent_failures
            .insert(endpoint.to_owned(), error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.queued_failures.clear();
        state.persistent_failures.clear();
        state.failing_windows.clear();
    }

    /// Log queries for exactly this window fail with a connection error.
    pub fn fail_window(&self, window: BlockWindow) {
        self.lock().failing_windows.insert(window);
    }

    /// Building a transport for `endpoint` fails.
    pub fn refuse_connections(&self, endpoint: &str) {
        self.lock().refused_endpoints.insert(endpoint.to_owned());
    }

    /// Drops every installed filter, as a provider does after a restart.
    pub fn expire_filters(&self) {
        self.lock().filters.clear();
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    pub fn connects(&self) -> Vec<String> {
        self.lock().connects.clone()
    }

    /// Installed filters as `(filter id, endpoint)`.
    pub fn installed_filters(&self) -> Vec<(String, String)> {
        self.lock()
            .filters
            .iter()
            .map(|(id, filter)| (id.clone(), filter.endpoint.clone()))
            .collect()
    }

    /// Largest number of calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(
        &self,
        endpoint: &Endpoint,
        method: &'static str,
        window: Option<BlockWindow>,
    ) -> Result<InFlight, TransportError> {
        let latency = {
            let mut state = self.lock();
            state.calls.push(ScriptedCall {
                endpoint: endpoint.as_str().to_owned(),
                method,
                window,
            });
            state.latency
        };
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight {
            counter: Arc::clone(&self.in_flight),
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        let key = endpoint.as_str();
        if let Some(error) = state
            .queued_failures
            .get_mut(key)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(error) = state.persistent_failures.get(key) {
            return Err(error.clone());
        }
        Ok(guard)
    }
}

// Must not take the state lock: it drops while a state guard can be live.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Transport handle bound to one endpoint of a [`ScriptedProvider`].
pub struct ScriptedTransport {
    provider: ScriptedProvider,
    endpoint: Endpoint,
}

impl ScriptedTransport {
    pub fn new(provider: ScriptedProvider, endpoint: Endpoint) -> Self {
        Self { provider, endpoint }
    }
}

impl FeedTransport for ScriptedTransport {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn decimals(&self) -> TransportFuture<'_, u8> {
        Box::pin(async move {
            let _call = self.provider.enter(&self.endpoint, methods::DECIMALS, None).await?;
            let decimals = self.provider.lock().decimals;
            Ok(decimals)
        })
    }

    fn description(&self) -> TransportFuture<'_, String> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::DESCRIPTION, None)
                .await?;
            let description = self.provider.lock().description.clone();
            Ok(description)
        })
    }

    fn latest_answer(&self) -> TransportFuture<'_, i128> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::LATEST_ANSWER, None)
                .await?;
            let answer = self.provider.lock().answer;
            Ok(answer)
        })
    }

    fn latest_round_data(&self) -> TransportFuture<'_, RoundData> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::LATEST_ROUND_DATA, None)
                .await?;
            let round = self.provider.lock().round.clone();
            Ok(round)
        })
    }

    fn block_number(&self) -> TransportFuture<'_, u64> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::BLOCK_NUMBER, None)
                .await?;
            let head = self.provider.lock().head;
            Ok(head)
        })
    }

    fn answer_updated_logs(
        &self,
        window: BlockWindow,
    ) -> TransportFuture<'_, Vec<AnswerUpdatedLog>> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::GET_LOGS, Some(window))
                .await?;
            let state = self.provider.lock();
            if state.failing_windows.contains(&window) {
                return Err(TransportError::connection(format!(
                    "eth_getLogs timed out for blocks {}..={}",
                    window.from_block, window.to_block
                )));
            }
            let logs = state
                .logs
                .iter()
                .filter(|log| {
                    log.block_number >= window.from_block && log.block_number <= window.to_block
                })
                .cloned()
                .collect();
            Ok(logs)
        })
    }

    fn install_filter(&self, _event: FeedEvent) -> TransportFuture<'_, FilterId> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::NEW_FILTER, None)
                .await?;
            let mut state = self.provider.lock();
            let id = format!("0x{:x}", state.next_filter);
            state.next_filter += 1;
            state.filters.insert(
                id.clone(),
                ScriptedFilter {
                    endpoint: self.endpoint.as_str().to_owned(),
                    pending: Vec::new(),
                },
            );
            Ok(FilterId(id))
        })
    }

    fn filter_changes<'a>(
        &'a self,
        filter: &'a FilterId,
    ) -> TransportFuture<'a, Vec<AnswerUpdatedLog>> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::FILTER_CHANGES, None)
                .await?;
            let mut state = self.provider.lock();
            let changes = match state.filters.get_mut(&filter.0) {
                Some(installed) if installed.endpoint == self.endpoint.as_str() => {
                    Ok(std::mem::take(&mut installed.pending))
                }
                _ => Err(TransportError::filter_expired(format!(
                    "eth_getFilterChanges failed with rpc error -32000: filter not found ({filter})"
                ))),
            };
            changes
        })
    }

    fn uninstall_filter<'a>(&'a self, filter: &'a FilterId) -> TransportFuture<'a, bool> {
        Box::pin(async move {
            let _call = self
                .provider
                .enter(&self.endpoint, methods::UNINSTALL_FILTER, None)
                .await?;
            let removed = self.provider.lock().filters.remove(&filter.0).is_some();
            Ok(removed)
        })
    }
}

/// Factory binding [`ScriptedTransport`] handles to a shared provider.
#[derive(Debug, Clone)]
pub struct ScriptedTransportFactory {
    provider: ScriptedProvider,
}

impl ScriptedTransportFactory {
    pub fn provider(&self) -> &ScriptedProvider {
        &self.provider
    }
}

impl TransportFactory for ScriptedTransportFactory {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn FeedTransport>, FeedError> {
        let refused = {
            let mut state = self.provider.lock();
            state.connects.push(endpoint.as_str().to_owned());
            state.refused_endpoints.contains(endpoint.as_str())
        };
        if refused {
            return Err(FeedError::construction(
                endpoint.to_string(),
                "connection refused by scripted provider",
            ));
        }

        Ok(Arc::new(ScriptedTransport::new(
            self.provider.clone(),
            endpoint.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str) -> Endpoint {
        Endpoint::parse(url).expect("valid endpoint")
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let provider = ScriptedProvider::new();
        provider.fail_next("https://a.example", TransportError::rate_limited("429"), 1);
        let transport = provider
            .factory()
            .connect(&endpoint("https://a.example"))
            .expect("connects");

        let first = transport.latest_answer().await;
        let second = transport.latest_answer().await;

        assert!(first.is_err());
        assert_eq!(second, Ok(689));
        assert_eq!(provider.calls_to(methods::LATEST_ANSWER), 2);
    }

    #[tokio::test]
    async fn filters_deliver_emitted_logs_once() {
        let provider = ScriptedProvider::new();
        let transport = provider
            .factory()
            .connect(&endpoint("https://a.example"))
            .expect("connects");
        let filter = transport
            .install_filter(FeedEvent::AnswerUpdated)
            .await
            .expect("installs");

        provider.emit(AnswerUpdatedLog {
            block_number: 1_001,
            transaction_hash: String::from("0x01"),
            round_id: RoundId::new(9),
            answer: 700,
            updated_at: 1_700_000_100,
        });

        assert_eq!(transport.filter_changes(&filter).await.map(|l| l.len()), Ok(1));
        assert_eq!(transport.filter_changes(&filter).await.map(|l| l.len()), Ok(0));

        provider.expire_filters();
        let expired = transport.filter_changes(&filter).await.expect_err("expired");
        assert!(expired.is_transient());
    }

    #[tokio::test]
    async fn reads_complete_and_release_their_in_flight_slot() {
        let provider = ScriptedProvider::new();
        let transport = provider
            .factory()
            .connect(&endpoint("https://a.example"))
            .expect("connects");

        let reads = async {
            (
                transport.decimals().await,
                transport.description().await,
                transport.latest_answer().await,
                transport.latest_round_data().await.map(|round| round.answer),
                transport.block_number().await,
            )
        };
        let (decimals, description, answer, round_answer, head) =
            tokio::time::timeout(Duration::from_secs(1), reads)
                .await
                .expect("scripted reads finish");

        assert_eq!(decimals, Ok(6));
        assert_eq!(description, Ok(String::from("NGN / USD")));
        assert_eq!(answer, Ok(689));
        assert_eq!(round_answer, Ok(689));
        assert_eq!(head, Ok(1_000));
        assert_eq!(provider.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(provider.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn uninstall_completes_and_removes_the_filter() {
        let provider = ScriptedProvider::new();
        let transport = provider
            .factory()
            .connect(&endpoint("https://a.example"))
            .expect("connects");
        let filter = transport
            .install_filter(FeedEvent::AnswerUpdated)
            .await
            .expect("installs");

        let uninstall = transport.uninstall_filter(&filter);
        let removed = tokio::time::timeout(Duration::from_secs(1), uninstall)
            .await
            .expect("uninstall finishes");

        assert_eq!(removed, Ok(true));
        assert!(provider.installed_filters().is_empty());
    }

    #[test]
    fn refused_endpoints_fail_construction() {
        let provider = ScriptedProvider::new();
        provider.refuse_connections("https://b.example");

        let result = provider.factory().connect(&endpoint("https://b.example"));

        assert!(matches!(result, Err(FeedError::Construction { .. })));
        assert_eq!(provider.connects(), vec![String::from("https://b.example")]);
    }
}
