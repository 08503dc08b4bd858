//! Contract tests for the JSON-RPC transport handle.
//!
//! A canned [`HttpClient`] stands in for the provider so the exact wire
//! requests and the failure classification can be checked without network
//! access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fxfeed_core::abi::{self, encode_int_word, encode_uint_word};
use fxfeed_core::http_client::HttpFuture;
use fxfeed_core::{
    BlockWindow, Endpoint, ErrorClass, FeedAddress, FeedConfig, FeedError, FeedEvent,
    FeedTransport, FilterId, HttpClient, HttpError, HttpRequest, HttpResponse, PriceFeed,
    RecordingSleeper, RoundId, RpcTransportFactory, TransportErrorKind, TransportFactory,
};
use serde_json::{json, Value};

const FEED_ADDRESS: &str = "0x5e2b26b0a3ef2b2b4f3e6d2b8f3c1f0b9a8d7c6e";
const ENDPOINT: &str = "https://rpc-a.example/v2/secret-key";

#[derive(Clone)]
enum Canned {
    Response(HttpResponse),
    Failure(HttpError),
}

/// Answers by JSON-RPC method (and, for `eth_call`, by selector).
#[derive(Default)]
struct CannedHttpClient {
    responses: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl CannedHttpClient {
    fn respond(&self, key: &str, canned: Canned) {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(key.to_owned(), canned);
    }

    fn result(&self, key: &str, result: Value) {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string();
        self.respond(key, Canned::Response(HttpResponse::ok_json(body)));
    }

    fn rpc_error(&self, key: &str, code: i64, message: &str) {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": code, "message": message },
        })
        .to_string();
        self.respond(key, Canned::Response(HttpResponse::ok_json(body)));
    }

    fn status(&self, key: &str, status: u16, body: &str) {
        self.respond(
            key,
            Canned::Response(HttpResponse {
                status,
                body: body.to_owned(),
            }),
        );
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let body: Value = serde_json::from_str(&request.body).expect("request is json");
            let method = body["method"].as_str().unwrap_or_default().to_owned();
            let key = if method == "eth_call" {
                body["params"][0]["data"].as_str().unwrap_or_default().to_owned()
            } else {
                method
            };
            self.requests
                .lock()
                .expect("requests lock")
                .push((request.url.clone(), body));

            let canned = self
                .responses
                .lock()
                .expect("responses lock")
                .get(&key)
                .cloned();
            match canned {
                Some(Canned::Response(response)) => Ok(response),
                Some(Canned::Failure(error)) => Err(error),
                None => Ok(HttpResponse {
                    status: 404,
                    body: String::from("not scripted"),
                }),
            }
        })
    }
}

fn word(hex_word: String) -> Value {
    Value::String(format!("0x{hex_word}"))
}

fn abi_string(text: &str) -> Value {
    let mut padded = hex::encode(text);
    let width = padded.len().div_ceil(64).max(1) * 64;
    padded.push_str(&"0".repeat(width - padded.len()));
    Value::String(format!(
        "0x{}{}{}",
        encode_uint_word(32),
        encode_uint_word(text.len() as u128),
        padded
    ))
}

fn answer_updated_log(block: u64, answer: i128, round: u128, removed: bool) -> Value {
    json!({
        "address": FEED_ADDRESS,
        "blockNumber": abi::format_quantity(block),
        "transactionHash": format!("0x{block:064x}"),
        "topics": [
            abi::ANSWER_UPDATED_TOPIC,
            format!("0x{}", encode_int_word(answer)),
            format!("0x{}", encode_uint_word(round)),
        ],
        "data": format!("0x{}", encode_uint_word(1_700_000_000 + u128::from(block))),
        "removed": removed,
    })
}

fn transport(client: &Arc<CannedHttpClient>) -> Arc<dyn FeedTransport> {
    let address = FeedAddress::parse(FEED_ADDRESS).expect("valid address");
    RpcTransportFactory::with_http_client(Arc::clone(client) as Arc<dyn HttpClient>, address, 2_000)
        .connect(&Endpoint::parse(ENDPOINT).expect("valid endpoint"))
        .expect("connects")
}

// =============================================================================
// Read Surface
// =============================================================================

#[tokio::test]
async fn decimals_is_an_eth_call_against_the_feed_address() {
    let client = Arc::new(CannedHttpClient::default());
    client.result(abi::DECIMALS_SELECTOR, word(encode_uint_word(6)));

    let decimals = transport(&client).decimals().await.expect("decodes");

    assert_eq!(decimals, 6);
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let (url, body) = &requests[0];
    assert_eq!(url, ENDPOINT);
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "eth_call");
    assert_eq!(body["params"][0]["to"], FEED_ADDRESS);
    assert_eq!(body["params"][0]["data"], abi::DECIMALS_SELECTOR);
    assert_eq!(body["params"][1], "latest");
}

#[tokio::test]
async fn description_decodes_dynamic_string() {
    let client = Arc::new(CannedHttpClient::default());
    client.result(abi::DESCRIPTION_SELECTOR, abi_string("NGN / USD"));

    let description = transport(&client).description().await.expect("decodes");

    assert_eq!(description, "NGN / USD");
}

#[tokio::test]
async fn latest_answer_decodes_negative_values() {
    let client = Arc::new(CannedHttpClient::default());
    client.result(abi::LATEST_ANSWER_SELECTOR, word(encode_int_word(-689)));

    let answer = transport(&client).latest_answer().await.expect("decodes");

    assert_eq!(answer, -689);
}

#[tokio::test]
async fn latest_round_data_decodes_the_tuple() {
    let round = (2_u128 << 64) + 17;
    let client = Arc::new(CannedHttpClient::default());
    client.result(
        abi::LATEST_ROUND_DATA_SELECTOR,
        Value::String(format!(
            "0x{}{}{}{}{}",
            encode_uint_word(round),
            encode_int_word(689),
            encode_uint_word(1_700_000_000),
            encode_uint_word(1_700_000_030),
            encode_uint_word(round)
        )),
    );

    let data = transport(&client).latest_round_data().await.expect("decodes");

    assert_eq!(data.round_id, RoundId::new(round));
    assert_eq!(data.answer, 689);
    assert_eq!(data.started_at, 1_700_000_000);
    assert_eq!(data.updated_at, 1_700_000_030);
}

#[tokio::test]
async fn get_logs_filters_by_topic_and_skips_removed_logs() {
    let client = Arc::new(CannedHttpClient::default());
    client.result(
        "eth_getLogs",
        json!([
            answer_updated_log(900, 688, 1, false),
            answer_updated_log(910, 1, 2, true),
            answer_updated_log(920, 690, 3, false),
        ]),
    );

    let logs = transport(&client)
        .answer_updated_logs(BlockWindow::new(880, 929))
        .await
        .expect("decodes");

    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].block_number, 900);
    assert_eq!(logs[1].round_id, RoundId::new(3));

    let (_, body) = &client.requests()[0];
    let filter = &body["params"][0];
    assert_eq!(filter["address"], FEED_ADDRESS);
    assert_eq!(filter["fromBlock"], "0x370");
    assert_eq!(filter["toBlock"], "0x3a1");
    assert_eq!(filter["topics"][0], abi::ANSWER_UPDATED_TOPIC);
}

#[tokio::test]
async fn filter_lifecycle_uses_filter_polling_methods() {
    let client = Arc::new(CannedHttpClient::default());
    client.result("eth_newFilter", json!("0xabc"));
    client.result("eth_getFilterChanges", json!([answer_updated_log(1_001, 700, 9, false)]));
    client.result("eth_uninstallFilter", json!(true));
    let transport = transport(&client);

    let filter = transport
        .install_filter(FeedEvent::AnswerUpdated)
        .await
        .expect("installs");
    let changes = transport.filter_changes(&filter).await.expect("polls");
    let removed = transport.uninstall_filter(&filter).await.expect("uninstalls");

    assert_eq!(filter, FilterId(String::from("0xabc")));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].answer, 700);
    assert!(removed);

    let methods: Vec<String> = client
        .requests()
        .iter()
        .map(|(_, body)| body["method"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(
        methods,
        vec!["eth_newFilter", "eth_getFilterChanges", "eth_uninstallFilter"]
    );
}

// =============================================================================
// Failure Classification
// =============================================================================

#[tokio::test]
async fn http_429_is_rate_limited() {
    let client = Arc::new(CannedHttpClient::default());
    client.status(abi::LATEST_ANSWER_SELECTOR, 429, "Too Many Requests");

    let error = transport(&client).latest_answer().await.expect_err("throttled");

    assert_eq!(error.kind(), TransportErrorKind::RateLimited);
    assert!(error.is_transient());
}

#[tokio::test]
async fn rpc_error_32005_is_rate_limited() {
    let client = Arc::new(CannedHttpClient::default());
    client.rpc_error(abi::LATEST_ANSWER_SELECTOR, -32005, "limit exceeded");

    let error = transport(&client).latest_answer().await.expect_err("throttled");

    assert_eq!(error.kind(), TransportErrorKind::RateLimited);
}

#[tokio::test]
async fn unknown_filter_is_filter_expired() {
    let client = Arc::new(CannedHttpClient::default());
    client.rpc_error("eth_getFilterChanges", -32000, "filter not found");

    let error = transport(&client)
        .filter_changes(&FilterId(String::from("0x1")))
        .await
        .expect_err("expired");

    assert_eq!(error.kind(), TransportErrorKind::FilterExpired);
    assert!(error.is_transient());
}

#[tokio::test]
async fn server_errors_and_dropped_connections_are_not_transient() {
    let client = Arc::new(CannedHttpClient::default());
    client.status(abi::DECIMALS_SELECTOR, 503, "");
    client.respond(
        abi::LATEST_ANSWER_SELECTOR,
        Canned::Failure(HttpError::timeout("request timeout")),
    );
    client.respond(
        abi::DESCRIPTION_SELECTOR,
        Canned::Failure(HttpError::new("connection failed: reset by peer")),
    );
    let transport = transport(&client);

    let unavailable = transport.decimals().await.expect_err("503");
    let timed_out = transport.latest_answer().await.expect_err("timeout");
    let dropped = transport.description().await.expect_err("reset");

    assert_eq!(unavailable.kind(), TransportErrorKind::Unavailable);
    assert_eq!(timed_out.kind(), TransportErrorKind::Timeout);
    assert_eq!(timed_out.code(), "transport.timeout");
    assert_eq!(dropped.kind(), TransportErrorKind::Connection);
    assert!(!unavailable.is_transient());
    assert!(!timed_out.is_transient());
    assert!(!dropped.is_transient());
    assert_eq!(FeedError::from(timed_out).class(), ErrorClass::Other);
}

#[tokio::test]
async fn malformed_payloads_are_decode_errors() {
    let client = Arc::new(CannedHttpClient::default());
    client.status(abi::DECIMALS_SELECTOR, 200, "<html>gateway</html>");
    client.result(abi::LATEST_ANSWER_SELECTOR, json!("0x12"));
    let transport = transport(&client);

    let not_json = transport.decimals().await.expect_err("not json");
    let short_word = transport.latest_answer().await.expect_err("too short");

    assert_eq!(not_json.kind(), TransportErrorKind::Decode);
    assert_eq!(short_word.kind(), TransportErrorKind::Decode);
}

#[tokio::test]
async fn error_messages_do_not_leak_the_endpoint_path() {
    let client = Arc::new(CannedHttpClient::default());
    client.status(abi::DECIMALS_SELECTOR, 429, "");

    let error = transport(&client).decimals().await.expect_err("throttled");

    assert!(!error.to_string().contains("secret-key"));
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
async fn price_feed_over_json_rpc_formats_both_directions() {
    let client = Arc::new(CannedHttpClient::default());
    client.result(abi::DECIMALS_SELECTOR, word(encode_uint_word(6)));
    client.result(abi::DESCRIPTION_SELECTOR, abi_string("NGN / USD"));
    client.result(abi::LATEST_ANSWER_SELECTOR, word(encode_int_word(689)));

    let config = FeedConfig::builder()
        .with_rpc_urls([ENDPOINT])
        .with_feed_address(FEED_ADDRESS)
        .build()
        .expect("valid config");
    let factory = RpcTransportFactory::with_http_client(
        Arc::clone(&client) as Arc<dyn HttpClient>,
        config.feed_address.clone(),
        config.request_timeout_ms,
    );
    let feed = PriceFeed::builder(config)
        .with_factory(Arc::new(factory))
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .build()
        .expect("feed builds");

    let price = feed.get_current_price().await.expect("price");

    assert_eq!(price.direct_display, "1 USD = 1451.38 NGN");
    assert_eq!(price.inverse_display, "1 NGN = 0.000689 USD");
    assert_eq!(price.description, "NGN / USD");
    assert_eq!(price.raw_answer, 689);
}
