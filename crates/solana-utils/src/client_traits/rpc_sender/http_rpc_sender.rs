use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use backon::{DefaultSleeper, Sleeper};
use reqwest::{header, StatusCode};
use serde_json::Value;
use solana_rpc_client_api::request::RpcRequest;

use super::{RpcSender, RpcTransportStats};

const DEFAULT_RATE_LIMIT_RETRIES: usize = 5;
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Sends JSON-RPC requests over HTTP.
///
/// `429 Too Many Requests` responses are retried in place, honoring the
/// `Retry-After` header. Other failures are returned to the caller.
pub struct HttpRpcSender {
    client: reqwest::Client,
    url: String,
    request_id: AtomicU64,
    stats: Mutex<RpcTransportStats>,
    rate_limit_retries: usize,
    sleeper: DefaultSleeper,
}

impl std::fmt::Debug for HttpRpcSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcSender")
            .field("url", &self.url)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .finish_non_exhaustive()
    }
}

impl HttpRpcSender {
    /// Create a sender with a default [`reqwest::Client`].
    pub fn new(url: impl ToString) -> Self {
        Self::new_with_client(url, Default::default())
    }

    /// Create a sender whose requests time out after `timeout`.
    pub fn new_with_timeout(url: impl ToString, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(url, client))
    }

    /// Create a sender with the given client.
    pub fn new_with_client(url: impl ToString, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.to_string(),
            request_id: Default::default(),
            stats: Default::default(),
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            sleeper: DefaultSleeper::default(),
        }
    }

    /// Set how many `429` responses are retried per request.
    pub fn with_rate_limit_retries(mut self, retries: usize) -> Self {
        self.rate_limit_retries = retries;
        self
    }

    fn record(&self, started: Instant, rate_limited: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.request_count += 1;
        stats.elapsed_time += started.elapsed();
        stats.rate_limited_time += rate_limited;
    }

    async fn post(&self, request: RpcRequest, body: String) -> crate::Result<(Value, Duration)> {
        let mut rate_limited = Duration::ZERO;
        let mut retries_left = self.rate_limit_retries;
        loop {
            let response = self
                .client
                .post(&self.url)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS && retries_left > 0 {
                retries_left -= 1;
                let delay = retry_after(response.headers());
                tracing::debug!(%request, retries_left, ?delay, "rate limited, backing off");
                self.sleeper.sleep(delay).await;
                rate_limited += delay;
                continue;
            }

            let response = response.error_for_status()?;
            return Ok((response.json().await?, rate_limited));
        }
    }
}

/// Delay requested by a `Retry-After` header given in seconds.
fn retry_after(headers: &header::HeaderMap) -> Duration {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .filter(|delay| *delay < MAX_RETRY_AFTER)
        .unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF)
}

/// Unwrap a JSON-RPC response envelope.
fn into_result(request: RpcRequest, mut response: Value) -> crate::Result<Value> {
    let error = response["error"].take();
    if error.is_object() {
        let code = error["code"].as_i64().unwrap_or_default();
        let message = error["message"].as_str().unwrap_or_default().to_string();
        tracing::debug!(%request, code, %message, "rpc responded with an error");
        return Err(crate::Error::RpcResponse {
            code,
            message,
            data: error.get("data").cloned().unwrap_or_default(),
        });
    }
    Ok(response["result"].take())
}

impl RpcSender for HttpRpcSender {
    async fn send(&self, request: RpcRequest, params: Value) -> crate::Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = request.build_request_json(id, params).to_string();

        let started = Instant::now();
        let res = self.post(request, body).await;
        let rate_limited = res.as_ref().map(|(_, d)| *d).unwrap_or_default();
        self.record(started, rate_limited);

        let (response, _) = res?;
        into_result(request, response)
    }

    fn get_transport_stats(&self) -> RpcTransportStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}
