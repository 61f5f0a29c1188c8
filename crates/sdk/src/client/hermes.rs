use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    time::Duration,
};

use backon::{ExponentialBuilder, Retryable};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::{
    config::OracleConfig,
    oracle::{FeedId, FeedMap, PriceSource},
    types::{AssetId, Price, PriceSnapshot},
};

const SERVICE: &str = "hermes";
const SNIPPET_LEN: usize = 1024;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Response of `/v2/updates/price/{publish_time}`.
#[derive(Debug, Deserialize)]
struct PriceUpdate {
    #[serde(default)]
    parsed: Vec<ParsedPriceUpdate>,
}

#[derive(Debug, Deserialize)]
struct ParsedPriceUpdate {
    id: FeedId,
    price: RpcPrice,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RpcPrice {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    price: i64,
    expo: i32,
    publish_time: i64,
}

impl From<RpcPrice> for Price {
    fn from(value: RpcPrice) -> Self {
        Price::new(value.price, value.expo).with_publish_time(value.publish_time)
    }
}

/// Outcome of a failed attempt.
enum Failure {
    Retry(crate::Error),
    Abort(crate::Error),
}

impl Failure {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    fn into_inner(self) -> crate::Error {
        match self {
            Self::Retry(err) | Self::Abort(err) => err,
        }
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

/// Client of the Pyth Hermes price service.
#[derive(Debug, Clone)]
pub struct HermesClient {
    base_url: Url,
    http: reqwest::Client,
    feeds: FeedMap,
    max_retries: usize,
    retry_delay: Duration,
    max_publish_delay: i64,
}

impl HermesClient {
    /// Create a client from config.
    pub fn try_new(config: &OracleConfig) -> crate::Result<Self> {
        let mut base_url = Url::parse(&config.hermes_url).map_err(crate::Error::custom)?;
        // Endpoints are joined relative to the base, so it must end with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(crate::Error::custom)?;
        for feed in config.feeds.values() {
            feed.to_bytes()?;
        }
        Ok(Self {
            base_url,
            http,
            feeds: config
                .feeds
                .iter()
                .map(|(asset, feed)| (asset.clone(), feed.clone()))
                .collect(),
            max_retries: config.max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_publish_delay: i64::try_from(config.max_publish_delay).unwrap_or(i64::MAX),
        })
    }

    /// Set the first delay of the retry backoff.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Get the feed mapping.
    pub fn feeds(&self) -> &FeedMap {
        &self.feeds
    }

    fn update_url<'a>(
        &self,
        timestamp: i64,
        feeds: impl IntoIterator<Item = &'a FeedId>,
    ) -> crate::Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("v2/updates/price/{timestamp}"))
            .map_err(crate::Error::custom)?;
        {
            let mut query = url.query_pairs_mut();
            for feed in feeds {
                query.append_pair("ids[]", feed.as_str());
            }
            query.append_pair("parsed", "true");
        }
        Ok(url)
    }

    async fn fetch_update(&self, url: Url) -> Result<PriceUpdate, Failure> {
        let resp = self.http.get(url).send().await.map_err(|err| {
            let retry = err.is_timeout() || err.is_connect() || err.is_request();
            let err = crate::Error::upstream(SERVICE, err);
            if retry {
                Failure::Retry(err)
            } else {
                Failure::Abort(err)
            }
        })?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|err| Failure::Retry(crate::Error::upstream(SERVICE, err)))?;

        if !status.is_success() {
            let err = crate::Error::upstream(
                SERVICE,
                format!("http error: {status} body: {}", snippet(&text)),
            );
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(Failure::Retry(err))
            } else {
                Err(Failure::Abort(err))
            };
        }

        serde_json::from_str::<PriceUpdate>(&text).map_err(|err| {
            Failure::Abort(crate::Error::upstream(
                SERVICE,
                format!("failed to decode price update: {err} body_snippet: {}", snippet(&text)),
            ))
        })
    }
}

/// Build a snapshot from an update, pricing every asset mapped to a returned feed.
///
/// Prices published more than `max_publish_delay` seconds after `timestamp`
/// are dropped.
fn into_snapshot(
    update: PriceUpdate,
    requested: &BTreeMap<&FeedId, Vec<&AssetId>>,
    timestamp: i64,
    max_publish_delay: i64,
) -> crate::Result<PriceSnapshot> {
    let mut snapshot = PriceSnapshot::new(timestamp);
    for parsed in update.parsed {
        let Some(assets) = requested.get(&parsed.id) else {
            tracing::debug!(feed = %parsed.id, "ignored unrequested feed");
            continue;
        };
        let delay = parsed.price.publish_time.saturating_sub(timestamp);
        if delay > max_publish_delay {
            tracing::warn!(
                feed = %parsed.id,
                publish_time = parsed.price.publish_time,
                timestamp,
                "price published too late, ignored"
            );
            continue;
        }
        let price = Price::from(parsed.price);
        for asset in assets {
            snapshot.insert((*asset).clone(), price);
        }
    }
    for asset in requested.values().flatten() {
        if snapshot.get(asset).is_none() {
            tracing::warn!(%asset, timestamp, "no price returned, asset is unscored");
        }
    }
    if snapshot.is_empty() {
        return Err(crate::Error::NoDataAtTimestamp { timestamp });
    }
    Ok(snapshot)
}

impl PriceSource for HermesClient {
    fn fetch_prices(
        &self,
        assets: &BTreeSet<AssetId>,
        timestamp: i64,
    ) -> impl Future<Output = crate::Result<PriceSnapshot>> + Send {
        async move {
            let requested = self.feeds.resolve(assets);
            if requested.is_empty() {
                return Err(crate::Error::NoDataAtTimestamp { timestamp });
            }
            let url = self.update_url(timestamp, requested.keys().copied())?;
            tracing::debug!(%url, "fetching prices");

            let update = (|| self.fetch_update(url.clone()))
                .retry(
                    ExponentialBuilder::default()
                        .with_min_delay(self.retry_delay)
                        .with_max_times(self.max_retries),
                )
                .when(Failure::is_retryable)
                .notify(|failure: &Failure, after: Duration| {
                    if let Failure::Retry(err) = failure {
                        tracing::warn!(%err, ?after, timestamp, "price request failed, retrying");
                    }
                })
                .await
                .map_err(Failure::into_inner)?;

            into_snapshot(update, &requested, timestamp, self.max_publish_delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::{config::DEFAULT_HERMES_URL, ErrorKind};

    const SOL_FEED: &str = "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";
    const ETH_FEED: &str = "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";
    const USDC_FEED: &str = "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a";

    fn config(hermes_url: &str) -> OracleConfig {
        OracleConfig {
            hermes_url: hermes_url.to_string(),
            max_retries: 2,
            feeds: [
                ("SOL".to_string(), FeedId::new(SOL_FEED)),
                ("ETH".to_string(), FeedId::new(ETH_FEED)),
                ("USDC".to_string(), FeedId::new(USDC_FEED)),
                ("USDC.e".to_string(), FeedId::new(USDC_FEED)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    fn client() -> HermesClient {
        HermesClient::try_new(&config(DEFAULT_HERMES_URL)).unwrap()
    }

    fn assets(assets: &[&str]) -> BTreeSet<AssetId> {
        assets.iter().map(|a| a.to_string()).collect()
    }

    fn sol_update(publish_time: i64) -> String {
        serde_json::json!({
            "parsed": [{
                "id": SOL_FEED.trim_start_matches("0x"),
                "price": { "price": "14302000000", "conf": "1000", "expo": -8, "publish_time": publish_time },
            }],
        })
        .to_string()
    }

    /// A local HTTP server answering with canned `(status, body)` pairs in order.
    struct Hermes {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl Hermes {
        async fn start(responses: Vec<(u16, String)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}/hermes", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let recorded = requests.clone();
            tokio::spawn(async move {
                for (status, body) in responses {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    let mut buf = vec![0u8; 8192];
                    let n = stream.read(&mut buf).await.unwrap();
                    let head = String::from_utf8_lossy(&buf[..n]);
                    let line = head.lines().next().unwrap_or_default().to_string();
                    recorded.lock().unwrap().push(line);
                    let response = format!(
                        "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.ok();
                }
            });
            Self { url, requests }
        }

        fn client(&self) -> HermesClient {
            HermesClient::try_new(&config(&self.url))
                .unwrap()
                .with_retry_delay(Duration::from_millis(1))
        }

        fn hits(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[test]
    fn malformed_feed_ids_are_rejected() {
        for feed in ["0x01", "not-hex"] {
            let config = OracleConfig {
                feeds: [("SOL".to_string(), FeedId::new(feed))].into_iter().collect(),
                ..Default::default()
            };
            assert!(HermesClient::try_new(&config).is_err());
        }
    }

    #[test]
    fn update_url() {
        let client = client();
        let feed = FeedId::new(SOL_FEED);
        let url = client.update_url(1_700_000_000, [&feed]).unwrap();
        assert_eq!(url.path(), "/v2/updates/price/1700000000");
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs[0].0, "ids[]");
        assert_eq!(pairs[0].1, feed.as_str());
        assert_eq!(pairs[1].0, "parsed");
    }

    #[test]
    fn update_url_keeps_base_path() {
        let feed = FeedId::new(SOL_FEED);
        for base in ["https://proxy.example/hermes", "https://proxy.example/hermes/"] {
            let client = HermesClient::try_new(&config(base)).unwrap();
            let url = client.update_url(5, [&feed]).unwrap();
            assert_eq!(url.path(), "/hermes/v2/updates/price/5");
        }
    }

    #[test]
    fn parse_string_and_numeric_prices() {
        let update: PriceUpdate = serde_json::from_value(serde_json::json!({
            "binary": { "encoding": "hex", "data": [] },
            "parsed": [
                {
                    "id": SOL_FEED.trim_start_matches("0x").to_uppercase(),
                    "price": { "price": "14302000000", "conf": "1000", "expo": -8, "publish_time": 1700000000 },
                },
                {
                    "id": format!("0x{ETH_FEED}"),
                    "price": { "price": 200012000000i64, "conf": 5, "expo": -8, "publish_time": 1700000001 },
                },
                {
                    "id": "00",
                    "price": { "price": "1", "conf": "0", "expo": 0, "publish_time": 0 },
                },
            ],
        }))
        .unwrap();

        let assets = assets(&["SOL", "ETH"]);
        let client = client();
        let requested = client.feeds().resolve(&assets);
        let snapshot = into_snapshot(update, &requested, 1_700_000_000, 60).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!((snapshot.get("SOL").unwrap().value() - 143.02).abs() < 1e-9);
        let eth = snapshot.get("ETH").unwrap();
        assert_eq!(eth.price, 200_012_000_000);
        assert_eq!(eth.publish_time, 1_700_000_001);
    }

    #[test]
    fn shared_feed_prices_every_asset() {
        let update: PriceUpdate = serde_json::from_value(serde_json::json!({
            "parsed": [{
                "id": USDC_FEED,
                "price": { "price": "99990000", "conf": "1", "expo": -8, "publish_time": 10 },
            }],
        }))
        .unwrap();
        let assets = assets(&["USDC", "USDC.e"]);
        let client = client();
        let requested = client.feeds().resolve(&assets);
        assert_eq!(requested.len(), 1);
        let snapshot = into_snapshot(update, &requested, 10, 60).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("USDC"), snapshot.get("USDC.e"));
    }

    #[test]
    fn late_prices_are_dropped() {
        let assets = assets(&["SOL"]);
        let client = client();
        let requested = client.feeds().resolve(&assets);
        let parse = |body: String| serde_json::from_str::<PriceUpdate>(&body).unwrap();

        let snapshot = into_snapshot(parse(sol_update(1_060)), &requested, 1_000, 60).unwrap();
        assert_eq!(snapshot.get("SOL").unwrap().publish_time, 1_060);

        let err = into_snapshot(parse(sol_update(1_061)), &requested, 1_000, 60).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDataAtTimestamp);
    }

    #[test]
    fn empty_update_has_no_data() {
        let assets = assets(&["SOL"]);
        let client = client();
        let requested = client.feeds().resolve(&assets);
        let update: PriceUpdate = serde_json::from_str(r#"{"parsed":[]}"#).unwrap();
        let err = into_snapshot(update, &requested, 5, 60).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDataAtTimestamp);
    }

    #[tokio::test]
    async fn unmapped_assets_are_not_requested() {
        let err = client().fetch_prices(&assets(&["BONK"]), 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDataAtTimestamp);
    }

    #[tokio::test]
    async fn fetch_prices_from_server() -> eyre::Result<()> {
        let hermes = Hermes::start(vec![(200, sol_update(1_000))]).await;
        let snapshot = hermes
            .client()
            .fetch_prices(&assets(&["SOL"]), 1_000)
            .await?;
        assert!((snapshot.get("SOL").unwrap().value() - 143.02).abs() < 1e-9);

        let requests = hermes.requests.lock().unwrap();
        assert!(requests[0].starts_with("GET /hermes/v2/updates/price/1000?ids"));
        Ok(())
    }

    #[tokio::test]
    async fn transient_failures_are_retried() -> eyre::Result<()> {
        let hermes = Hermes::start(vec![
            (503, "unavailable".to_string()),
            (429, "slow down".to_string()),
            (200, sol_update(1_000)),
        ])
        .await;
        let snapshot = hermes
            .client()
            .fetch_prices(&assets(&["SOL"]), 1_000)
            .await?;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(hermes.hits(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let hermes = Hermes::start(vec![(500, "boom".to_string()); 3]).await;
        let err = hermes
            .client()
            .fetch_prices(&assets(&["SOL"]), 1_000)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("boom"));
        assert_eq!(hermes.hits(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hermes = Hermes::start(vec![
            (404, "no price".to_string()),
            (200, "<html>".to_string()),
        ])
        .await;
        let client = hermes.client();

        let err = client.fetch_prices(&assets(&["SOL"]), 1_000).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(hermes.hits(), 1);

        let err = client.fetch_prices(&assets(&["SOL"]), 1_000).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("failed to decode"));
        assert_eq!(hermes.hits(), 2);
    }
}
