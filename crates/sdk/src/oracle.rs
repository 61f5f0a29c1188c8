use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    future::Future,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::types::{AssetId, Price, PriceSnapshot};

/// A Pyth price feed id: lowercase hex without the `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FeedId(String);

impl FeedId {
    /// Normalize a feed id.
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().trim();
        let id = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .unwrap_or(id);
        Self(id.to_ascii_lowercase())
    }

    /// Returns the normalized id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the id into its 32 raw bytes.
    pub fn to_bytes(&self) -> crate::Result<[u8; 32]> {
        let bytes = hex::decode(&self.0)
            .map_err(|err| crate::Error::custom(format!("invalid feed id `{self}`: {err}")))?;
        bytes
            .try_into()
            .map_err(|_| crate::Error::custom(format!("feed id `{self}` is not 32 bytes")))
    }
}

impl From<String> for FeedId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FeedId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<FeedId> for String {
    fn from(value: FeedId) -> Self {
        value.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bidirectional mapping between assets and price feeds.
///
/// Several assets may share a feed, e.g. bridged variants of a stablecoin.
#[derive(Debug, Clone, Default)]
pub struct FeedMap {
    feeds: BTreeMap<AssetId, FeedId>,
    assets: BTreeMap<FeedId, BTreeSet<AssetId>>,
}

impl FeedMap {
    /// Get the feed of an asset.
    pub fn feed(&self, asset: &str) -> Option<&FeedId> {
        self.feeds.get(asset)
    }

    /// Get the assets priced by a feed.
    pub fn assets(&self, feed: &FeedId) -> impl Iterator<Item = &AssetId> {
        self.assets.get(feed).into_iter().flatten()
    }

    /// Group `assets` by feed, dropping the unmapped ones.
    pub fn resolve<'a>(
        &'a self,
        assets: impl IntoIterator<Item = &'a AssetId>,
    ) -> BTreeMap<&'a FeedId, Vec<&'a AssetId>> {
        let mut resolved = BTreeMap::<_, Vec<_>>::new();
        for asset in assets {
            match self.feed(asset) {
                Some(feed) => resolved.entry(feed).or_default().push(asset),
                None => tracing::warn!(%asset, "no feed mapping, asset is unscored"),
            }
        }
        resolved
    }
}

impl FromIterator<(AssetId, FeedId)> for FeedMap {
    fn from_iter<T: IntoIterator<Item = (AssetId, FeedId)>>(iter: T) -> Self {
        let mut map = Self::default();
        for (asset, feed) in iter {
            if let Some(previous) = map.feeds.insert(asset.clone(), feed.clone()) {
                if let Some(assets) = map.assets.get_mut(&previous) {
                    assets.remove(&asset);
                }
            }
            map.assets.entry(feed).or_default().insert(asset);
        }
        map
    }
}

/// A source of historical prices.
pub trait PriceSource {
    /// Fetch the prices of `assets` at `timestamp`.
    ///
    /// Assets the source cannot price are omitted from the snapshot.
    /// Fails with [`Error::NoDataAtTimestamp`](crate::Error::NoDataAtTimestamp)
    /// if none of them can be priced.
    fn fetch_prices(
        &self,
        assets: &BTreeSet<AssetId>,
        timestamp: i64,
    ) -> impl Future<Output = crate::Result<PriceSnapshot>> + Send;
}

impl<P: PriceSource + Sync> PriceSource for Arc<P> {
    fn fetch_prices(
        &self,
        assets: &BTreeSet<AssetId>,
        timestamp: i64,
    ) -> impl Future<Output = crate::Result<PriceSnapshot>> + Send {
        (**self).fetch_prices(assets, timestamp)
    }
}

/// In-memory price history.
///
/// Each asset is priced from its latest entry at or before the requested
/// timestamp. Deserializes from `{ "<timestamp>": { "<asset>": <price> } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticPriceSource {
    history: BTreeMap<i64, BTreeMap<AssetId, Price>>,
}

impl StaticPriceSource {
    /// Record the price of `asset` at `timestamp`.
    pub fn insert(&mut self, timestamp: i64, asset: impl Into<AssetId>, price: Price) {
        self.history
            .entry(timestamp)
            .or_default()
            .insert(asset.into(), price);
    }

    /// Record the price of `asset` at `timestamp`.
    pub fn with_price(mut self, timestamp: i64, asset: impl Into<AssetId>, price: Price) -> Self {
        self.insert(timestamp, asset, price);
        self
    }

    fn snapshot(&self, assets: &BTreeSet<AssetId>, timestamp: i64) -> crate::Result<PriceSnapshot> {
        let mut snapshot = PriceSnapshot::new(timestamp);
        for asset in assets {
            let latest = self
                .history
                .range(..=timestamp)
                .rev()
                .find_map(|(_, prices)| prices.get(asset));
            match latest {
                Some(price) => {
                    snapshot.insert(asset.clone(), *price);
                }
                None => tracing::warn!(%asset, timestamp, "no recorded price"),
            }
        }
        if snapshot.is_empty() {
            return Err(crate::Error::NoDataAtTimestamp { timestamp });
        }
        Ok(snapshot)
    }
}

impl PriceSource for StaticPriceSource {
    fn fetch_prices(
        &self,
        assets: &BTreeSet<AssetId>,
        timestamp: i64,
    ) -> impl Future<Output = crate::Result<PriceSnapshot>> + Send {
        let res = self.snapshot(assets, timestamp);
        std::future::ready(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn assets(assets: &[&str]) -> BTreeSet<AssetId> {
        assets.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn feed_id_is_normalized() {
        let a = FeedId::new("0xEF0D8B6FDA2CEBA41DA15D4095D1DA392A0D2F8ED0C6C7BC0F4CFAC8C280B56D");
        let b = FeedId::new("ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d");
        assert_eq!(a, b);
        let decoded: FeedId = serde_json::from_str("\"0xAB\"").unwrap();
        assert_eq!(decoded.as_str(), "ab");
        assert_eq!(a.to_bytes().unwrap()[0], 0xef);
        assert!(decoded.to_bytes().is_err());
    }

    #[test]
    fn unmapped_assets_are_dropped() {
        let map: FeedMap = [("SOL".to_string(), FeedId::new("0x01"))]
            .into_iter()
            .collect();
        let assets = assets(&["SOL", "BONK"]);
        let resolved = map.resolve(&assets);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[&FeedId::new("01")], ["SOL"]);
        assert_eq!(map.assets(&FeedId::new("0X01")).collect::<Vec<_>>(), ["SOL"]);
    }

    #[test]
    fn assets_sharing_a_feed() {
        let map: FeedMap = [
            ("USDC".to_string(), FeedId::new("0x02")),
            ("USDC.e".to_string(), FeedId::new("0x02")),
            ("SOL".to_string(), FeedId::new("0x01")),
            ("SOL".to_string(), FeedId::new("0x03")),
        ]
        .into_iter()
        .collect();
        let requested = assets(&["USDC", "USDC.e", "SOL"]);
        let resolved = map.resolve(&requested);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[&FeedId::new("02")], ["USDC", "USDC.e"]);
        assert_eq!(resolved[&FeedId::new("03")], ["SOL"]);
        assert_eq!(map.assets(&FeedId::new("01")).count(), 0);
    }

    #[tokio::test]
    async fn static_source_serves_latest_prior_entry() {
        let source = StaticPriceSource::default()
            .with_price(100, "SOL", Price::new(10, 0))
            .with_price(200, "SOL", Price::new(12, 0))
            .with_price(200, "ETH", Price::new(2000, 0));

        let snapshot = source.fetch_prices(&assets(&["SOL", "ETH"]), 150).await.unwrap();
        assert_eq!(snapshot.timestamp(), 150);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("SOL").unwrap().price, 10);

        let snapshot = source.fetch_prices(&assets(&["SOL", "ETH"]), 300).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("SOL").unwrap().price, 12);

        let err = source.fetch_prices(&assets(&["SOL"]), 50).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDataAtTimestamp);
    }

    #[tokio::test]
    async fn assets_are_priced_from_their_own_latest_entry() {
        let source = StaticPriceSource::default()
            .with_price(100, "SOL", Price::new(10, 0))
            .with_price(200, "ETH", Price::new(2000, 0));

        let snapshot = source.fetch_prices(&assets(&["SOL", "ETH"]), 300).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("SOL").unwrap().price, 10);
        assert_eq!(snapshot.get("ETH").unwrap().price, 2000);
    }

    #[test]
    fn static_source_from_json() {
        let source: StaticPriceSource = serde_json::from_value(serde_json::json!({
            "100": { "SOL": { "price": 1000, "expo": -2 } },
        }))
        .unwrap();
        let snapshot = source.snapshot(&assets(&["SOL"]), 100).unwrap();
        assert_eq!(snapshot.get("SOL").unwrap().value(), 10.0);
    }
}
