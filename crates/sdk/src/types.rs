use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

/// Asset identifier, the base58 address of the token mint.
pub type AssetId = String;

/// Portfolio owner identifier, the base58 address of the user.
pub type OwnerId = String;

/// A weighted position in a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllocation {
    /// Asset.
    pub asset: AssetId,
    /// Percentage of the portfolio, `0..=100`.
    pub weight: u8,
}

impl TokenAllocation {
    /// Create a new allocation.
    pub fn new(asset: impl Into<AssetId>, weight: u8) -> Self {
        Self {
            asset: asset.into(),
            weight,
        }
    }
}

/// A registered portfolio. Locked once the tournament starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Owner.
    pub owner: OwnerId,
    /// Tournament.
    pub tournament: String,
    /// Allocations, in registration order.
    pub allocations: Vec<TokenAllocation>,
}

impl Portfolio {
    /// Sum of the allocation weights.
    pub fn total_weight(&self) -> u32 {
        self.allocations.iter().map(|a| u32::from(a.weight)).sum()
    }

    /// Iterate over the assets of the portfolio.
    pub fn assets(&self) -> impl Iterator<Item = &AssetId> + '_ {
        self.allocations.iter().map(|a| &a.asset)
    }
}

/// An oracle price in fixed-point form, `price * 10^expo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Mantissa.
    pub price: i64,
    /// Decimal exponent.
    pub expo: i32,
    /// Unix timestamp of the price.
    #[serde(default)]
    pub publish_time: i64,
}

impl Price {
    /// Create a new price.
    pub fn new(price: i64, expo: i32) -> Self {
        Self {
            price,
            expo,
            publish_time: 0,
        }
    }

    /// Set the publish time.
    pub fn with_publish_time(mut self, publish_time: i64) -> Self {
        self.publish_time = publish_time;
        self
    }

    /// Price as a float.
    pub fn value(&self) -> f64 {
        self.price as f64 * 10f64.powi(self.expo)
    }
}

/// Prices of a set of assets at a given timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    timestamp: i64,
    prices: BTreeMap<AssetId, Price>,
}

impl PriceSnapshot {
    /// Create an empty snapshot for `timestamp`.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            prices: BTreeMap::default(),
        }
    }

    /// Requested timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Insert a price, replacing any previous one for the asset.
    pub fn insert(&mut self, asset: impl Into<AssetId>, price: Price) -> Option<Price> {
        self.prices.insert(asset.into(), price)
    }

    /// Insert a price.
    pub fn with_price(mut self, asset: impl Into<AssetId>, price: Price) -> Self {
        self.insert(asset, price);
        self
    }

    /// Get the price of an asset.
    pub fn get(&self, asset: &str) -> Option<&Price> {
        self.prices.get(asset)
    }

    /// Number of priced assets.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Returns `true` if no asset is priced.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Iterate over the prices.
    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &Price)> + '_ {
        self.prices.iter()
    }
}

/// PnL of one portfolio over the tournament window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlResult {
    /// Owner.
    pub owner: OwnerId,
    /// Fractional return, `0.025` is 2.5%.
    pub pnl: f64,
}

impl PnlResult {
    /// Create a new result.
    pub fn new(owner: impl Into<OwnerId>, pnl: f64) -> Self {
        Self {
            owner: owner.into(),
            pnl,
        }
    }
}

/// A confirmed settlement transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Tournament.
    #[serde_as(as = "DisplayFromStr")]
    pub tournament: Pubkey,
    /// Winner.
    #[serde_as(as = "DisplayFromStr")]
    pub winner: Pubkey,
    /// Transaction signature.
    #[serde_as(as = "DisplayFromStr")]
    pub signature: Signature,
    /// Slot the transaction was processed in.
    pub slot: u64,
}

/// Outcome of a settlement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Tournament.
    pub tournament: String,
    /// Winner.
    pub winner: OwnerId,
    /// Every evaluated portfolio, best first.
    pub leaderboard: Vec<PnlResult>,
    /// Start of the evaluation window.
    pub start_time: i64,
    /// End of the evaluation window.
    pub end_time: i64,
    /// `None` for dry runs.
    pub receipt: Option<TransactionReceipt>,
}
