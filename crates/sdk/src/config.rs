use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_sdk::{commitment_config::CommitmentLevel, pubkey::Pubkey};

use crate::{constants::PROGRAM_ID, oracle::FeedId, types::AssetId};

/// Default Hermes endpoint.
pub const DEFAULT_HERMES_URL: &str = "https://hermes.pyth.network";

/// Default RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "http://localhost:8899";

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_PUBLISH_DELAY_SECS: u64 = 60;

fn default_hermes_url() -> String {
    DEFAULT_HERMES_URL.to_string()
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_confirm_timeout() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT_SECS
}

fn default_max_publish_delay() -> u64 {
    DEFAULT_MAX_PUBLISH_DELAY_SECS
}

fn default_program_id() -> Pubkey {
    PROGRAM_ID
}

fn default_commitment() -> CommitmentLevel {
    CommitmentLevel::Confirmed
}

/// Price oracle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Hermes base URL.
    #[serde(default = "default_hermes_url")]
    pub hermes_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Retries of transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Latest accepted publish time of a price, in seconds after the
    /// requested timestamp. Later prices leave the asset unscored.
    #[serde(default = "default_max_publish_delay")]
    pub max_publish_delay: u64,
    /// Pyth price feed of each asset.
    #[serde(default)]
    pub feeds: BTreeMap<AssetId, FeedId>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            hermes_url: default_hermes_url(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            max_publish_delay: default_max_publish_delay(),
            feeds: BTreeMap::default(),
        }
    }
}

impl OracleConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Ledger configuration.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// RPC URL.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Tournament program ID.
    #[serde(default = "default_program_id")]
    #[serde_as(as = "DisplayFromStr")]
    pub program_id: Pubkey,
    /// Platform treasury. Defaults to the authority wallet.
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub treasury: Option<Pubkey>,
    /// Commitment of reads and confirmation.
    #[serde(default = "default_commitment")]
    pub commitment: CommitmentLevel,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Retries of transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Confirmation timeout in seconds.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            program_id: default_program_id(),
            treasury: None,
            commitment: default_commitment(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            confirm_timeout: default_confirm_timeout(),
        }
    }
}

impl LedgerConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Confirmation timeout.
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout)
    }
}
