#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! # Arena SDK
//!
//! Settlement of Moon Arena portfolio tournaments: fetch oracle prices at the
//! tournament boundaries, evaluate every registered portfolio, pick the winner
//! and finalize the tournament on-chain.

/// Error type.
pub mod error;

/// Constants.
pub mod constants;

/// Domain types.
pub mod types;

/// PDA derivation.
pub mod pda;

/// Tournament program and its instructions.
pub mod program;

/// On-chain account layouts.
pub mod accounts;

/// Configuration.
pub mod config;

/// Portfolio PnL evaluation.
pub mod pnl;

/// Winner selection.
pub mod winner;

/// Price sources.
pub mod oracle;

/// Ledger access.
pub mod ledger;

/// Settlement pipeline.
pub mod settle;

/// Clients for the price oracle and the ledger.
#[cfg(client)]
pub mod client;

pub use crate::{
    error::{Error, ErrorKind},
    program::TournamentProgram,
    settle::{SettleOptions, Settler},
    types::{
        AssetId, OwnerId, PnlResult, Portfolio, Price, PriceSnapshot, SettlementReport,
        TokenAllocation, TransactionReceipt,
    },
};

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use arena_solana_utils as solana_utils;
pub use solana_sdk;
