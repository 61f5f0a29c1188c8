use std::{collections::BTreeSet, future::Future, path::Path};

use arena_sdk::{
    client::{HermesClient, ProgramLedger},
    oracle::{PriceSource, StaticPriceSource},
    solana_sdk::pubkey::Pubkey,
    solana_utils::client_traits::{GenericRpcClient, HttpRpcSender},
    AssetId, PriceSnapshot, SettlementReport, Settler,
};
use enum_dispatch::enum_dispatch;
use finalize::Finalize;
use get_pubkey::GetPubkey;
use keeper::Keeper;
use leaderboard::Leaderboard;
use pda::Pda;
use prettytable::{format::consts::FORMAT_CLEAN, row, Table};
use serve::Serve;

use crate::config::{Config, OutputFormat};

mod finalize;
mod get_pubkey;
mod keeper;
mod leaderboard;
mod pda;
mod serve;

/// Commands.
#[enum_dispatch(Command)]
#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Get pubkey of the authority.
    Pubkey(GetPubkey),
    /// Derive program addresses.
    Pda(Pda),
    /// Rank the portfolios of a tournament without submitting.
    Leaderboard(Leaderboard),
    /// Settle a tournament.
    Finalize(Finalize),
    /// Serve the HTTP control surface.
    Serve(Serve),
    /// Periodically settle every ended tournament.
    Keeper(Keeper),
}

#[enum_dispatch]
pub(crate) trait Command {
    async fn execute(&self, ctx: Context<'_>) -> eyre::Result<()>;
}

pub(crate) struct Context<'a> {
    config_path: &'a Path,
    config: &'a Config,
    _verbose: bool,
}

impl<'a> Context<'a> {
    pub(super) fn new(config_path: &'a Path, config: &'a Config, verbose: bool) -> Self {
        Self {
            config_path,
            config,
            _verbose: verbose,
        }
    }

    pub(crate) fn config(&self) -> &Config {
        self.config
    }

    /// Build the settler from config.
    pub(crate) fn settler(&self) -> eyre::Result<AppSettler> {
        tracing::debug!(config = %self.config_path.display(), "building settler");
        let ledger = ProgramLedger::from_config(&self.config.ledger, self.config.wallet()?)?;
        let prices = match self.config.replay()? {
            Some(path) => {
                tracing::info!(path = %path.display(), "replaying prices from file");
                let history = std::fs::read_to_string(&path)?;
                Prices::Replay(serde_json::from_str(&history)?)
            }
            None => Prices::Hermes(HermesClient::try_new(&self.config.oracle)?),
        };
        Ok(Settler::new(ledger, prices))
    }
}

pub(crate) type AppLedger = ProgramLedger<GenericRpcClient<HttpRpcSender>>;

pub(crate) type AppSettler = Settler<AppLedger, Prices>;

/// Configured price source.
#[derive(Debug)]
pub(crate) enum Prices {
    Hermes(HermesClient),
    Replay(StaticPriceSource),
}

impl PriceSource for Prices {
    fn fetch_prices(
        &self,
        assets: &BTreeSet<AssetId>,
        timestamp: i64,
    ) -> impl Future<Output = arena_sdk::Result<PriceSnapshot>> + Send {
        async move {
            match self {
                Self::Hermes(client) => client.fetch_prices(assets, timestamp).await,
                Self::Replay(source) => source.fetch_prices(assets, timestamp).await,
            }
        }
    }
}

pub(crate) fn parse_pubkey(value: &str) -> eyre::Result<Pubkey> {
    value
        .parse()
        .map_err(|err| eyre::eyre!("invalid address `{value}`: {err}"))
}

impl OutputFormat {
    pub(crate) fn display_pubkey(&self, label: &str, pubkey: &Pubkey) -> eyre::Result<String> {
        match self {
            Self::Table => Ok(pubkey.to_string()),
            Self::Json => {
                let mut map = serde_json::Map::new();
                map.insert(label.to_string(), pubkey.to_string().into());
                Ok(serde_json::to_string_pretty(&map)?)
            }
        }
    }

    pub(crate) fn display_report(&self, report: &SettlementReport) -> eyre::Result<String> {
        match self {
            Self::Table => {
                let mut table = Table::new();
                table.set_format(*FORMAT_CLEAN);
                table.set_titles(row!["#", "Owner", "PnL"]);
                for (idx, result) in report.leaderboard.iter().enumerate() {
                    table.add_row(row![
                        idx + 1,
                        result.owner,
                        format!("{:+.4}%", result.pnl * 100.0),
                    ]);
                }
                let mut output = format!(
                    "Tournament: {}\nWindow: {} - {}\nWinner: {}\n",
                    report.tournament, report.start_time, report.end_time, report.winner,
                );
                if let Some(receipt) = &report.receipt {
                    output.push_str(&format!(
                        "Signature: {} (slot {})\n",
                        receipt.signature, receipt.slot
                    ));
                }
                output.push('\n');
                output.push_str(&table.to_string());
                Ok(output)
            }
            Self::Json => Ok(serde_json::to_string_pretty(report)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use arena_sdk::PnlResult;

    use super::*;

    #[test]
    fn display_report() {
        let report = SettlementReport {
            tournament: "T".to_string(),
            winner: "B".to_string(),
            leaderboard: vec![PnlResult::new("B", 0.12), PnlResult::new("A", -0.03)],
            start_time: 1,
            end_time: 2,
            receipt: None,
        };
        let table = OutputFormat::Table.display_report(&report).unwrap();
        assert!(table.contains("Winner: B"));
        assert!(table.contains("+12.0000%"));
        assert!(table.contains("-3.0000%"));
        assert!(!table.contains("Signature"));

        let json = OutputFormat::Json.display_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["leaderboard"][0]["owner"], "B");
    }
}
