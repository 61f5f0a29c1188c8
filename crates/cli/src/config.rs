use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use arena_sdk::{
    config::{LedgerConfig, OracleConfig},
    solana_sdk::signature::{read_keypair_file, Keypair},
};
use etcetera::BaseStrategy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "ARENA_";
const DEFAULT_WALLET: &str = "~/.config/solana/id.json";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OutputFormat {
    /// Table.
    #[default]
    Table,
    /// JSON.
    Json,
}

/// HTTP server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ServerConfig {
    pub(crate) bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_wallet")]
    wallet: String,
    #[serde(default)]
    output: OutputFormat,
    /// JSON price history replacing Hermes, for offline replays.
    #[serde(default)]
    replay: Option<String>,
    #[serde(default)]
    pub(crate) ledger: LedgerConfig,
    #[serde(default)]
    pub(crate) oracle: OracleConfig,
    #[serde(default)]
    pub(crate) server: ServerConfig,
}

fn default_wallet() -> String {
    DEFAULT_WALLET.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallet: default_wallet(),
            output: OutputFormat::default(),
            replay: None,
            ledger: LedgerConfig::default(),
            oracle: OracleConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Default config path, `$CONFIG_DIR/arena/config.toml`.
    pub(crate) fn default_path() -> eyre::Result<PathBuf> {
        let strategy = etcetera::choose_base_strategy()?;
        Ok(strategy.config_dir().join("arena").join("config.toml"))
    }

    /// Load config from defaults, then the TOML file at `path` if it exists,
    /// then `ARENA_` environment variables.
    pub(crate) fn load(path: &Path) -> eyre::Result<Self> {
        Ok(Self::figment(path).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub(crate) fn output(&self) -> OutputFormat {
        self.output
    }

    pub(crate) fn replay(&self) -> eyre::Result<Option<PathBuf>> {
        self.replay
            .as_deref()
            .map(|path| Ok(PathBuf::from(shellexpand::full(path)?.into_owned())))
            .transpose()
    }

    pub(crate) fn wallet_path(&self) -> eyre::Result<PathBuf> {
        Ok(PathBuf::from(shellexpand::full(&self.wallet)?.into_owned()))
    }

    /// Read the authority keypair.
    pub(crate) fn wallet(&self) -> eyre::Result<Keypair> {
        let path = self.wallet_path()?;
        read_keypair_file(&path)
            .map_err(|err| eyre::eyre!("failed to read keypair `{}`: {err}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use arena_sdk::solana_sdk::commitment_config::CommitmentLevel;
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults() {
        Jail::expect_with(|jail| {
            let config = Config::load(&jail.directory().join("missing.toml")).unwrap();
            assert_eq!(config.ledger.rpc_url, "http://localhost:8899");
            assert_eq!(config.ledger.commitment, CommitmentLevel::Confirmed);
            assert_eq!(config.oracle.hermes_url, "https://hermes.pyth.network");
            assert_eq!(config.oracle.timeout, 15);
            assert_eq!(config.oracle.max_retries, 3);
            assert_eq!(config.ledger.confirm_timeout, 60);
            assert_eq!(config.server.bind.to_string(), "127.0.0.1:3000");
            assert_eq!(config.output(), OutputFormat::Table);
            Ok(())
        });
    }

    #[test]
    fn file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                wallet = "/tmp/authority.json"
                output = "json"

                [ledger]
                rpc_url = "http://file:8899"
                commitment = "finalized"

                [oracle]
                max_retries = 5

                [oracle.feeds]
                SOL = "0xEF0D8B6FDA2CEBA41DA15D4095D1DA392A0D2F8ED0C6C7BC0F4CFAC8C280B56D"
                "#,
            )?;
            jail.set_env("ARENA_LEDGER__RPC_URL", "http://env:8899");
            jail.set_env("ARENA_SERVER__BIND", "0.0.0.0:8080");

            let config = Config::load(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(config.ledger.rpc_url, "http://env:8899");
            assert_eq!(config.ledger.commitment, CommitmentLevel::Finalized);
            assert_eq!(config.oracle.max_retries, 5);
            assert_eq!(
                config.oracle.feeds["SOL"].as_str(),
                "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"
            );
            assert_eq!(config.server.bind.port(), 8080);
            assert_eq!(config.output(), OutputFormat::Json);
            assert_eq!(
                config.wallet_path().unwrap(),
                PathBuf::from("/tmp/authority.json")
            );
            Ok(())
        });
    }
}
