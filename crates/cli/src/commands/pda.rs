use arena_sdk::TournamentProgram;

use super::parse_pubkey;

/// Derive program addresses.
#[derive(Debug, clap::Args)]
pub struct Pda {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Tournament address.
    Tournament {
        /// Creator of the tournament.
        #[arg(long)]
        creator: String,
        /// Tournament id.
        #[arg(long)]
        id: u64,
    },
    /// Vault holding the entry fees of a tournament.
    Vault {
        /// Tournament address.
        #[arg(long)]
        tournament: String,
    },
    /// Portfolio of a user in a tournament.
    Portfolio {
        /// Tournament address.
        #[arg(long)]
        tournament: String,
        /// User.
        #[arg(long)]
        user: String,
    },
    /// Platform authority.
    Platform,
}

impl super::Command for Pda {
    async fn execute(&self, ctx: super::Context<'_>) -> eyre::Result<()> {
        let config = ctx.config();
        let program = TournamentProgram {
            id: config.ledger.program_id,
            treasury: config.ledger.treasury.unwrap_or_default(),
        };
        let (label, address) = match &self.command {
            Command::Tournament { creator, id } => (
                "tournament",
                program.find_tournament_address(&parse_pubkey(creator)?, *id),
            ),
            Command::Vault { tournament } => (
                "vault",
                program.find_vault_address(&parse_pubkey(tournament)?),
            ),
            Command::Portfolio { tournament, user } => (
                "portfolio",
                program.find_user_portfolio_address(
                    &parse_pubkey(tournament)?,
                    &parse_pubkey(user)?,
                ),
            ),
            Command::Platform => ("platform", program.find_platform_authority_address()),
        };
        println!("{}", config.output().display_pubkey(label, &address)?);
        Ok(())
    }
}
