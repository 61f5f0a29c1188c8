use crate::config::OutputFormat;

use super::parse_pubkey;

/// Rank the portfolios of a tournament.
#[derive(Debug, clap::Args)]
pub struct Leaderboard {
    /// Tournament address.
    tournament: String,
    /// Output format, defaults to the configured one.
    #[arg(long, short)]
    format: Option<OutputFormat>,
}

impl super::Command for Leaderboard {
    async fn execute(&self, ctx: super::Context<'_>) -> eyre::Result<()> {
        let tournament = parse_pubkey(&self.tournament)?;
        let settler = ctx.settler()?;
        let report = settler.leaderboard(&tournament, None).await?;
        let output = self.format.unwrap_or_else(|| ctx.config().output());
        println!("{}", output.display_report(&report)?);
        Ok(())
    }
}
