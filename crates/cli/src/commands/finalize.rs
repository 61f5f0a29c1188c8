use arena_sdk::SettleOptions;

use super::parse_pubkey;

/// Settle a tournament.
#[derive(Debug, clap::Args)]
pub struct Finalize {
    /// Tournament address.
    tournament: String,
    /// Select the winner without submitting the settlement.
    #[arg(long)]
    dry_run: bool,
}

impl super::Command for Finalize {
    async fn execute(&self, ctx: super::Context<'_>) -> eyre::Result<()> {
        let tournament = parse_pubkey(&self.tournament)?;
        let settler = ctx.settler()?;
        let options = SettleOptions {
            dry_run: self.dry_run,
            now: None,
        };
        let report = settler.settle(&tournament, options).await?;
        println!("{}", ctx.config().output().display_report(&report)?);
        Ok(())
    }
}
