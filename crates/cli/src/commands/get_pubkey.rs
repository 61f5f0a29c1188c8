use arena_sdk::solana_sdk::signer::Signer;

/// Get pubkey.
#[derive(Debug, clap::Args)]
pub struct GetPubkey {}

impl super::Command for GetPubkey {
    async fn execute(&self, ctx: super::Context<'_>) -> eyre::Result<()> {
        let authority = ctx.config().wallet()?.pubkey();
        let output = ctx.config().output();
        println!("{}", output.display_pubkey("authority", &authority)?);
        Ok(())
    }
}
