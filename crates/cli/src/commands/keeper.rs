use std::time::Duration;

use arena_sdk::{
    ledger::TournamentLedger, solana_utils::client_traits::RpcSender, ErrorKind, SettleOptions,
};
use time::OffsetDateTime;

use super::AppSettler;

/// Periodically settle every ended tournament.
#[derive(Debug, clap::Args)]
pub struct Keeper {
    /// Interval between runs.
    #[arg(long, default_value = "1h")]
    interval: humantime::Duration,
}

impl super::Command for Keeper {
    async fn execute(&self, ctx: super::Context<'_>) -> eyre::Result<()> {
        let settler = ctx.settler()?;
        let period: Duration = self.interval.into();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval = %self.interval, "keeper started");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                res = tokio::signal::ctrl_c() => {
                    res?;
                    tracing::info!("keeper stopped");
                    return Ok(());
                }
            }
            if let Err(err) = run_once(&settler).await {
                tracing::error!(%err, "failed to list tournaments");
            }
        }
    }
}

/// Settle every tournament that has ended and is not finalized.
async fn run_once(settler: &AppSettler) -> eyre::Result<()> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let tournaments = settler.ledger().tournaments().await?;
    let pending = tournaments
        .into_iter()
        .filter(|(_, tournament)| !tournament.is_finalized && tournament.end_timestamp() < now)
        .collect::<Vec<_>>();
    tracing::info!(pending = pending.len(), "settling ended tournaments");

    for (address, _) in pending {
        let options = SettleOptions {
            dry_run: false,
            now: Some(now),
        };
        match settler.settle(&address, options).await {
            Ok(report) => {
                tracing::info!(tournament = %address, winner = %report.winner, "settled");
            }
            Err(err) if matches!(err.kind(), ErrorKind::AlreadyFinalized) => {
                tracing::debug!(tournament = %address, "already finalized");
            }
            Err(err) => {
                tracing::error!(tournament = %address, kind = %err.kind(), %err, "failed to settle");
            }
        }
    }

    let stats = settler.ledger().client().sender().get_transport_stats();
    tracing::debug!(
        requests = stats.request_count,
        elapsed = ?stats.elapsed_time,
        rate_limited = ?stats.rate_limited_time,
        "rpc transport stats"
    );
    Ok(())
}
