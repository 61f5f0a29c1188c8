use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

use futures_util::future::try_join;
use solana_sdk::pubkey::Pubkey;
use time::OffsetDateTime;
use tracing::Instrument;

use crate::{
    ledger::TournamentLedger,
    oracle::PriceSource,
    pnl::{compute_pnl, validate_allocations},
    types::{AssetId, PnlResult, Portfolio, SettlementReport},
    winner::{rank, select_winner},
    ErrorKind,
};

/// Options of a settlement run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettleOptions {
    /// Evaluate and select the winner without submitting.
    pub dry_run: bool,
    /// Override the current unix timestamp.
    pub now: Option<i64>,
}

impl SettleOptions {
    /// Options of a dry run.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            now: None,
        }
    }

    fn now(&self) -> i64 {
        self.now
            .unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp())
    }
}

/// State of a tournament known to this settler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// A settlement is running.
    Settling,
    /// A submission for this winner may have landed.
    Pinned(Pubkey),
}

type Marks = Arc<Mutex<HashMap<Pubkey, Mark>>>;

/// Marks a tournament as being settled by this process.
///
/// On drop the tournament is left pinned to `pinned`, or unmarked if there
/// is no pin.
struct SettlementGuard {
    marks: Marks,
    tournament: Pubkey,
    pinned: Option<Pubkey>,
}

impl SettlementGuard {
    fn acquire(marks: &Marks, tournament: &Pubkey) -> crate::Result<Self> {
        let mut map = marks.lock().unwrap_or_else(PoisonError::into_inner);
        let pinned = match map.insert(*tournament, Mark::Settling) {
            Some(Mark::Settling) => {
                return Err(crate::Error::AlreadyFinalized {
                    tournament: tournament.to_string(),
                });
            }
            Some(Mark::Pinned(winner)) => Some(winner),
            None => None,
        };
        Ok(Self {
            marks: marks.clone(),
            tournament: *tournament,
            pinned,
        })
    }

    /// Winner of an earlier submission with an unknown outcome.
    fn pinned(&self) -> Option<&Pubkey> {
        self.pinned.as_ref()
    }

    /// Resubmit only `winner` until the outcome is known.
    fn pin(mut self, winner: Pubkey) {
        self.pinned = Some(winner);
    }

    /// The outcome is known, forget the tournament.
    fn release(mut self) {
        self.pinned = None;
    }
}

impl Drop for SettlementGuard {
    fn drop(&mut self) {
        let mut map = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        match self.pinned {
            Some(winner) => {
                map.insert(self.tournament, Mark::Pinned(winner));
            }
            None => {
                map.remove(&self.tournament);
            }
        }
    }
}

/// Settles tournaments: evaluates every portfolio between the tournament
/// boundaries and finalizes the tournament with the best one.
#[derive(Debug)]
pub struct Settler<L, P> {
    ledger: L,
    prices: P,
    marks: Marks,
}

impl<L, P> Settler<L, P> {
    /// Create a new settler.
    pub fn new(ledger: L, prices: P) -> Self {
        Self {
            ledger,
            prices,
            marks: Default::default(),
        }
    }

    /// Get the ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<L, P> Settler<L, P>
where
    L: TournamentLedger + Sync,
    P: PriceSource + Sync,
{
    /// Settle a tournament.
    ///
    /// # Errors
    /// - [`AlreadyFinalized`](crate::Error::AlreadyFinalized) if the tournament
    ///   is finalized, or being settled by this settler.
    ///
    /// When a submission ends with an unknown outcome, the winner is pinned:
    /// later settlements of the tournament by this settler submit the same
    /// winner even if fresh prices would rank another portfolio first.
    /// - [`TournamentNotEnded`](crate::Error::TournamentNotEnded) if `now` is
    ///   not past the end time.
    /// - [`NoParticipants`](crate::Error::NoParticipants) or
    ///   [`InvalidAllocation`](crate::Error::InvalidAllocation) for unusable
    ///   portfolios.
    /// - Price and ledger errors are passed through.
    pub async fn settle(
        &self,
        tournament: &Pubkey,
        options: SettleOptions,
    ) -> crate::Result<SettlementReport> {
        let span = tracing::info_span!("settle", %tournament, dry_run = options.dry_run);
        self.settle_inner(tournament, options).instrument(span).await
    }

    async fn settle_inner(
        &self,
        tournament: &Pubkey,
        options: SettleOptions,
    ) -> crate::Result<SettlementReport> {
        let guard = if options.dry_run {
            None
        } else {
            Some(SettlementGuard::acquire(&self.marks, tournament)?)
        };

        let account = self.ledger.tournament(tournament).await?;
        if account.is_finalized {
            if let Some(guard) = guard {
                guard.release();
            }
            return Err(crate::Error::AlreadyFinalized {
                tournament: tournament.to_string(),
            });
        }
        let now = options.now();
        let end_time = account.end_timestamp();
        if now <= end_time {
            return Err(crate::Error::TournamentNotEnded {
                tournament: tournament.to_string(),
                end_time,
            });
        }

        let mut report = self
            .evaluate(tournament, account.start_timestamp(), end_time)
            .await?;
        tracing::info!(winner = %report.winner, participants = report.leaderboard.len(), "winner selected");

        let Some(guard) = guard else {
            return Ok(report);
        };

        let winner = match guard.pinned() {
            Some(pinned) => {
                if pinned.to_string() != report.winner {
                    tracing::warn!(
                        %pinned,
                        selected = %report.winner,
                        "winner changed since an unconfirmed submission, resubmitting the pinned one"
                    );
                    report.winner = pinned.to_string();
                }
                *pinned
            }
            None => Pubkey::from_str(&report.winner).map_err(crate::Error::custom)?,
        };
        let receipt = match self.ledger.finalize(tournament, &winner).await {
            Ok(receipt) => receipt,
            Err(err) => {
                match err.kind() {
                    ErrorKind::UpstreamUnavailable => guard.pin(winner),
                    ErrorKind::AlreadyFinalized => guard.release(),
                    _ => {}
                }
                return Err(err);
            }
        };
        guard.release();
        tracing::info!(signature = %receipt.signature, slot = receipt.slot, "tournament finalized");
        report.receipt = Some(receipt);
        Ok(report)
    }

    /// Rank the portfolios of a tournament without submitting anything.
    ///
    /// Evaluates up to `now`, or the end time if the tournament has ended.
    pub async fn leaderboard(
        &self,
        tournament: &Pubkey,
        now: Option<i64>,
    ) -> crate::Result<SettlementReport> {
        let span = tracing::info_span!("leaderboard", %tournament);
        async move {
            let account = self.ledger.tournament(tournament).await?;
            let now = SettleOptions { dry_run: true, now }.now();
            self.evaluate(tournament, account.start_timestamp(), now.min(account.end_timestamp()))
                .await
        }
        .instrument(span)
        .await
    }

    async fn evaluate(
        &self,
        tournament: &Pubkey,
        start_time: i64,
        end_time: i64,
    ) -> crate::Result<SettlementReport> {
        let portfolios = self.ledger.portfolios(tournament).await?;
        if portfolios.is_empty() {
            return Err(crate::Error::NoParticipants {
                tournament: Some(tournament.to_string()),
            });
        }
        for portfolio in &portfolios {
            validate_allocations(portfolio)?;
        }

        let assets = portfolios
            .iter()
            .flat_map(Portfolio::assets)
            .cloned()
            .collect::<BTreeSet<AssetId>>();
        tracing::debug!(
            portfolios = portfolios.len(),
            assets = assets.len(),
            start_time,
            end_time,
            "fetching prices"
        );
        let (start, end) = try_join(
            self.prices.fetch_prices(&assets, start_time),
            self.prices.fetch_prices(&assets, end_time),
        )
        .await?;

        let results = portfolios
            .iter()
            .map(|portfolio| {
                let pnl = compute_pnl(portfolio, &start, &end)?;
                tracing::debug!(owner = %portfolio.owner, pnl, "evaluated");
                Ok(PnlResult::new(portfolio.owner.clone(), pnl))
            })
            .collect::<crate::Result<Vec<_>>>()?;

        let winner = select_winner(&results).map_err(|err| match err {
            crate::Error::NoParticipants { .. } => crate::Error::NoParticipants {
                tournament: Some(tournament.to_string()),
            },
            err => err,
        })?;

        Ok(SettlementReport {
            tournament: tournament.to_string(),
            winner,
            leaderboard: rank(results),
            start_time,
            end_time,
            receipt: None,
        })
    }
}
