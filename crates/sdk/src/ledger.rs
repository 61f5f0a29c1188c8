use std::{future::Future, sync::Arc};

use solana_sdk::pubkey::Pubkey;

use crate::{accounts::Tournament, types::Portfolio, TransactionReceipt};

/// Access to the tournament program state.
pub trait TournamentLedger {
    /// Read a tournament.
    ///
    /// Fails with [`Error::TournamentNotFound`](crate::Error::TournamentNotFound)
    /// if there is no tournament at `address`.
    fn tournament(&self, address: &Pubkey) -> impl Future<Output = crate::Result<Tournament>> + Send;

    /// Read the portfolios registered in a tournament, sorted by owner.
    fn portfolios(
        &self,
        tournament: &Pubkey,
    ) -> impl Future<Output = crate::Result<Vec<Portfolio>>> + Send;

    /// List every tournament.
    fn tournaments(&self) -> impl Future<Output = crate::Result<Vec<(Pubkey, Tournament)>>> + Send;

    /// Finalize a tournament, paying the prize pool out to `winner`.
    ///
    /// This is the only operation with side effects.
    fn finalize(
        &self,
        tournament: &Pubkey,
        winner: &Pubkey,
    ) -> impl Future<Output = crate::Result<TransactionReceipt>> + Send;
}

impl<L: TournamentLedger + Sync + Send> TournamentLedger for Arc<L> {
    fn tournament(&self, address: &Pubkey) -> impl Future<Output = crate::Result<Tournament>> + Send {
        (**self).tournament(address)
    }

    fn portfolios(
        &self,
        tournament: &Pubkey,
    ) -> impl Future<Output = crate::Result<Vec<Portfolio>>> + Send {
        (**self).portfolios(tournament)
    }

    fn tournaments(&self) -> impl Future<Output = crate::Result<Vec<(Pubkey, Tournament)>>> + Send {
        (**self).tournaments()
    }

    fn finalize(
        &self,
        tournament: &Pubkey,
        winner: &Pubkey,
    ) -> impl Future<Output = crate::Result<TransactionReceipt>> + Send {
        (**self).finalize(tournament, winner)
    }
}
