use std::{future::Future, time::Duration};

use arena_solana_utils::{
    client_traits::{GenericRpcClient, GenericRpcClientConfig, HttpRpcSender, RpcClient, RpcClientExt},
    error::custom_program_error,
    solana_rpc_client_api::filter::{Memcmp, RpcFilterType},
};
use backon::{ExponentialBuilder, Retryable};
use solana_sdk::{
    account::Account,
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use tokio::time::Instant;

use crate::{
    accounts::{ProgramAccount, Tournament, UserPortfolio, USER_PORTFOLIO_TOURNAMENT_OFFSET},
    config::LedgerConfig,
    constants::finalize_error,
    ledger::TournamentLedger,
    program::TournamentProgram,
    types::{Portfolio, TransactionReceipt},
};

const SERVICE: &str = "rpc";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A [`TournamentLedger`] reading and writing the tournament program through RPC.
pub struct ProgramLedger<C> {
    client: C,
    program: TournamentProgram,
    authority: Keypair,
    commitment: CommitmentLevel,
    max_retries: usize,
    confirm_timeout: Duration,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl<C> std::fmt::Debug for ProgramLedger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramLedger")
            .field("program", &self.program)
            .field("authority", &self.authority.pubkey())
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl ProgramLedger<GenericRpcClient<HttpRpcSender>> {
    /// Create a ledger from config, signing with `authority`.
    ///
    /// The treasury defaults to the authority.
    pub fn from_config(config: &LedgerConfig, authority: Keypair) -> crate::Result<Self> {
        let sender = HttpRpcSender::new_with_timeout(&config.rpc_url, config.timeout())?;
        let client = GenericRpcClient::new_with_sender_and_config(
            sender,
            GenericRpcClientConfig {
                commitment_config: CommitmentConfig {
                    commitment: config.commitment,
                },
            },
        );
        let program = TournamentProgram::builder()
            .id(config.program_id)
            .treasury(config.treasury.unwrap_or_else(|| authority.pubkey()))
            .build();
        Ok(Self::new(client, program, authority)
            .with_commitment(config.commitment)
            .with_max_retries(config.max_retries)
            .with_confirm_timeout(config.confirm_timeout()))
    }
}

impl<C> ProgramLedger<C> {
    /// Create a new ledger.
    pub fn new(client: C, program: TournamentProgram, authority: Keypair) -> Self {
        Self {
            client,
            program,
            authority,
            commitment: CommitmentLevel::Confirmed,
            max_retries: 3,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Set the commitment a submission must reach.
    pub fn with_commitment(mut self, commitment: CommitmentLevel) -> Self {
        self.commitment = commitment;
        self
    }

    /// Set the retries of transient RPC failures.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the confirmation timeout.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Set the interval between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the first delay of the retry backoff.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Get the RPC client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get the program.
    pub fn program(&self) -> &TournamentProgram {
        &self.program
    }

    /// Get the authority.
    pub fn authority(&self) -> Pubkey {
        self.authority.pubkey()
    }
}

/// Map a program error code of `finalize_tournament` to an [`Error`](crate::Error).
fn program_error(tournament: &Pubkey, code: u32, logs: &[String]) -> crate::Error {
    if code == finalize_error::ALREADY_FINALIZED {
        return crate::Error::AlreadyFinalized {
            tournament: tournament.to_string(),
        };
    }
    let name = finalize_error::name(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("custom program error {code}"));
    let reason = if logs.is_empty() {
        name
    } else {
        format!("{name}, logs: {}", logs.join("; "))
    };
    crate::Error::SettlementRejected {
        tournament: tournament.to_string(),
        reason,
    }
}

fn submission_error(tournament: &Pubkey, err: arena_solana_utils::Error) -> crate::Error {
    if err.is_transient() {
        return crate::Error::upstream(SERVICE, err);
    }
    if let Some(code) = err.custom_program_error() {
        return program_error(tournament, code, &err.logs());
    }
    match err {
        arena_solana_utils::Error::RpcResponse { message, .. } => {
            crate::Error::SettlementRejected {
                tournament: tournament.to_string(),
                reason: message,
            }
        }
        err => err.into(),
    }
}

fn read_error(err: arena_solana_utils::Error) -> crate::Error {
    if err.is_transient() {
        crate::Error::upstream(SERVICE, err)
    } else {
        err.into()
    }
}

impl<C: RpcClient + Sync> ProgramLedger<C> {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_delay)
            .with_max_times(self.max_retries)
    }

    /// Run a read, retrying transient failures.
    async fn read<T, Fut>(&self, op: impl FnMut() -> Fut) -> crate::Result<T>
    where
        Fut: Future<Output = arena_solana_utils::Result<T>>,
    {
        op.retry(self.backoff())
            .when(arena_solana_utils::Error::is_transient)
            .notify(|err, after| {
                tracing::warn!(%err, ?after, "failed to read from rpc, retrying");
            })
            .await
            .map_err(read_error)
    }

    fn decode_tournament(&self, address: &Pubkey, account: Account) -> crate::Result<Tournament> {
        if account.owner != self.program.id {
            return Err(crate::Error::TournamentNotFound {
                tournament: address.to_string(),
            });
        }
        Tournament::decode(&account.data)
    }

    async fn send(
        &self,
        tournament: &Pubkey,
        transaction: &Transaction,
    ) -> crate::Result<Signature> {
        (|| self.client.send_transaction(transaction, false))
            .retry(self.backoff())
            .when(arena_solana_utils::Error::is_transient)
            .notify(|err, after| {
                tracing::warn!(%err, ?after, "failed to send transaction, retrying");
            })
            .await
            .map_err(|err| submission_error(tournament, err))
    }

    /// Poll the status of `signature` until it reaches the ledger commitment.
    ///
    /// Gives up once the block height passes `last_valid_block_height`, since
    /// the transaction can no longer land, or when the confirm timeout elapses.
    async fn confirm(
        &self,
        tournament: &Pubkey,
        signature: &Signature,
        last_valid_block_height: u64,
    ) -> crate::Result<u64> {
        let commitment = self.commitment.to_string();
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self.client.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = &status.err {
                        return Err(match custom_program_error(err) {
                            Some(code) => program_error(tournament, code, &[]),
                            None => crate::Error::SettlementRejected {
                                tournament: tournament.to_string(),
                                reason: err.to_string(),
                            },
                        });
                    }
                    if status.satisfies(&commitment) {
                        return Ok(status.slot);
                    }
                }
                Ok(None) => match self.client.get_block_height().await {
                    Ok(height) if height > last_valid_block_height => {
                        return Err(crate::Error::upstream(
                            SERVICE,
                            format!(
                                "transaction `{signature}` expired, block height {height} \
                                 passed {last_valid_block_height}"
                            ),
                        ));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, %signature, "failed to get block height");
                    }
                },
                Err(err) if err.is_transient() => {
                    tracing::warn!(%err, %signature, "failed to get signature status");
                }
                Err(err) => return Err(err.into()),
            }
            if Instant::now() >= deadline {
                return Err(crate::Error::upstream(
                    SERVICE,
                    format!(
                        "transaction `{signature}` not {commitment} after {:?}",
                        self.confirm_timeout
                    ),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl<C: RpcClient + Sync> TournamentLedger for ProgramLedger<C> {
    fn tournament(&self, address: &Pubkey) -> impl Future<Output = crate::Result<Tournament>> + Send {
        async move {
            let account = self
                .read(|| self.client.get_optional_account_with_slot(address))
                .await?
                .into_value()
                .ok_or_else(|| crate::Error::TournamentNotFound {
                    tournament: address.to_string(),
                })?;
            self.decode_tournament(address, account)
        }
    }

    fn portfolios(
        &self,
        tournament: &Pubkey,
    ) -> impl Future<Output = crate::Result<Vec<Portfolio>>> + Send {
        let filters = vec![
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                0,
                &UserPortfolio::discriminator(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                USER_PORTFOLIO_TOURNAMENT_OFFSET,
                tournament.as_ref(),
            )),
        ];
        async move {
            let accounts = self
                .read(|| {
                    self.client
                        .get_program_accounts_with_slot(&self.program.id, filters.clone())
                })
                .await?
                .into_value();
            let mut portfolios = accounts
                .into_iter()
                .map(|(address, account)| {
                    UserPortfolio::decode(&account.data)
                        .map(Portfolio::from)
                        .inspect_err(|err| tracing::error!(%err, %address, "invalid portfolio"))
                })
                .collect::<crate::Result<Vec<_>>>()?;
            portfolios.sort_by(|a, b| a.owner.cmp(&b.owner));
            Ok(portfolios)
        }
    }

    fn tournaments(&self) -> impl Future<Output = crate::Result<Vec<(Pubkey, Tournament)>>> + Send {
        let filters = vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            0,
            &Tournament::discriminator(),
        ))];
        async move {
            let accounts = self
                .read(|| {
                    self.client
                        .get_program_accounts_with_slot(&self.program.id, filters.clone())
                })
                .await?
                .into_value();
            Ok(accounts
                .into_iter()
                .filter_map(|(address, account)| match Tournament::decode(&account.data) {
                    Ok(tournament) => Some((address, tournament)),
                    Err(err) => {
                        tracing::error!(%err, %address, "invalid tournament account, skipped");
                        None
                    }
                })
                .collect())
        }
    }

    fn finalize(
        &self,
        tournament: &Pubkey,
        winner: &Pubkey,
    ) -> impl Future<Output = crate::Result<TransactionReceipt>> + Send {
        async move {
            let authority = self.authority.pubkey();
            let ix = self.program.finalize_tournament(tournament, &authority, winner);
            let (blockhash, last_valid_block_height) =
                self.read(|| self.client.get_latest_blockhash()).await?;
            let transaction = Transaction::new_signed_with_payer(
                &[ix],
                Some(&authority),
                &[&self.authority],
                blockhash,
            );

            let signature = self.send(tournament, &transaction).await?;
            tracing::info!(%signature, "settlement transaction sent");
            let slot = self
                .confirm(tournament, &signature, last_valid_block_height)
                .await?;
            Ok(TransactionReceipt {
                tournament: *tournament,
                winner: *winner,
                signature,
                slot,
            })
        }
    }
}
