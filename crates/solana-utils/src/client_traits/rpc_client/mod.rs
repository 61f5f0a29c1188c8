//! RPC client traits.

use std::{future::Future, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use solana_account_decoder_client_types::UiAccount;
use solana_rpc_client_api::{
    filter,
    request::RpcRequest,
    response::{self, Response},
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::Transaction,
};

use crate::utils::{SignatureStatus, WithSlot};

pub mod generic;

/// A RPC client.
pub trait RpcClient {
    /// Returns the configured default commitment level.
    fn commitment(&self) -> CommitmentConfig;

    /// Send an [`RpcRequest`] with parameters.
    fn send<T>(
        &self,
        request: RpcRequest,
        params: impl Serialize,
    ) -> impl Future<Output = crate::Result<T>> + Send
    where
        T: DeserializeOwned;
}

/// A trait that extends [`RpcClient`] with RPC methods.
pub trait RpcClientExt: RpcClient + Sync {
    /// Get account info for `pubkey`, including the context slot.
    /// Returns `None` if the account does not exist.
    fn get_optional_account_with_slot<'a>(
        &'a self,
        address: &'a Pubkey,
    ) -> impl Future<Output = crate::Result<WithSlot<Option<Account>>>> + Send + 'a {
        let config = json!({
            "encoding": "base64",
            "commitment": self.commitment().commitment,
        });
        tracing::trace!(%address, %config, "fetching account with config");
        async move {
            let res = self
                .send::<Response<Option<UiAccount>>>(
                    RpcRequest::GetAccountInfo,
                    json!([address.to_string(), config]),
                )
                .await?;
            Ok(WithSlot::new(res.context.slot, res.value)
                .map(|value| value.and_then(|a| a.decode())))
        }
    }

    /// Get program accounts matching all `filters`, including the context slot.
    fn get_program_accounts_with_slot<'a>(
        &'a self,
        program: &'a Pubkey,
        filters: Vec<filter::RpcFilterType>,
    ) -> impl Future<Output = crate::Result<WithSlot<Vec<(Pubkey, Account)>>>> + Send + 'a {
        let config = json!({
            "encoding": "base64",
            "commitment": self.commitment().commitment,
            "filters": filters,
            "withContext": true,
        });
        tracing::trace!(%program, %config, "fetching program accounts");
        async move {
            let res = self
                .send::<Response<Vec<response::RpcKeyedAccount>>>(
                    RpcRequest::GetProgramAccounts,
                    json!([program.to_string(), config]),
                )
                .await?;
            WithSlot::new(res.context.slot, res.value)
                .map(parse_keyed_accounts)
                .transpose()
        }
    }

    /// Get the latest blockhash and the last block height it is valid for.
    fn get_latest_blockhash(&self) -> impl Future<Output = crate::Result<(Hash, u64)>> + Send {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LatestBlockhash {
            blockhash: String,
            last_valid_block_height: u64,
        }

        let config = json!({ "commitment": self.commitment().commitment });
        async move {
            let res = self
                .send::<Response<LatestBlockhash>>(RpcRequest::GetLatestBlockhash, json!([config]))
                .await?;
            let hash = Hash::from_str(&res.value.blockhash).map_err(crate::Error::custom)?;
            Ok((hash, res.value.last_valid_block_height))
        }
    }

    /// Get the current block height.
    fn get_block_height(&self) -> impl Future<Output = crate::Result<u64>> + Send {
        let config = json!({ "commitment": self.commitment().commitment });
        async move { self.send(RpcRequest::GetBlockHeight, json!([config])).await }
    }

    /// Submit a signed transaction. Preflight simulation is run at the
    /// client commitment unless `skip_preflight` is set.
    fn send_transaction<'a>(
        &'a self,
        transaction: &'a Transaction,
        skip_preflight: bool,
    ) -> impl Future<Output = crate::Result<Signature>> + Send + 'a {
        let encoded = bincode::serialize(transaction).map(|bytes| STANDARD.encode(bytes));
        let config = json!({
            "encoding": "base64",
            "skipPreflight": skip_preflight,
            "preflightCommitment": self.commitment().commitment,
        });
        async move {
            let encoded = encoded?;
            let signature = self
                .send::<String>(RpcRequest::SendTransaction, json!([encoded, config]))
                .await?;
            Signature::from_str(&signature).map_err(crate::Error::custom)
        }
    }

    /// Get the status of a transaction, `None` if the node has not seen it.
    fn get_signature_status<'a>(
        &'a self,
        signature: &'a Signature,
    ) -> impl Future<Output = crate::Result<Option<SignatureStatus>>> + Send + 'a {
        async move {
            let res = self
                .send::<Response<Vec<Option<SignatureStatus>>>>(
                    RpcRequest::GetSignatureStatuses,
                    json!([[signature.to_string()], { "searchTransactionHistory": true }]),
                )
                .await?;
            Ok(res.value.into_iter().next().flatten())
        }
    }
}

impl<C: RpcClient + Sync + ?Sized> RpcClientExt for C {}

fn parse_keyed_accounts(
    accounts: Vec<response::RpcKeyedAccount>,
) -> crate::Result<Vec<(Pubkey, Account)>> {
    let mut pubkey_accounts: Vec<(Pubkey, Account)> = Vec::with_capacity(accounts.len());
    for response::RpcKeyedAccount { pubkey, account } in accounts.into_iter() {
        let pubkey = pubkey
            .parse()
            .map_err(|_| crate::Error::custom(format!("invalid pubkey `{pubkey}` from rpc")))?;
        let account = account
            .decode()
            .ok_or_else(|| crate::Error::custom(format!("undecodable account `{pubkey}`")))?;
        pubkey_accounts.push((pubkey, account));
    }
    Ok(pubkey_accounts)
}
