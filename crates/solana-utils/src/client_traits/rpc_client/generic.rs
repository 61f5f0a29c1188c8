//! Generic RPC client implementation.

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use solana_rpc_client_api::request::RpcRequest;
use solana_sdk::commitment_config::CommitmentConfig;

use crate::client_traits::RpcSender;

use super::RpcClient;

/// Generic RPC client configuration.
#[derive(Debug, Default, Clone)]
pub struct GenericRpcClientConfig {
    /// Commitment level for RPC queries. See [`CommitmentConfig`].
    pub commitment_config: CommitmentConfig,
}

/// Generic RPC client implementation.
#[derive(Debug, Clone)]
pub struct GenericRpcClient<S> {
    sender: S,
    config: GenericRpcClientConfig,
}

impl<S> GenericRpcClient<S> {
    /// Create a RPC client with sender and config.
    pub fn new_with_sender_and_config(sender: S, config: GenericRpcClientConfig) -> Self {
        Self { sender, config }
    }

    /// Get the underlying sender.
    pub fn sender(&self) -> &S {
        &self.sender
    }
}

impl<S: RpcSender + Sync> RpcClient for GenericRpcClient<S> {
    /// Returns the configured default commitment level.
    fn commitment(&self) -> CommitmentConfig {
        self.config.commitment_config
    }

    /// Send an [`RpcRequest`] with parameters.
    fn send<T>(
        &self,
        request: RpcRequest,
        params: impl Serialize,
    ) -> impl Future<Output = crate::Result<T>> + Send
    where
        T: DeserializeOwned,
    {
        let params = serde_json::to_value(params);
        async move {
            let params = params?;
            if !params.is_array() && !params.is_null() {
                return Err(crate::Error::custom(
                    "`params` is neither an array nor null",
                ));
            }

            let response = self.sender.send(request, params).await?;
            Ok(serde_json::from_value(response)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};
    use solana_sdk::pubkey::Pubkey;

    use super::*;
    use crate::client_traits::{RpcClientExt, RpcTransportStats};

    #[derive(Default)]
    struct RecordingSender {
        requests: Mutex<Vec<(RpcRequest, Value)>>,
        response: Value,
    }

    impl RpcSender for RecordingSender {
        fn send(
            &self,
            request: RpcRequest,
            params: Value,
        ) -> impl Future<Output = crate::Result<Value>> + Send {
            self.requests.lock().unwrap().push((request, params));
            std::future::ready(Ok(self.response.clone()))
        }

        fn get_transport_stats(&self) -> RpcTransportStats {
            RpcTransportStats::default()
        }

        fn url(&self) -> String {
            "mock".to_string()
        }
    }

    #[tokio::test]
    async fn params_must_be_an_array() {
        let client = GenericRpcClient::new_with_sender_and_config(
            RecordingSender::default(),
            GenericRpcClientConfig::default(),
        );
        let err = client
            .send::<Value>(RpcRequest::GetHealth, json!({ "a": 1 }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("neither an array nor null"));
        assert!(client.sender().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_account() {
        let sender = RecordingSender {
            response: json!({ "context": { "slot": 3 }, "value": null }),
            ..Default::default()
        };
        let client = GenericRpcClient::new_with_sender_and_config(
            sender,
            GenericRpcClientConfig {
                commitment_config: CommitmentConfig::finalized(),
            },
        );
        let address = Pubkey::new_unique();
        let account = client
            .get_optional_account_with_slot(&address)
            .await
            .unwrap();
        assert_eq!(account.slot(), 3);
        assert!(account.value().is_none());

        let requests = client.sender().requests.lock().unwrap();
        assert_eq!(requests[0].0, RpcRequest::GetAccountInfo);
        assert_eq!(requests[0].1[0], address.to_string());
        assert_eq!(requests[0].1[1]["commitment"], "finalized");
    }

    #[tokio::test]
    async fn block_height_uses_client_commitment() {
        let sender = RecordingSender {
            response: json!(1234),
            ..Default::default()
        };
        let client = GenericRpcClient::new_with_sender_and_config(
            sender,
            GenericRpcClientConfig {
                commitment_config: CommitmentConfig::confirmed(),
            },
        );
        assert_eq!(client.get_block_height().await.unwrap(), 1234);

        let requests = client.sender().requests.lock().unwrap();
        assert_eq!(requests[0].0, RpcRequest::GetBlockHeight);
        assert_eq!(requests[0].1, json!([{ "commitment": "confirmed" }]));
    }
}
