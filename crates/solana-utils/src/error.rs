/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parse url error.
    #[error("parse url: {0}")]
    ParseUrl(#[from] url::ParseError),
    /// Signer error.
    #[error("signer: {0}")]
    Signer(#[from] solana_sdk::signer::SignerError),
    /// Custom error.
    #[error("custom: {0}")]
    Custom(String),
    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Bincode error.
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
    /// JSON-RPC error object returned by the node.
    #[error("rpc response error {code}: {message}")]
    RpcResponse {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
        /// Attached data, `Null` if absent.
        data: serde_json::Value,
    },
    /// Reqwest error.
    #[cfg(feature = "reqwest")]
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// Create a custom error.
    pub fn custom(msg: impl ToString) -> Self {
        Self::Custom(msg.to_string())
    }

    /// Returns whether the error comes from the transport and is worth retrying.
    ///
    /// Rate limiting and node-side failures are transient, as are timeouts and
    /// connection failures. Errors reported by the node about the request itself are not.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "reqwest")]
            Self::Reqwest(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.is_request()
                    || err
                        .status()
                        .map(|status| status.is_server_error() || status.as_u16() == 429)
                        .unwrap_or(false)
            }
            Self::RpcResponse { code, .. } => *code == NODE_UNHEALTHY,
            _ => false,
        }
    }

    /// Returns the program-defined error code carried by a failed transaction,
    /// i.e. the `Custom` code of an `InstructionError`.
    pub fn custom_program_error(&self) -> Option<u32> {
        match self {
            Self::RpcResponse { data, .. } => custom_program_error(&data["err"]),
            _ => None,
        }
    }

    /// Returns the program logs attached to a preflight failure.
    pub fn logs(&self) -> Vec<String> {
        match self {
            Self::RpcResponse { data, .. } => data["logs"]
                .as_array()
                .map(|logs| {
                    logs.iter()
                        .filter_map(|log| log.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            _ => vec![],
        }
    }
}

/// JSON-RPC code for an unhealthy node.
pub const NODE_UNHEALTHY: i64 = -32005;

/// Extract the `Custom` code from a JSON encoded `TransactionError`,
/// e.g. `{"InstructionError":[0,{"Custom":6001}]}`.
pub fn custom_program_error(err: &serde_json::Value) -> Option<u32> {
    let code = err.get("InstructionError")?.get(1)?.get("Custom")?.as_u64()?;
    u32::try_from(code).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extract_custom_program_error() {
        let err = Error::RpcResponse {
            code: -32002,
            message: "Transaction simulation failed".to_string(),
            data: json!({
                "err": {"InstructionError": [0, {"Custom": 6001}]},
                "logs": ["Program log: AnchorError occurred", "Program failed"],
            }),
        };
        assert_eq!(err.custom_program_error(), Some(6001));
        assert_eq!(err.logs().len(), 2);
        assert!(!err.is_transient());
    }

    #[test]
    fn non_custom_errors_have_no_code() {
        assert_eq!(custom_program_error(&json!("AccountNotFound")), None);
        assert_eq!(
            custom_program_error(&json!({"InstructionError": [1, "InvalidAccountData"]})),
            None
        );
        assert_eq!(Error::custom("boom").custom_program_error(), None);
    }

    #[test]
    fn unhealthy_node_is_transient() {
        let err = Error::RpcResponse {
            code: NODE_UNHEALTHY,
            message: "Node is behind".to_string(),
            data: serde_json::Value::Null,
        };
        assert!(err.is_transient());
    }
}
