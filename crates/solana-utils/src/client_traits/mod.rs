pub mod rpc_client;
pub mod rpc_sender;

pub use rpc_client::{
    generic::{GenericRpcClient, GenericRpcClientConfig},
    RpcClient, RpcClientExt,
};
pub use rpc_sender::{RpcSender, RpcTransportStats};

#[cfg(http_rpc_sender)]
pub use rpc_sender::HttpRpcSender;
