//! noderpc: resilient multi-node RPC client for Steem-style blockchains.
//!
//! Pick endpoints, connect, call:
//!
//! ```no_run
//! # async fn run() -> Result<(), noderpc::RpcError> {
//! use noderpc::{public, CallOptions, ClientConfig};
//!
//! let rpc = noderpc::connect(public::HTTP_NODES, ClientConfig::default()).await?;
//! let props = rpc.get_dynamic_global_properties().await?;
//! let block = rpc.call("get_block", vec![serde_json::json!({"block_num": 1})], CallOptions::api("block")).await?;
//! # let _ = (props, block);
//! # Ok(())
//! # }
//! ```
//!
//! `ws://`/`wss://` URLs use the persistent transport from `noderpc-ws`; any
//! other scheme uses the stateless transport from `noderpc-http`.

pub mod connector;
pub mod public;

use std::sync::Arc;

pub use connector::DefaultConnector;
pub use noderpc_core::*;
pub use noderpc_http::HttpTransport;
pub use noderpc_ws::WsTransport;

/// Build a client over `urls` with the default transports.
pub async fn connect<I, S>(urls: I, config: ClientConfig) -> Result<NodeRpc, RpcError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    NodeRpc::new(EndpointPool::new(urls), config, Arc::new(DefaultConnector)).await
}

/// Like [`connect`], from one `,`/`;`-separated string.
pub async fn connect_str(urls: &str, config: ClientConfig) -> Result<NodeRpc, RpcError> {
    NodeRpc::new(EndpointPool::parse(urls), config, Arc::new(DefaultConnector)).await
}

/// A client with no endpoints. Every call fails with a configuration error.
pub async fn offline(config: ClientConfig) -> Result<NodeRpc, RpcError> {
    NodeRpc::new(EndpointPool::offline(), config, Arc::new(DefaultConnector)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_calls_fail_fast() {
        let rpc = offline(ClientConfig::default()).await.unwrap();
        assert!(rpc.current_url().is_none());
        let err = rpc.call("get_config", vec![], CallOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn unreachable_pool_exhausts_reconnect_budget() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let urls = format!("http://{addr};ws://{addr}");
        let config = ClientConfig::default().with_num_retries(RetryLimit::Limited(1));
        let err = connect_str(&urls, config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RetryBudgetExhausted);
    }
}
