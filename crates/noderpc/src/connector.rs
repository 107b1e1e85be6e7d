//! Scheme-driven transport selection.

use async_trait::async_trait;

use noderpc_core::config::ClientConfig;
use noderpc_core::error::RpcError;
use noderpc_core::transport::{Connector, RpcTransport, TransportKind};
use noderpc_http::HttpTransport;
use noderpc_ws::WsTransport;

/// Opens a WebSocket for `ws`/`wss` URLs and an HTTP transport otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(
        &self,
        url: &str,
        config: &ClientConfig,
    ) -> Result<Box<dyn RpcTransport>, RpcError> {
        match TransportKind::from_url(url) {
            TransportKind::Persistent => {
                tracing::debug!(url, "opening WebSocket transport");
                Ok(Box::new(WsTransport::connect(url).await?))
            }
            TransportKind::Stateless => {
                tracing::debug!(url, "using HTTP transport");
                Ok(Box::new(HttpTransport::new(url, config)?))
            }
        }
    }
}
