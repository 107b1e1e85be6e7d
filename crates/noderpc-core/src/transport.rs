//! The `RpcTransport` and `Connector` traits, transport selection and dialects.

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::RpcError;

/// Which kind of channel an endpoint is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Duplex WebSocket connection (`ws://`, `wss://`).
    Persistent,
    /// One HTTP request per call (anything else).
    Stateless,
}

impl TransportKind {
    /// Pick the transport from the URL scheme prefix.
    pub fn from_url(url: &str) -> Self {
        if url.trim_start().to_ascii_lowercase().starts_with("ws") {
            Self::Persistent
        } else {
            Self::Stateless
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persistent => write!(f, "websocket"),
            Self::Stateless => write!(f, "http"),
        }
    }
}

/// RPC calling convention negotiated with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    LegacyWebsocket,
    LegacyHttp,
    NamespacedWebsocket,
    NamespacedHttp,
}

impl Dialect {
    pub fn new(kind: TransportKind, namespaced: bool) -> Self {
        match (kind, namespaced) {
            (TransportKind::Persistent, false) => Self::LegacyWebsocket,
            (TransportKind::Stateless, false) => Self::LegacyHttp,
            (TransportKind::Persistent, true) => Self::NamespacedWebsocket,
            (TransportKind::Stateless, true) => Self::NamespacedHttp,
        }
    }

    pub fn is_namespaced(self) -> bool {
        matches!(self, Self::NamespacedWebsocket | Self::NamespacedHttp)
    }

    pub fn transport_kind(self) -> TransportKind {
        match self {
            Self::LegacyWebsocket | Self::NamespacedWebsocket => TransportKind::Persistent,
            Self::LegacyHttp | Self::NamespacedHttp => TransportKind::Stateless,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyWebsocket => write!(f, "legacy-websocket"),
            Self::LegacyHttp => write!(f, "legacy-http"),
            Self::NamespacedWebsocket => write!(f, "namespaced-websocket"),
            Self::NamespacedHttp => write!(f, "namespaced-http"),
        }
    }
}

/// One open channel to one node.
///
/// # Errors
/// Implementations map a peer-closed channel to [`RpcError::ConnectionClosed`],
/// refused/reset/timed-out connections to [`RpcError::Transport`] and HTTP 401
/// to [`RpcError::Unauthorized`]. Non-2xx bodies are returned as text so the
/// dispatcher can sniff them.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send one serialised payload and return the raw reply text.
    async fn send(&self, payload: &str) -> Result<String, RpcError>;

    /// Which kind of channel this is.
    fn kind(&self) -> TransportKind;

    /// The endpoint URL.
    fn url(&self) -> &str;

    /// Release the channel. Stateless transports have nothing to close.
    async fn close(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

/// Opens transports for endpoints.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        url: &str,
        config: &ClientConfig,
    ) -> Result<Box<dyn RpcTransport>, RpcError>;
}
