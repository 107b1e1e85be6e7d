//! Error kinds raised while talking to a node.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Coarse classification the failover controller matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No usable endpoint (offline client, empty pool).
    Configuration,
    /// The stateless transport was rejected by HTTP auth.
    Unauthorized,
    /// The node answered with a structured error or unparseable text.
    Protocol,
    /// Empty reply or a 5xx-style status text. Retry on the same session.
    RetryableServer,
    /// The persistent channel was closed. Reconnect to the same endpoint.
    ConnectionClosed,
    /// Connection refused/reset or any other transport failure. Fail over.
    Transport,
    /// The per-call budget is spent. Fail over to the next endpoint.
    CallRetriesExhausted,
    /// The reconnect budget is spent. Terminal.
    RetryBudgetExhausted,
    /// Operator abort.
    Interrupted,
}

/// Errors that can occur while dispatching a call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No usable endpoint is configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP 401 from the node.
    #[error("Unauthorized by {url}")]
    Unauthorized { url: String },

    /// Structured error object returned by the node.
    #[error("RPC error: {}", .0.detail_or_message())]
    Rpc(JsonRpcError),

    /// Reply could not be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transient server-side condition (empty reply, 500/502/503/504, 429).
    #[error("Retryable server error: {0}")]
    RetryableServer(String),

    /// The persistent connection was closed by the peer.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Connection refused, reset, timed out or otherwise failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Per-call retries used up on one endpoint.
    #[error("Call retries reached on {url} ({attempts} attempts)")]
    CallRetriesExhausted { url: String, attempts: u32 },

    /// Reconnect budget used up.
    #[error("Retries reached on {url} ({attempts} attempts)")]
    RetriesExhausted { url: String, attempts: u32 },

    /// Aborted by the operator.
    #[error("Interrupted")]
    Interrupted,

    /// A reply or result could not be (de)serialised.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl RpcError {
    /// Returns the coarse kind used to pick the next action.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Rpc(_) | Self::Protocol(_) | Self::Deserialization(_) => ErrorKind::Protocol,
            Self::RetryableServer(_) => ErrorKind::RetryableServer,
            Self::ConnectionClosed(_) => ErrorKind::ConnectionClosed,
            Self::Transport(_) => ErrorKind::Transport,
            Self::CallRetriesExhausted { .. } => ErrorKind::CallRetriesExhausted,
            Self::RetriesExhausted { .. } => ErrorKind::RetryBudgetExhausted,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Returns `true` if the call may be resent on the same session.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RetryableServer)
    }

    /// Returns `true` if the error should end the current session.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectionClosed | ErrorKind::Transport | ErrorKind::CallRetriesExhausted
        )
    }

    /// Returns `true` if the error must reach the caller unchanged.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable() && !self.is_transport()
    }

    /// The server-supplied message, when the node sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rpc(e) => Some(e.detail_or_message()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(RpcError::RetryableServer("Bad Gateway".into()).is_retryable());
        assert!(RpcError::ConnectionClosed("eof".into()).is_transport());
        assert!(RpcError::Transport("refused".into()).is_transport());
        assert!(RpcError::Protocol("Expected JSON".into()).is_fatal());
        assert!(RpcError::Interrupted.is_fatal());
        assert!(RpcError::Unauthorized { url: "https://a".into() }.is_fatal());
        assert_eq!(
            RpcError::RetriesExhausted { url: "https://a".into(), attempts: 3 }.kind(),
            ErrorKind::RetryBudgetExhausted
        );
    }

    #[test]
    fn rpc_error_prefers_detail() {
        let err = RpcError::Rpc(JsonRpcError {
            code: -32000,
            message: "generic".into(),
            detail: Some("missing required active authority".into()),
            data: None,
        });
        assert_eq!(err.server_message(), Some("missing required active authority"));
        assert!(err.to_string().contains("missing required active authority"));
    }

    #[test]
    fn exhausted_error_carries_endpoint() {
        let err = RpcError::RetriesExhausted { url: "wss://node.example".into(), attempts: 4 };
        let text = err.to_string();
        assert!(text.contains("wss://node.example"));
        assert!(text.contains('4'));
    }
}
