//! Dialect negotiation run once per new session.
//!
//! 1. Optional `login_api.login` on persistent transports.
//! 2. `get_config` in legacy framing; on a bad-cast error, retry namespaced.
//! 3. Version check against [`MIN_NAMESPACED_VERSION`](crate::chain::MIN_NAMESPACED_VERSION).
//! 4. Chain identity lookup.

use serde_json::{json, Value};

use crate::chain::{is_namespaced_ready, node_version, ChainParams, KnownChains};
use crate::error::RpcError;
use crate::reply::decode_reply;
use crate::request::{format_query, RequestIds};
use crate::transport::{Dialect, RpcTransport, TransportKind};

/// Error text legacy-only parsing produces for namespaced-only nodes.
const BAD_CAST_MARKERS: &[&str] = &["Bad Cast", "Invalid cast from type"];

/// Outcome of a successful negotiation.
#[derive(Debug, Clone)]
pub struct Negotiation {
    pub dialect: Dialect,
    pub chain: ChainParams,
    /// The node's `get_config` map.
    pub config: Value,
}

fn is_bad_cast(err: &RpcError) -> bool {
    let text = match err {
        RpcError::Rpc(e) => e.detail_or_message().to_string(),
        other => other.to_string(),
    };
    BAD_CAST_MARKERS.iter().any(|m| text.contains(m))
}

async fn exchange(transport: &dyn RpcTransport, query: &Value) -> Result<Value, RpcError> {
    let payload = serde_json::to_string(query)?;
    tracing::debug!(url = %transport.url(), payload = %payload, "negotiation request");
    let reply = transport.send(&payload).await?;
    decode_reply(&reply)
}

/// Probe the node behind `transport` and pick its dialect and chain.
pub async fn negotiate(
    transport: &dyn RpcTransport,
    ids: &RequestIds,
    chains: &KnownChains,
    use_condenser: bool,
    credentials: Option<(&str, &str)>,
) -> Result<Negotiation, RpcError> {
    let kind = transport.kind();

    if let (TransportKind::Persistent, Some((user, password))) = (kind, credentials) {
        let login = format_query(false, ids, Some("login_api"), "login", &[json!(user), json!(password)]);
        match exchange(transport, &login).await? {
            Value::Bool(false) => {
                tracing::warn!(url = %transport.url(), user, "login handshake rejected")
            }
            _ => tracing::debug!(url = %transport.url(), user, "login handshake done"),
        }
    }

    let hint = if use_condenser { None } else { Some("database") };
    let legacy = format_query(false, ids, hint, "get_config", &[]);
    let (props, namespaced_probe) = match exchange(transport, &legacy).await {
        Ok(props) => (props, false),
        Err(e) if is_bad_cast(&e) => {
            tracing::debug!(url = %transport.url(), "legacy get_config rejected, probing namespaced");
            let query = format_query(true, ids, Some("database"), "get_config", &[json!({})]);
            (exchange(transport, &query).await?, true)
        }
        Err(e) => return Err(e),
    };

    if !props.is_object() {
        return Err(RpcError::Protocol("Could not receive answer for get_config".into()));
    }

    let namespaced = namespaced_probe || is_namespaced_ready(&props);
    let dialect = Dialect::new(kind, namespaced);
    let chain = chains.resolve(&props)?;

    tracing::info!(
        url = %transport.url(),
        dialect = %dialect,
        chain = %chain.name,
        version = node_version(&props).unwrap_or("unknown"),
        "session negotiated"
    );

    Ok(Negotiation { dialect, chain, config: props })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const STEEM_ID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    /// Answers with queued replies and records what was sent.
    struct Scripted {
        kind: TransportKind,
        replies: Mutex<Vec<String>>,
        sent: Mutex<Vec<Value>>,
    }

    impl Scripted {
        fn new(kind: TransportKind, replies: &[Value]) -> Self {
            Self {
                kind,
                replies: Mutex::new(replies.iter().rev().map(Value::to_string).collect()),
                sent: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for Scripted {
        async fn send(&self, payload: &str) -> Result<String, RpcError> {
            self.sent.lock().unwrap().push(serde_json::from_str(payload).unwrap());
            Ok(self.replies.lock().unwrap().pop().unwrap_or_default())
        }
        fn kind(&self) -> TransportKind {
            self.kind
        }
        fn url(&self) -> &str {
            "scripted://node"
        }
    }

    fn config(version: &str) -> Value {
        json!({"jsonrpc": "2.0", "id": 1, "result": {
            "STEEM_CHAIN_ID": STEEM_ID,
            "STEEM_BLOCKCHAIN_VERSION": version,
        }})
    }

    #[tokio::test]
    async fn new_node_is_namespaced() {
        let t = Scripted::new(TransportKind::Stateless, &[config("0.19.4")]);
        let n = negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, None)
            .await
            .unwrap();
        assert_eq!(n.dialect, Dialect::NamespacedHttp);
        let sent = t.sent.lock().unwrap();
        assert_eq!(sent[0]["method"], "call");
        assert_eq!(sent[0]["params"], json!(["database_api", "get_config", []]));
    }

    #[tokio::test]
    async fn old_node_stays_legacy() {
        let t = Scripted::new(TransportKind::Persistent, &[config("0.19.1")]);
        let n = negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, None)
            .await
            .unwrap();
        assert_eq!(n.dialect, Dialect::LegacyWebsocket);
        assert_eq!(n.chain.name, "STEEMZERO");
    }

    #[tokio::test]
    async fn bad_cast_falls_back_to_namespaced_probe() {
        let bad_cast = json!({"id": 1, "error": {"code": -32000,
            "message": "Bad Cast:Invalid cast from type 'array_type' to Object"}});
        let t = Scripted::new(TransportKind::Stateless, &[bad_cast, config("0.19.2")]);
        let n = negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, None)
            .await
            .unwrap();
        assert!(n.dialect.is_namespaced());
        let sent = t.sent.lock().unwrap();
        assert_eq!(sent[1]["method"], "database_api.get_config");
        assert_eq!(sent[1]["params"], json!({}));
    }

    #[tokio::test]
    async fn login_runs_first_on_persistent_transport() {
        let t = Scripted::new(
            TransportKind::Persistent,
            &[json!({"id": 1, "result": true}), config("0.19.4")],
        );
        negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, Some(("alice", "pw")))
            .await
            .unwrap();
        let sent = t.sent.lock().unwrap();
        assert_eq!(sent[0]["params"], json!(["login_api", "login", ["alice", "pw"]]));
        assert_eq!(sent[1]["params"][1], "get_config");
    }

    #[tokio::test]
    async fn no_login_over_http() {
        let t = Scripted::new(TransportKind::Stateless, &[config("0.19.4")]);
        negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, Some(("alice", "pw")))
            .await
            .unwrap();
        assert_eq!(t.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_errors_propagate() {
        let err_reply = json!({"id": 1, "error": {"message": "node is syncing"}});
        let t = Scripted::new(TransportKind::Stateless, &[err_reply]);
        let err = negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, None)
            .await
            .unwrap_err();
        assert_eq!(err.server_message(), Some("node is syncing"));
    }

    #[tokio::test]
    async fn empty_reply_is_retryable() {
        let t = Scripted::new(TransportKind::Stateless, &[]);
        let err = negotiate(&t, &RequestIds::new(), &KnownChains::builtin(), false, None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
