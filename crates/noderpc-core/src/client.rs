//! `NodeRpc`: the call dispatcher and retry/failover controller.
//!
//! One call is in flight at a time: the session and the pending queue sit
//! behind an async mutex. The request-id counter and the endpoint failure
//! counters are atomics and may be read without the lock.
//!
//! Per-attempt state machine:
//! ```text
//! send ──ok──────────────────────────────► decode ─► done
//!   │ empty reply / 5xx text  ─► per-call budget left?  yes ─► backoff, resend
//!   │                                                   no  ─► endpoint failure ─► failover
//!   │ connection closed       ─► reconnect same endpoint, resend
//!   │ refused / reset / other ─► endpoint failure ─► failover
//!   └ fatal (rpc error, 401, interrupt) ─► caller
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::chain::{ChainParams, KnownChains};
use crate::config::ClientConfig;
use crate::error::{ErrorKind, RpcError};
use crate::interrupt::Interrupt;
use crate::negotiate::negotiate;
use crate::policy::{sleep_and_check_retries, Budget, RetryLimit};
use crate::pool::{Endpoint, EndpointPool};
use crate::reply::decode_reply;
use crate::request::{format_query, CallOptions, RequestIds, DEFAULT_NAMESPACE};
use crate::transport::{Connector, Dialect, RpcTransport};

/// The live binding of one endpoint, its transport and negotiated dialect.
pub struct Session {
    pub endpoint: Endpoint,
    transport: Box<dyn RpcTransport>,
    pub dialect: Dialect,
    pub chain: ChainParams,
    /// The node's `get_config` map captured during negotiation.
    pub node_config: Value,
    /// Failed attempts of the call in flight on this session.
    pub call_failures: u32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint.url)
            .field("dialect", &self.dialect)
            .field("chain", &self.chain.name)
            .field("call_failures", &self.call_failures)
            .finish()
    }
}

#[derive(Default)]
struct ClientState {
    session: Option<Session>,
    pending: Vec<Value>,
}

/// What the controller does after a failed attempt.
enum Recovery {
    /// Resend on the same session.
    Resend,
    /// Reopen the same endpoint, then resend.
    Reconnect,
    /// Advance the pool, then resend.
    Failover,
}

/// Resilient RPC client over a pool of interchangeable nodes.
pub struct NodeRpc {
    pool: EndpointPool,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    chains: KnownChains,
    ids: RequestIds,
    interrupt: Interrupt,
    state: Mutex<ClientState>,
}

impl NodeRpc {
    /// Build a client. Connects immediately when `config.autoconnect` is set
    /// and the pool is not offline.
    pub async fn new(
        pool: EndpointPool,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, RpcError> {
        let chains = KnownChains::with_custom(config.custom_chains.iter().cloned());
        let client = Self {
            pool,
            connector,
            config,
            chains,
            ids: RequestIds::new(),
            interrupt: Interrupt::new(),
            state: Mutex::new(ClientState::default()),
        };
        if client.config.autoconnect && !client.pool.is_empty() {
            client.connect().await?;
        }
        Ok(client)
    }

    /// Use an externally owned interrupt handle.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Open a session on the next endpoint in the pool.
    pub async fn connect(&self) -> Result<(), RpcError> {
        let mut state = self.state.lock().await;
        self.reconnect(&mut state, true).await
    }

    /// Abandon the current node and fail over to the next one.
    pub async fn next_node(&self) -> Result<(), RpcError> {
        self.connect().await
    }

    /// Close the session. Errors while closing are logged, not returned.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(old) = state.session.take() {
            close_quietly(old).await;
        }
    }

    /// Call `name` with `args`. See [`CallOptions`] for api hints, retry
    /// overrides and queueing. Queued calls return `Value::Null`.
    pub async fn call(
        &self,
        name: &str,
        args: Vec<Value>,
        options: CallOptions,
    ) -> Result<Value, RpcError> {
        let mut state = self.state.lock().await;
        if self.pool.is_empty() {
            return Err(RpcError::Configuration("RPC is not connected (offline mode)".into()));
        }
        if state.session.is_none() {
            self.reconnect(&mut state, true).await?;
        }
        let dialect = state
            .session
            .as_ref()
            .map(|s| s.dialect)
            .ok_or_else(|| RpcError::Configuration("RPC is not connected".into()))?;

        let (namespaced, hint) = if dialect.is_namespaced() && self.config.use_condenser {
            (false, Some(DEFAULT_NAMESPACE))
        } else {
            (dialect.is_namespaced(), options.api.as_deref())
        };
        let query = format_query(namespaced, &self.ids, hint, name, &args);

        if options.queue {
            push_flat(&mut state.pending, query);
            tracing::debug!(method = name, pending = state.pending.len(), "call queued");
            return Ok(Value::Null);
        }

        let payload = if state.pending.is_empty() {
            query
        } else {
            let mut batch = std::mem::take(&mut state.pending);
            push_flat(&mut batch, query);
            Value::Array(batch)
        };
        let call_budget = options.num_retries_call.unwrap_or(self.config.num_retries_call);
        self.execute(&mut state, &payload, call_budget).await
    }

    /// Call and deserialise the result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        name: &str,
        args: Vec<Value>,
        options: CallOptions,
    ) -> Result<T, RpcError> {
        let value = self.call(name, args, options).await?;
        serde_json::from_value(value).map_err(RpcError::Deserialization)
    }

    /// Send the pending queue on its own. Returns an empty list if nothing
    /// was queued.
    pub async fn flush(&self) -> Result<Value, RpcError> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(Value::Array(vec![]));
        }
        if state.session.is_none() {
            self.reconnect(&mut state, true).await?;
        }
        let payload = Value::Array(std::mem::take(&mut state.pending));
        self.execute(&mut state, &payload, self.config.num_retries_call).await
    }

    /// Number of queued, unsent requests.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// The negotiated dialect of the active session.
    pub async fn dialect(&self) -> Option<Dialect> {
        self.state.lock().await.session.as_ref().map(|s| s.dialect)
    }

    /// Whether the active session speaks the namespaced dialect.
    pub async fn is_namespaced(&self) -> bool {
        self.dialect().await.is_some_and(Dialect::is_namespaced)
    }

    /// Chain parameters of the active session.
    pub async fn chain_params(&self) -> Option<ChainParams> {
        self.state.lock().await.session.as_ref().map(|s| s.chain.clone())
    }

    /// The node configuration captured during negotiation.
    pub async fn node_config(&self) -> Option<Value> {
        self.state.lock().await.session.as_ref().map(|s| s.node_config.clone())
    }

    /// URL of the active endpoint.
    pub fn current_url(&self) -> Option<String> {
        self.pool.current().map(|e| e.url.clone())
    }

    /// Failures recorded against `url` over the client's lifetime.
    pub fn endpoint_failures(&self, url: &str) -> u32 {
        self.pool.failures(url)
    }

    /// The most recently allocated request id.
    pub fn last_request_id(&self) -> u64 {
        self.ids.last()
    }

    async fn open_session(&self, endpoint: &Endpoint) -> Result<Session, RpcError> {
        tracing::debug!(url = %endpoint.url, kind = %endpoint.kind, "trying to connect to node");
        let transport = self
            .interrupt
            .guard(self.connector.connect(&endpoint.url, &self.config))
            .await?;
        let negotiated = self
            .interrupt
            .guard(negotiate(
                transport.as_ref(),
                &self.ids,
                &self.chains,
                self.config.use_condenser,
                self.config.credentials(),
            ))
            .await;
        match negotiated {
            Ok(n) => Ok(Session {
                endpoint: endpoint.clone(),
                transport,
                dialect: n.dialect,
                chain: n.chain,
                node_config: n.config,
                call_failures: 0,
            }),
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    tracing::debug!(url = %endpoint.url, error = %close_err, "close after failed negotiation");
                }
                Err(e)
            }
        }
    }

    /// Establish a new session, on the next endpoint or on the current one.
    ///
    /// Connection-class failures count against the endpoint and the
    /// reconnect budget; anything fatal is returned as-is.
    async fn reconnect(&self, state: &mut ClientState, mut next_url: bool) -> Result<(), RpcError> {
        let carried_failures = if next_url {
            0
        } else {
            state.session.as_ref().map_or(0, |s| s.call_failures)
        };

        loop {
            let endpoint = match (next_url, self.pool.current()) {
                (false, Some(current)) => current.clone(),
                _ => self.pool.next()?.clone(),
            };

            if let Some(old) = state.session.take() {
                close_quietly(old).await;
            }

            match self.open_session(&endpoint).await {
                Ok(mut session) => {
                    if !next_url {
                        session.call_failures = carried_failures;
                    }
                    tracing::info!(url = %endpoint.url, dialect = %session.dialect, "connected to node");
                    state.session = Some(session);
                    return Ok(());
                }
                Err(e) if !connection_failure(&e) => return Err(e),
                Err(e) => {
                    self.pool.record_failure(&endpoint);
                    sleep_and_check_retries(
                        self.config.num_retries,
                        self.pool.total_failures(),
                        &endpoint.url,
                        &e.to_string(),
                        Budget::Reconnect,
                        true,
                        &self.interrupt,
                    )
                    .await?;
                    next_url = true;
                }
            }
        }
    }

    /// Mark the active endpoint failed and move to the next one.
    async fn failover(&self, state: &mut ClientState, url: &str, reason: &str) -> Result<(), RpcError> {
        if let Some(endpoint) = state.session.as_ref().map(|s| s.endpoint.clone()) {
            self.pool.record_failure(&endpoint);
        }
        // The reconnect below retries right away; no sleep here.
        sleep_and_check_retries(
            self.config.num_retries,
            self.pool.total_failures(),
            url,
            reason,
            Budget::Reconnect,
            false,
            &self.interrupt,
        )
        .await?;
        tracing::warn!(url, reason, "failing over to next node");
        self.reconnect(state, true).await
    }

    /// Send `payload` until it decodes, a fatal error occurs or a budget runs out.
    async fn execute(
        &self,
        state: &mut ClientState,
        payload: &Value,
        call_budget: u32,
    ) -> Result<Value, RpcError> {
        let text = serde_json::to_string(payload)?;
        tracing::debug!(payload = %text, "rpc request");
        if let Some(session) = state.session.as_mut() {
            session.call_failures = 0;
        }

        loop {
            let (url, outcome) = {
                let session = state
                    .session
                    .as_mut()
                    .ok_or_else(|| RpcError::Configuration("RPC is not connected".into()))?;
                let outcome = self.interrupt.guard(session.transport.send(&text)).await;
                (session.endpoint.url.clone(), outcome)
            };

            let err = match outcome.and_then(|reply| decode_reply(&reply)) {
                Ok(value) => {
                    if let Some(session) = state.session.as_mut() {
                        session.call_failures = 0;
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            let attempts = match (err.kind(), state.session.as_mut()) {
                (ErrorKind::RetryableServer | ErrorKind::ConnectionClosed, Some(session)) => {
                    session.call_failures += 1;
                    session.call_failures
                }
                (_, Some(session)) => {
                    session.call_failures = 0;
                    0
                }
                (_, None) => 0,
            };
            let recovery = match err.kind() {
                ErrorKind::RetryableServer => {
                    let reason = err.to_string();
                    match sleep_and_check_retries(
                        RetryLimit::Limited(call_budget),
                        attempts,
                        &url,
                        &reason,
                        Budget::Call,
                        true,
                        &self.interrupt,
                    )
                    .await
                    {
                        Ok(()) => Recovery::Resend,
                        Err(e) if e.kind() == ErrorKind::CallRetriesExhausted => Recovery::Failover,
                        Err(e) => return Err(e),
                    }
                }
                ErrorKind::ConnectionClosed if attempts > call_budget => Recovery::Failover,
                ErrorKind::ConnectionClosed => Recovery::Reconnect,
                ErrorKind::Transport => Recovery::Failover,
                _ => return Err(err),
            };

            match recovery {
                Recovery::Resend => {}
                Recovery::Reconnect => {
                    tracing::warn!(url = %url, error = %err, "connection closed, reconnecting");
                    self.reconnect(state, false).await?;
                }
                Recovery::Failover => self.failover(state, &url, &err.to_string()).await?,
            }
        }
    }
}

impl std::fmt::Debug for NodeRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRpc")
            .field("pool", &self.pool)
            .field("last_request_id", &self.ids.last())
            .finish()
    }
}

/// Errors that count as an endpoint failure while opening a session.
fn connection_failure(err: &RpcError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::RetryableServer | ErrorKind::ConnectionClosed | ErrorKind::Transport
    )
}

fn push_flat(queue: &mut Vec<Value>, query: Value) {
    match query {
        Value::Array(items) => queue.extend(items),
        single => queue.push(single),
    }
}

async fn close_quietly(session: Session) {
    if let Err(e) = session.transport.close().await {
        tracing::warn!(url = %session.endpoint.url, error = %e, "error closing old session");
    }
}
