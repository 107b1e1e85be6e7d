//! JSON-RPC 2.0 wire types and dialect-aware query formatting.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Namespace used by namespaced nodes when the caller gives no hint.
pub const DEFAULT_NAMESPACE: &str = "condenser_api";

/// Suffix every api name carries on the wire.
pub const NAMESPACE_SUFFIX: &str = "_api";

/// Hints that are sent verbatim to namespaced nodes.
const PASSTHROUGH_NAMESPACES: &[&str] = &["jsonrpc"];

/// Strictly increasing request-id source, unique per client instance.
///
/// The first id handed out is `1`. Ids are never reused, even across sessions.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently allocated id (`0` before the first call).
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

/// A JSON-RPC 2.0 error object.
///
/// Nodes put a human-readable explanation in either `detail` or `message`;
/// `detail` wins when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn detail_or_message(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.message)
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.detail_or_message())
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Explicit api / namespace, e.g. `"database"` or `"database_api"`.
    pub api: Option<String>,
    /// Override for the per-call retry budget.
    pub num_retries_call: Option<u32>,
    /// Append to the pending queue instead of sending.
    pub queue: bool,
}

impl CallOptions {
    pub fn api(api: impl Into<String>) -> Self {
        Self { api: Some(api.into()), ..Self::default() }
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn with_retries(mut self, num_retries_call: u32) -> Self {
        self.num_retries_call = Some(num_retries_call);
        self
    }

    pub fn queued(mut self) -> Self {
        self.queue = true;
        self
    }
}

fn normalize_api(hint: &str) -> String {
    let base = hint.strip_suffix(NAMESPACE_SUFFIX).unwrap_or(hint);
    format!("{base}{NAMESPACE_SUFFIX}")
}

/// Resolve the api name to put on the wire.
///
/// Legacy nodes get `None` unless a hint is given. Namespaced nodes default
/// to [`DEFAULT_NAMESPACE`]; `"jsonrpc"` passes through untouched.
pub fn resolve_api_name(namespaced: bool, hint: Option<&str>) -> Option<String> {
    match hint.filter(|h| !h.is_empty()) {
        Some(h) if namespaced && PASSTHROUGH_NAMESPACES.contains(&h) => Some(h.to_string()),
        Some(h) => Some(normalize_api(h)),
        None if namespaced => Some(DEFAULT_NAMESPACE.to_string()),
        None => None,
    }
}

fn legacy_call(id: u64, api: Option<&str>, name: &str, args: &[Value]) -> Value {
    json!({
        "method": "call",
        "params": [api, name, args],
        "jsonrpc": "2.0",
        "id": id,
    })
}

fn namespaced_call(id: u64, api: &str, name: &str, params: Value) -> Value {
    json!({
        "method": format!("{api}.{name}"),
        "params": params,
        "jsonrpc": "2.0",
        "id": id,
    })
}

/// Frame a call for the wire.
///
/// `hint` is normalised through [`resolve_api_name`]. The result is either a
/// single request object or, when the only argument is a list of objects, an
/// array of namespaced requests with one fresh id each.
pub fn format_query(
    namespaced: bool,
    ids: &RequestIds,
    hint: Option<&str>,
    name: &str,
    args: &[Value],
) -> Value {
    let api = resolve_api_name(namespaced, hint);
    if !namespaced {
        return legacy_call(ids.next(), api.as_deref(), name, args);
    }
    let api = api.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    match args {
        [] if api == DEFAULT_NAMESPACE => namespaced_call(ids.next(), &api, name, json!([])),
        [] => namespaced_call(ids.next(), &api, name, Value::Object(Map::new())),
        [Value::Object(params)] => {
            namespaced_call(ids.next(), &api, name, Value::Object(params.clone()))
        }
        [Value::Array(items)] if !items.is_empty() && items.iter().all(Value::is_object) => {
            Value::Array(
                items
                    .iter()
                    .map(|params| namespaced_call(ids.next(), &api, name, params.clone()))
                    .collect(),
            )
        }
        _ => legacy_call(ids.next(), Some(&api), name, args),
    }
}
