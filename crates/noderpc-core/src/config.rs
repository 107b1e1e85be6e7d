//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::ChainParams;
use crate::error::RpcError;
use crate::policy::RetryLimit;

/// Options recognised at client construction.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Stateless transport per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Reconnect budget; `-1` is unlimited.
    #[serde(default = "RetryLimit::unlimited")]
    pub num_retries: RetryLimit,
    /// Per-call retry budget on one session.
    #[serde(default = "default_num_retries_call")]
    pub num_retries_call: u32,
    /// Force the legacy `condenser_api` namespace on namespaced nodes.
    #[serde(default)]
    pub use_condenser: bool,
    /// Connect during construction.
    #[serde(default = "bool_true")]
    pub autoconnect: bool,
    /// Credentials for HTTP basic auth and the WebSocket login handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Extra chain identities matched during negotiation.
    #[serde(default)]
    pub custom_chains: Vec<ChainParams>,
}

fn default_timeout() -> u64 { 60 }
fn default_num_retries_call() -> u32 { 5 }
fn bool_true() -> bool { true }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            num_retries: RetryLimit::Unlimited,
            num_retries_call: default_num_retries_call(),
            use_condenser: false,
            autoconnect: true,
            user: None,
            password: None,
            custom_chains: vec![],
        }
    }
}

impl ClientConfig {
    /// Parse from a JSON options map; unknown keys are ignored.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        serde_json::from_value(value)
            .map_err(|e| RpcError::Configuration(format!("invalid client options: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Both credentials, when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_num_retries(mut self, limit: impl Into<RetryLimit>) -> Self {
        self.num_retries = limit.into();
        self
    }

    pub fn with_num_retries_call(mut self, n: u32) -> Self {
        self.num_retries_call = n;
        self
    }

    pub fn with_autoconnect(mut self, autoconnect: bool) -> Self {
        self.autoconnect = autoconnect;
        self
    }

    pub fn with_condenser(mut self, use_condenser: bool) -> Self {
        self.use_condenser = use_condenser;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_from_empty_map() {
        let cfg = ClientConfig::from_value(json!({})).unwrap();
        assert_eq!(cfg.timeout, 60);
        assert_eq!(cfg.num_retries, RetryLimit::Unlimited);
        assert_eq!(cfg.num_retries_call, 5);
        assert!(!cfg.use_condenser);
        assert!(cfg.autoconnect);
        assert!(cfg.credentials().is_none());
    }

    #[test]
    fn recognised_options() {
        let cfg = ClientConfig::from_value(json!({
            "timeout": 5,
            "num_retries": 3,
            "num_retries_call": 1,
            "use_condenser": true,
            "autoconnect": false,
            "user": "alice",
            "password": "secret",
            "something_else": 1,
        }))
        .unwrap();
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.num_retries, RetryLimit::Limited(3));
        assert_eq!(cfg.num_retries_call, 1);
        assert!(cfg.use_condenser);
        assert!(!cfg.autoconnect);
        assert_eq!(cfg.credentials(), Some(("alice", "secret")));
    }

    #[test]
    fn empty_credentials_are_ignored() {
        let cfg = ClientConfig::default().with_credentials("alice", "");
        assert!(cfg.credentials().is_none());
    }

    #[test]
    fn invalid_options_are_configuration_errors() {
        let err = ClientConfig::from_value(json!({"timeout": "soon"})).unwrap_err();
        assert!(matches!(err, RpcError::Configuration(_)));
    }
}
