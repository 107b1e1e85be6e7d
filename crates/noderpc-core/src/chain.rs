//! Known chain identities and node-configuration inspection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// Lowest blockchain version that speaks the namespaced dialect.
///
/// Compared as a plain string, not as a semantic version.
pub const MIN_NAMESPACED_VERSION: &str = "0.19.3";

/// Config keys carrying the node's blockchain version, in lookup order.
pub const VERSION_KEYS: &[&str] = &["STEEMIT_BLOCKCHAIN_VERSION", "STEEM_BLOCKCHAIN_VERSION"];

/// Config keys carrying the chain id, in lookup order.
pub const CHAIN_ID_KEYS: &[&str] = &["STEEMIT_CHAIN_ID", "STEEM_CHAIN_ID"];

const STEEM_CHAIN_ID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One asset native to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAsset {
    pub asset: String,
    pub symbol: String,
    pub precision: u8,
    pub id: u8,
}

impl ChainAsset {
    fn new(asset: &str, symbol: &str, precision: u8, id: u8) -> Self {
        Self { asset: asset.into(), symbol: symbol.into(), precision, id }
    }
}

/// Identity record of a network: chain id, address prefix and assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub name: String,
    pub chain_id: String,
    /// Lowest node version this record applies to.
    pub min_version: String,
    pub prefix: String,
    #[serde(default)]
    pub chain_assets: Vec<ChainAsset>,
}

fn steem_assets() -> Vec<ChainAsset> {
    vec![
        ChainAsset::new("SBD", "SBD", 3, 0),
        ChainAsset::new("STEEM", "STEEM", 3, 1),
        ChainAsset::new("VESTS", "VESTS", 6, 2),
    ]
}

fn record(name: &str, chain_id: &str, min_version: &str, prefix: &str, assets: Vec<ChainAsset>) -> ChainParams {
    ChainParams {
        name: name.into(),
        chain_id: chain_id.into(),
        min_version: min_version.into(),
        prefix: prefix.into(),
        chain_assets: assets,
    }
}

/// Table of chain identities a node may be matched against.
#[derive(Debug, Clone)]
pub struct KnownChains {
    chains: Vec<ChainParams>,
}

impl Default for KnownChains {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KnownChains {
    /// The built-in networks.
    pub fn builtin() -> Self {
        Self {
            chains: vec![
                record("STEEMAPPBASE", STEEM_CHAIN_ID, "0.19.10", "STM", steem_assets()),
                record("STEEM", STEEM_CHAIN_ID, "0.19.5", "STM", steem_assets()),
                record("STEEMZERO", STEEM_CHAIN_ID, "0.0.0", "STM", steem_assets()),
                record(
                    "TESTNET",
                    "79276aea5d4877d9a25892eaa01b0adf019d3e5cb12a97478df3298ccdd01673",
                    "0.0.0",
                    "STX",
                    vec![
                        ChainAsset::new("SBD", "SBD", 3, 0),
                        ChainAsset::new("STEEM", "STEEM", 3, 1),
                        ChainAsset::new("VESTS", "VESTS", 6, 2),
                    ],
                ),
                record(
                    "GOLOS",
                    "782a3039b478c839e4cb0c941ff4eaeb7df40bdd68bd441afd444b9da763de12",
                    "0.0.0",
                    "GLS",
                    vec![
                        ChainAsset::new("SBD", "GBG", 3, 0),
                        ChainAsset::new("STEEM", "GOLOS", 3, 1),
                        ChainAsset::new("VESTS", "GESTS", 6, 2),
                    ],
                ),
                record(
                    "VIT",
                    "73f14dd4b7b07a8663be9d84300de0f65ef2ee7e27aae32bbe911c548c08f000",
                    "0.0.0",
                    "VIT",
                    vec![
                        ChainAsset::new("STEEM", "VIT", 3, 1),
                        ChainAsset::new("VESTS", "VESTS", 6, 2),
                    ],
                ),
            ],
        }
    }

    /// Built-in networks plus `custom`. Custom records are tried alongside
    /// the built-ins under the same rules.
    pub fn with_custom(custom: impl IntoIterator<Item = ChainParams>) -> Self {
        let mut known = Self::builtin();
        known.chains.extend(custom);
        known
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainParams> {
        self.chains.iter()
    }

    /// Match a node's `get_config` map to a chain record.
    ///
    /// A record matches when its chain id equals the node's and its
    /// `min_version` is not above the node's version; the match with the
    /// highest `min_version` wins.
    pub fn resolve(&self, props: &Value) -> Result<ChainParams, RpcError> {
        let chain_id = lookup(props, CHAIN_ID_KEYS)
            .ok_or_else(|| RpcError::Protocol("Connecting to unknown network: no chain id".into()))?;
        let version = node_version(props).unwrap_or_default();

        self.chains
            .iter()
            .filter(|c| c.chain_id == chain_id && c.min_version.as_str() <= version)
            .max_by(|a, b| a.min_version.cmp(&b.min_version))
            .cloned()
            .ok_or_else(|| {
                RpcError::Protocol(format!(
                    "Connecting to unknown network: chain id {chain_id} version {version}"
                ))
            })
    }
}

fn lookup<'a>(props: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| props.get(*k).and_then(Value::as_str))
}

/// The blockchain version reported in a `get_config` map.
pub fn node_version(props: &Value) -> Option<&str> {
    lookup(props, VERSION_KEYS)
}

/// Whether the node behind `props` speaks the namespaced dialect.
pub fn is_namespaced_ready(props: &Value) -> bool {
    node_version(props).is_some_and(|v| v >= MIN_NAMESPACED_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn namespaced_readiness_uses_string_order() {
        assert!(is_namespaced_ready(&json!({"STEEMIT_BLOCKCHAIN_VERSION": "0.19.4"})));
        assert!(is_namespaced_ready(&json!({"STEEM_BLOCKCHAIN_VERSION": "0.19.4"})));
        assert!(!is_namespaced_ready(&json!({"STEEMIT_BLOCKCHAIN_VERSION": "0.19.2"})));
        assert!(!is_namespaced_ready(&json!({})));
    }

    #[test]
    fn resolves_highest_min_version() {
        let known = KnownChains::builtin();
        let chain = known
            .resolve(&json!({"STEEM_CHAIN_ID": STEEM_CHAIN_ID, "STEEM_BLOCKCHAIN_VERSION": "0.19.12"}))
            .unwrap();
        assert_eq!(chain.name, "STEEMAPPBASE");

        let chain = known
            .resolve(&json!({"STEEMIT_CHAIN_ID": STEEM_CHAIN_ID, "STEEMIT_BLOCKCHAIN_VERSION": "0.19.1"}))
            .unwrap();
        assert_eq!(chain.name, "STEEMZERO");
        assert_eq!(chain.prefix, "STM");
    }

    #[test]
    fn version_order_is_lexicographic() {
        // "0.19.6" sorts above "0.19.10" as a string.
        let chain = KnownChains::builtin()
            .resolve(&json!({"STEEM_CHAIN_ID": STEEM_CHAIN_ID, "STEEM_BLOCKCHAIN_VERSION": "0.19.6"}))
            .unwrap();
        assert_eq!(chain.name, "STEEMAPPBASE");
    }

    #[test]
    fn unknown_chain_is_protocol_error() {
        let err = KnownChains::builtin()
            .resolve(&json!({"STEEM_CHAIN_ID": "ff", "STEEM_BLOCKCHAIN_VERSION": "0.20.0"}))
            .unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
        assert!(KnownChains::builtin().resolve(&json!({})).is_err());
    }

    #[test]
    fn custom_chain_is_matched() {
        let custom = ChainParams {
            name: "LOCAL".into(),
            chain_id: "abcd".into(),
            min_version: "0.0.0".into(),
            prefix: "TST".into(),
            chain_assets: vec![],
        };
        let known = KnownChains::with_custom([custom.clone()]);
        let chain = known
            .resolve(&json!({"STEEM_CHAIN_ID": "abcd", "STEEM_BLOCKCHAIN_VERSION": "0.23.0"}))
            .unwrap();
        assert_eq!(chain, custom);
    }
}
