//! Convenience wrappers for the handful of calls every consumer needs.
//!
//! Each wrapper picks the right api and argument shape for the negotiated
//! dialect; everything else goes through [`NodeRpc::call`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::NodeRpc;
use crate::error::RpcError;
use crate::request::CallOptions;

/// Reply of `get_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersion {
    pub blockchain_version: String,
    #[serde(default)]
    pub steem_revision: Option<String>,
    #[serde(default)]
    pub fc_revision: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
}

impl NodeRpc {
    /// The node's compile-time configuration map.
    pub async fn get_config(&self) -> Result<Value, RpcError> {
        let args = if self.is_namespaced().await { vec![json!({})] } else { vec![] };
        self.call("get_config", args, CallOptions::api("database")).await
    }

    pub async fn get_dynamic_global_properties(&self) -> Result<Value, RpcError> {
        let args = if self.is_namespaced().await { vec![json!({})] } else { vec![] };
        self.call("get_dynamic_global_properties", args, CallOptions::api("database"))
            .await
    }

    /// Block `num`, or `None` if the node does not have it yet.
    pub async fn get_block(&self, num: u64) -> Result<Option<Value>, RpcError> {
        let block = if self.is_namespaced().await {
            let reply = self
                .call("get_block", vec![json!({"block_num": num})], CallOptions::api("block"))
                .await?;
            reply.get("block").cloned().unwrap_or(Value::Null)
        } else {
            self.call("get_block", vec![json!(num)], CallOptions::api("database")).await?
        };
        Ok(Some(block).filter(|b| !b.is_null()))
    }

    /// Account objects for `names`, in request order.
    pub async fn get_accounts(&self, names: &[&str]) -> Result<Vec<Value>, RpcError> {
        let api = if self.is_namespaced().await { "condenser_api" } else { "database" };
        self.call_as("get_accounts", vec![json!(names)], CallOptions::api(api)).await
    }

    pub async fn get_version(&self) -> Result<NodeVersion, RpcError> {
        if self.is_namespaced().await {
            self.call_as("get_version", vec![json!({})], CallOptions::api("database")).await
        } else {
            self.call_as("get_version", vec![], CallOptions::api("login_api")).await
        }
    }
}
