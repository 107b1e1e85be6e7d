//! noderpc-core: endpoint pool, dialect negotiation and failover for
//! blockchain full-node RPC.
//!
//! # Overview
//!
//! - [`EndpointPool`]: cyclic list of node URLs with failure counters
//! - [`RpcTransport`] / [`Connector`]: the seam the HTTP and WebSocket crates plug into
//! - [`negotiate`]: legacy vs namespaced dialect and chain detection
//! - [`NodeRpc`]: call dispatcher, pending queue and retry/failover controller
//! - [`policy`] module: retry budgets and the backoff schedule
//! - [`RpcError`]: structured error type

pub mod api;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod negotiate;
pub mod policy;
pub mod pool;
pub mod reply;
pub mod request;
pub mod transport;

pub use api::NodeVersion;
pub use chain::{ChainAsset, ChainParams, KnownChains};
pub use client::NodeRpc;
pub use config::ClientConfig;
pub use error::{ErrorKind, RpcError};
pub use interrupt::Interrupt;
pub use negotiate::{negotiate, Negotiation};
pub use policy::{backoff_delay, RetryLimit};
pub use pool::{Endpoint, EndpointPool};
pub use reply::decode_reply;
pub use request::{format_query, CallOptions, JsonRpcError, RequestIds};
pub use transport::{Connector, Dialect, RpcTransport, TransportKind};
