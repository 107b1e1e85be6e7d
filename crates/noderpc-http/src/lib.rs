//! noderpc-http: stateless HTTP JSON-RPC transport.
//!
//! One POST per payload. The reply body is returned as text for every status
//! except 401, so 5xx pages reach the dispatcher's status sniffing.

pub mod client;

pub use client::{HttpTransport, USER_AGENT};
