//! Well-known public Steem nodes.

/// Public HTTPS endpoints.
pub const HTTP_NODES: &[&str] = &[
    "https://api.steemit.com",
    "https://anyx.io",
    "https://api.justyy.com",
    "https://steemd.minnowsupportproject.org",
    "https://rpc.steemviz.com",
];

/// Public WebSocket endpoints.
pub const WS_NODES: &[&str] = &[
    "wss://anyx.io",
    "wss://steemd.minnowsupportproject.org",
    "wss://rpc.steemviz.com",
];

/// Every public endpoint, HTTPS first.
pub fn all_nodes() -> Vec<&'static str> {
    HTTP_NODES.iter().chain(WS_NODES).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderpc_core::{EndpointPool, TransportKind};

    #[test]
    fn lists_match_their_transport() {
        let pool = EndpointPool::new(HTTP_NODES);
        assert_eq!(pool.len(), HTTP_NODES.len());
        assert!(pool.summary().iter().all(|(u, _)| TransportKind::from_url(u) == TransportKind::Stateless));
        assert!(WS_NODES.iter().all(|u| TransportKind::from_url(u) == TransportKind::Persistent));
        assert_eq!(all_nodes().len(), HTTP_NODES.len() + WS_NODES.len());
    }
}
