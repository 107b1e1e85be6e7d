//! Cyclic endpoint pool with per-endpoint failure counters.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::RpcError;
use crate::transport::TransportKind;

/// One configured node address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub kind: TransportKind,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = TransportKind::from_url(&url);
        Self { url, kind }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

struct EndpointSlot {
    endpoint: Endpoint,
    failures: AtomicU32,
}

/// Round-robin pool of endpoints.
///
/// Endpoints are never removed; a degraded endpoint comes up again on the
/// next cycle. An empty pool is an offline pool whose [`next`](Self::next)
/// always fails with a configuration error.
pub struct EndpointPool {
    slots: Vec<EndpointSlot>,
    cursor: AtomicUsize,
    current: AtomicUsize,
}

impl EndpointPool {
    /// Build a pool from a list of URLs. Blank entries are dropped.
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let slots = urls
            .into_iter()
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .map(|u| EndpointSlot { endpoint: Endpoint::new(u), failures: AtomicU32::new(0) })
            .collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            current: AtomicUsize::new(usize::MAX),
        }
    }

    /// Build a pool from one string holding URLs separated by `,` or `;`.
    pub fn parse(urls: &str) -> Self {
        Self::new(urls.split([',', ';']))
    }

    /// A pool with no endpoints.
    pub fn offline() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Number of endpoints in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the pool is offline.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Advance the cursor and return the endpoint it lands on.
    pub fn next(&self) -> Result<&Endpoint, RpcError> {
        if self.slots.is_empty() {
            return Err(RpcError::Configuration("no endpoints configured (offline mode)".into()));
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.current.store(idx, Ordering::Relaxed);
        Ok(&self.slots[idx].endpoint)
    }

    /// The active endpoint, without advancing.
    pub fn current(&self) -> Option<&Endpoint> {
        self.slots
            .get(self.current.load(Ordering::Relaxed))
            .map(|s| &s.endpoint)
    }

    /// Bump the failure counter of `endpoint`.
    pub fn record_failure(&self, endpoint: &Endpoint) -> u32 {
        match self.slots.iter().find(|s| s.endpoint.url == endpoint.url) {
            Some(slot) => slot.failures.fetch_add(1, Ordering::Relaxed) + 1,
            None => 0,
        }
    }

    /// Failures recorded for `url` (`0` for unknown URLs).
    pub fn failures(&self, url: &str) -> u32 {
        self.slots
            .iter()
            .find(|s| s.endpoint.url == url)
            .map(|s| s.failures.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Failures across every endpoint, over the pool's lifetime.
    pub fn total_failures(&self) -> u32 {
        self.slots.iter().map(|s| s.failures.load(Ordering::Relaxed)).sum()
    }

    /// `(url, failures)` for each endpoint in configured order.
    pub fn summary(&self) -> Vec<(String, u32)> {
        self.slots
            .iter()
            .map(|s| (s.endpoint.url.clone(), s.failures.load(Ordering::Relaxed)))
            .collect()
    }
}

impl std::fmt::Debug for EndpointPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointPool")
            .field("endpoints", &self.summary())
            .field("current", &self.current().map(|e| e.url.as_str()))
            .finish()
    }
}
