//! Plain in-memory counters for what the resolver did. Not wired up
//! to any metrics backend - just a small struct a caller can snapshot
//! and log periodically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    authoritative_responses: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    recursive_resolutions: AtomicU64,
    servfail_responses: AtomicU64,
    nxdomain_responses: AtomicU64,
}

/// A cheaply-cloneable handle onto the same set of counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_authoritative_response(&self) {
        self.counters.authoritative_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recursive_resolution(&self) {
        self.counters.recursive_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_servfail_response(&self) {
        self.counters.servfail_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nxdomain_response(&self) {
        self.counters.nxdomain_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            authoritative_responses: self.counters.authoritative_responses.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            recursive_resolutions: self.counters.recursive_resolutions.load(Ordering::Relaxed),
            servfail_responses: self.counters.servfail_responses.load(Ordering::Relaxed),
            nxdomain_responses: self.counters.nxdomain_responses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MetricsSnapshot {
    pub authoritative_responses: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub recursive_resolutions: u64,
    pub servfail_responses: u64,
    pub nxdomain_responses: u64,
}
