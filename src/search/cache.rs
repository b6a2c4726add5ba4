// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! TTL cache for search results
//!
//! Rows that share an entity produce the same query; the cache lets them
//! share one provider call, including rows that ask at the same time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use super::types::SearchResult;

/// Default upper bound on cached queries
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

struct CachedEntry {
    results: Vec<SearchResult>,
    inserted_at: Instant,
}

/// Hit/miss counters and occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL-based cache keyed by normalized query text
pub struct SearchCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    /// One gate per key with a lookup in progress
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Gate shared by concurrent lookups of one query
pub(crate) type KeyGate = Arc<AsyncMutex<()>>;

impl SearchCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Gate for `query`; holders of its lock fetch one at a time
    pub(crate) fn gate(&self, query: &str) -> KeyGate {
        let mut gates = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(Self::cache_key(query)).or_default().clone()
    }

    /// Forget the gate for `query` once its lookup has settled
    pub(crate) fn release(&self, query: &str, gate: &KeyGate) {
        let mut gates = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let key = Self::cache_key(query);
        if gates.get(&key).is_some_and(|current| Arc::ptr_eq(current, gate)) {
            gates.remove(&key);
        }
    }

    /// Cached results for a query, if present and not expired
    pub fn get(&self, query: &str) -> Option<Vec<SearchResult>> {
        let found = self.entries.read().ok().and_then(|entries| {
            entries
                .get(&Self::cache_key(query))
                .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
                .map(|entry| entry.results.clone())
        });

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store results for a query, evicting expired entries (then the oldest) when full
    pub fn insert(&self, query: &str, results: &[SearchResult]) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        if entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        }
        if entries.len() >= self.max_entries {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            Self::cache_key(query),
            CachedEntry {
                results: results.to_vec(),
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().map(|e| e.len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Lower-cased, whitespace-collapsed query
    fn cache_key(query: &str) -> String {
        query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}
