// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for token metadata lookups.
//!
//! Symbol and name rarely change, so they are cached per mint in front of
//! the oracle's `metadata_for_wallet`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::oracle::TokenMetadata;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct CacheEntry {
    metadata: TokenMetadata,
    inserted_at: Instant,
}

pub struct MetadataCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl MetadataCache {
    /// Create a cache holding at most `capacity` mints (minimum 1).
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    pub fn get(&self, mint: &str) -> Option<TokenMetadata> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(mint) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.metadata.clone());
            }
            cache.pop(mint);
        }
        None
    }

    /// Split `mints` into cached metadata and the mints still to fetch.
    pub fn partition(&self, mints: &[String]) -> (HashMap<String, TokenMetadata>, Vec<String>) {
        let mut hits = HashMap::new();
        let mut misses = Vec::new();
        for mint in mints {
            match self.get(mint) {
                Some(metadata) => {
                    hits.insert(mint.clone(), metadata);
                }
                None => misses.push(mint.clone()),
            }
        }
        (hits, misses)
    }

    pub fn put_all(&self, entries: &HashMap<String, TokenMetadata>) {
        if let Ok(mut cache) = self.cache.lock() {
            let now = Instant::now();
            for (mint, metadata) in entries {
                cache.put(
                    mint.clone(),
                    CacheEntry {
                        metadata: metadata.clone(),
                        inserted_at: now,
                    },
                );
            }
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
