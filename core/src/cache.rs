//! Bounded, TTL-expiring cache in front of the ranker.
//!
//! Entries are evicted least-recently-used first once `max_entries` is
//! reached, and an entry older than `ttl` is never handed out. Concurrent
//! misses on the same key are collapsed: one caller computes, the others
//! block until it publishes.

use crate::error::Result;
use crate::search::{SearchKey, SearchResponse};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    value: Arc<SearchResponse>,
    created_at: Instant,
    last_used: u64,
}

#[derive(Default)]
struct Flight {
    // None while computing; Some(None) when the leader failed
    outcome: Mutex<Option<Option<Arc<SearchResponse>>>>,
    done: Condvar,
}

impl Flight {
    fn finish(&self, value: Option<Arc<SearchResponse>>) {
        *self.outcome.lock() = Some(value);
        self.done.notify_all();
    }

    fn wait(&self) -> Option<Arc<SearchResponse>> {
        let mut outcome = self.outcome.lock();
        while outcome.is_none() {
            self.done.wait(&mut outcome);
        }
        outcome.clone().flatten()
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SearchKey, Entry>,
    recency: BTreeMap<u64, SearchKey>,
    in_flight: HashMap<SearchKey, Arc<Flight>>,
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &SearchKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_used);
        }
    }

    fn touch(&mut self, key: &SearchKey) -> Option<Arc<SearchResponse>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.last_used);
        entry.last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(entry.value.clone())
    }
}

/// Removes the in-flight marker for `key` and wakes its waiters, caching
/// `value` if the computation produced one. Runs on unwind too, so a
/// panicking computation releases the key instead of stranding waiters.
struct Leader<'a> {
    cache: &'a SearchCache,
    key: &'a SearchKey,
    value: Option<Arc<SearchResponse>>,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        let flight = {
            let mut inner = self.cache.inner.lock();
            if let Some(value) = &self.value {
                self.cache.insert_locked(&mut inner, self.key.clone(), value.clone());
            }
            inner.in_flight.remove(self.key)
        };
        if let Some(flight) = flight {
            flight.finish(self.value.take());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Miss,
}

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ENTRIES: usize = 128;

pub struct SearchCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl SearchCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { inner: Mutex::new(Inner::default()), ttl, max_entries: max_entries.max(1) }
    }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    /// Live cached value for `key`, refreshing its recency. Expired entries are dropped.
    pub fn get(&self, key: &SearchKey) -> Option<Arc<SearchResponse>> {
        let mut inner = self.inner.lock();
        self.get_locked(&mut inner, key)
    }

    fn get_locked(&self, inner: &mut Inner, key: &SearchKey) -> Option<Arc<SearchResponse>> {
        let expired = inner.entries.get(key)?.created_at.elapsed() >= self.ttl;
        if expired {
            inner.remove(key);
            return None;
        }
        inner.touch(key)
    }

    pub fn insert(&self, key: SearchKey, value: Arc<SearchResponse>) {
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, key, value);
    }

    fn insert_locked(&self, inner: &mut Inner, key: SearchKey, value: Arc<SearchResponse>) {
        inner.remove(&key);
        while inner.entries.len() >= self.max_entries {
            let Some((_, oldest)) = inner.recency.pop_first() else { break };
            inner.entries.remove(&oldest);
            tracing::debug!(query = %oldest.query, "evicted least recently used search");
        }
        let tick = inner.next_tick();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, Entry { value, created_at: Instant::now(), last_used: tick });
    }

    /// Return the cached response for `key`, or run `compute` once and cache its result.
    ///
    /// Errors are returned to the caller that computed and are not cached;
    /// callers that were waiting on a failed computation retry it themselves.
    pub fn get_or_compute<F>(&self, key: &SearchKey, compute: F) -> Result<(Arc<SearchResponse>, Lookup)>
    where
        F: Fn() -> Result<SearchResponse>,
    {
        loop {
            let flight = {
                let mut inner = self.inner.lock();
                if let Some(hit) = self.get_locked(&mut inner, key) {
                    return Ok((hit, Lookup::Hit));
                }
                match inner.in_flight.get(key) {
                    Some(flight) => Some(flight.clone()),
                    None => {
                        inner.in_flight.insert(key.clone(), Arc::new(Flight::default()));
                        None
                    }
                }
            };

            if let Some(flight) = flight {
                match flight.wait() {
                    Some(value) => return Ok((value, Lookup::Hit)),
                    None => continue,
                }
            }

            // this caller leads the computation for `key`
            let mut leader = Leader { cache: self, key, value: None };
            let outcome = compute().map(Arc::new);
            leader.value = outcome.as_ref().ok().cloned();
            drop(leader);
            return outcome.map(|value| (value, Lookup::Miss));
        }
    }
}
