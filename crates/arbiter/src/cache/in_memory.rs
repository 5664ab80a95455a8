use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use arbiter_core::{DecisionResult, IndividualDecisionRequest};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{positive_integer, reject_unknown, ttl, DecisionCache, DecisionCacheFactory};
use crate::error::{CacheError, CacheResult, PdpError, PdpResult};

pub const IN_MEMORY_CACHE_ID: &str = "in-memory";

#[derive(Debug)]
struct Entry {
    result: DecisionResult,
    inserted_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<IndividualDecisionRequest, Entry>,
    /// Insertion sequence -> key, oldest first.
    order: BTreeMap<u64, IndividualDecisionRequest>,
    next_seq: u64,
}

impl Store {
    fn remove(&mut self, request: &IndividualDecisionRequest) {
        if let Some(entry) = self.entries.remove(request) {
            self.order.remove(&entry.seq);
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((_, request)) = self.order.pop_first() {
            self.entries.remove(&request);
        }
    }
}

/// Process-local decision cache with optional TTL and size bound.
#[derive(Debug)]
pub struct InMemoryDecisionCache {
    store: Mutex<Store>,
    ttl: Option<chrono::Duration>,
    max_entries: Option<usize>,
}

fn lock_store(mutex: &Mutex<Store>) -> CacheResult<MutexGuard<'_, Store>> {
    mutex
        .lock()
        .map_err(|e| CacheError::Storage(format!("lock poisoned: {}", e)))
}

impl InMemoryDecisionCache {
    pub fn new(ttl: Option<Duration>, max_entries: Option<usize>) -> CacheResult<Self> {
        let ttl = ttl
            .map(chrono::Duration::from_std)
            .transpose()
            .map_err(|e| CacheError::Storage(format!("invalid TTL: {}", e)))?;
        Ok(Self {
            store: Mutex::new(Store::default()),
            ttl,
            max_entries,
        })
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        lock_store(&self.store).map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - entry.inserted_at > ttl,
            None => false,
        }
    }

    fn get_all_at<'a>(
        &self,
        requests: &'a [IndividualDecisionRequest],
        now: DateTime<Utc>,
    ) -> CacheResult<HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>>> {
        let mut store = lock_store(&self.store)?;
        let mut found = HashMap::with_capacity(requests.len());
        for request in requests {
            let hit = match store.entries.get(request) {
                Some(entry) if self.is_expired(entry, now) => {
                    store.remove(request);
                    None
                }
                Some(entry) => Some(entry.result.clone()),
                None => None,
            };
            found.insert(request, hit);
        }
        Ok(found)
    }

    fn put_all_at(
        &self,
        entries: &[(IndividualDecisionRequest, DecisionResult)],
        now: DateTime<Utc>,
    ) -> CacheResult<()> {
        let mut store = lock_store(&self.store)?;
        for (request, result) in entries {
            store.remove(request);
            if let Some(max) = self.max_entries {
                while store.entries.len() >= max {
                    store.evict_oldest();
                }
            }
            let seq = store.next_seq;
            store.next_seq += 1;
            store.order.insert(seq, request.clone());
            store.entries.insert(
                request.clone(),
                Entry {
                    result: result.clone(),
                    inserted_at: now,
                    seq,
                },
            );
        }
        Ok(())
    }
}

impl DecisionCache for InMemoryDecisionCache {
    fn get_all<'a>(
        &self,
        requests: &'a [IndividualDecisionRequest],
    ) -> CacheResult<HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>>> {
        self.get_all_at(requests, Utc::now())
    }

    fn put_all(&self, entries: &[(IndividualDecisionRequest, DecisionResult)]) -> CacheResult<()> {
        self.put_all_at(entries, Utc::now())
    }

    fn close(self: Box<Self>) -> CacheResult<()> {
        let store = lock_store(&self.store)?;
        debug!(entries = store.entries.len(), "closing in-memory decision cache");
        Ok(())
    }
}

/// Parameters: `ttl_secs`, `max_entries` (both optional).
#[derive(Debug, Default)]
pub struct InMemoryDecisionCacheFactory;

impl InMemoryDecisionCacheFactory {
    fn parse_params(params: &toml::Table) -> PdpResult<(Option<Duration>, Option<usize>)> {
        reject_unknown(IN_MEMORY_CACHE_ID, params, &["ttl_secs", "max_entries"])?;
        let ttl = ttl(IN_MEMORY_CACHE_ID, params)?;
        let max_entries = positive_integer(IN_MEMORY_CACHE_ID, params, "max_entries")?
            .map(usize::try_from)
            .transpose()
            .map_err(|e| PdpError::Config(format!("in-memory cache: max_entries: {}", e)))?;
        Ok((ttl, max_entries))
    }
}

impl DecisionCacheFactory for InMemoryDecisionCacheFactory {
    fn id(&self) -> &str {
        IN_MEMORY_CACHE_ID
    }

    fn validate(&self, params: &toml::Table) -> PdpResult<()> {
        Self::parse_params(params).map(|_| ())
    }

    fn new_cache(&self, params: &toml::Table) -> PdpResult<Box<dyn DecisionCache>> {
        let (ttl, max_entries) = Self::parse_params(params)?;
        Ok(Box::new(InMemoryDecisionCache::new(ttl, max_entries)?))
    }
}
