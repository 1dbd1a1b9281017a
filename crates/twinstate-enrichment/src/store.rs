//! Bounded, expiring store of projections

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use twinstate_core::rules::revision;

use crate::key::CacheKey;

#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub projection: Value,
    pub revision: u64,
    written_at: Instant,
    seq: u64,
}

/// Result of a guarded write
#[derive(Debug, PartialEq)]
pub(crate) enum PutOutcome {
    /// Written; carries keys evicted to stay within capacity
    Stored { evicted: Vec<CacheKey> },
    /// Dropped: the stored revision is as new or newer
    Stale { existing: u64 },
}

/// Entries ordered by write sequence so the oldest write is evicted first
#[derive(Debug)]
pub(crate) struct EntryStore {
    entries: HashMap<CacheKey, StoredEntry>,
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
    maximum_size: usize,
    expire_after_write: Duration,
}

impl EntryStore {
    pub fn new(maximum_size: usize, expire_after_write: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            maximum_size,
            expire_after_write,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&StoredEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Write `projection` at `revision` unless an equal or newer revision is stored
    pub fn put(&mut self, key: &CacheKey, projection: Value, revision: u64, now: Instant) -> PutOutcome {
        let existing = self.entries.get(key).map(|e| e.revision);
        if revision::is_stale_write(existing, revision) {
            return PutOutcome::Stale {
                existing: existing.unwrap_or_default(),
            };
        }

        self.remove(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key.clone(),
            StoredEntry {
                projection,
                revision,
                written_at: now,
                seq,
            },
        );

        let mut evicted = Vec::new();
        while self.entries.len() > self.maximum_size {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted.push(oldest);
        }
        PutOutcome::Stored { evicted }
    }

    /// Remove the entry for `key`, returning whether one was present
    pub fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    /// Drop every entry written longer ago than the expiry, returning their keys
    pub fn expire(&mut self, now: Instant) -> Vec<CacheKey> {
        let mut expired = Vec::new();
        while let Some((&seq, key)) = self.order.first_key_value() {
            let is_expired = match self.entries.get(key) {
                Some(entry) => now.duration_since(entry.written_at) >= self.expire_after_write,
                None => true,
            };
            if !is_expired {
                break;
            }
            let key = key.clone();
            self.order.remove(&seq);
            self.entries.remove(&key);
            expired.push(key);
        }
        expired
    }
}
