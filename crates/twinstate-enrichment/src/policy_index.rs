//! Reverse index from policy id to the cache keys governed by it

use std::collections::{HashMap, HashSet};

use twinstate_core::EntityId;

use crate::key::CacheKey;

/// Which cached projections depend on which policy
///
/// Keeps forward and reverse maps in step so a key is indexed under at most
/// one policy and never under a policy it no longer references.
#[derive(Debug, Default)]
pub struct PolicyIndex {
    by_policy: HashMap<EntityId, HashSet<CacheKey>>,
    by_key: HashMap<CacheKey, EntityId>,
}

impl PolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` is governed by `policy_id`
    ///
    /// Idempotent. An association with a different policy is replaced and
    /// `None` removes any association.
    pub fn record(&mut self, policy_id: Option<&EntityId>, key: &CacheKey) {
        if let Some(current) = self.by_key.get(key) {
            if Some(current) == policy_id {
                return;
            }
        }
        self.remove_key(key);
        if let Some(policy_id) = policy_id {
            self.by_policy
                .entry(policy_id.clone())
                .or_default()
                .insert(key.clone());
            self.by_key.insert(key.clone(), policy_id.clone());
        }
    }

    /// Forget `key`, returning the policy it was indexed under
    pub fn remove_key(&mut self, key: &CacheKey) -> Option<EntityId> {
        let policy_id = self.by_key.remove(key)?;
        if let Some(keys) = self.by_policy.get_mut(&policy_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_policy.remove(&policy_id);
            }
        }
        Some(policy_id)
    }

    /// Remove and return every key governed by `policy_id`
    pub fn take_dependents(&mut self, policy_id: &EntityId) -> Vec<CacheKey> {
        let keys: Vec<CacheKey> = self
            .by_policy
            .remove(policy_id)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default();
        for key in &keys {
            self.by_key.remove(key);
        }
        keys
    }

    pub fn dependents(&self, policy_id: &EntityId) -> usize {
        self.by_policy.get(policy_id).map_or(0, HashSet::len)
    }

    pub fn policy_of(&self, key: &CacheKey) -> Option<&EntityId> {
        self.by_key.get(key)
    }

    /// Number of indexed keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
