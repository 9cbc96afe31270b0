use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use quagmire_common::QuagmireResult;

use crate::clock::{Clock, SystemClock};
use crate::store::{ttl_secs, KeyWrite, SessionStore, WriteBatch};

struct Entry {
    value: String,
    expires_at: i64,
}

/// In-process store emulating per-key TTL.
///
/// Each entry carries its expiry timestamp; an entry is treated as absent
/// once the clock reaches it, and is dropped lazily on access or scan.
/// Scan patterns support a single trailing `*`.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        None
    }

    fn insert(&self, key: &str, value: &str, ttl: Duration) {
        let expires_at = self.clock.now() + ttl_secs(ttl) as i64;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn expire(&self, key: &str, ttl: Duration) {
        let now = self.clock.now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.expires_at > now {
                entry.expires_at = now + ttl_secs(ttl) as i64;
            }
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of stored entries, expired ones not yet purged included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_pattern(key: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn ping(&self) -> QuagmireResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> QuagmireResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn exists(&self, key: &str) -> QuagmireResult<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> QuagmireResult<()> {
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn write_batch(&self, batch: &WriteBatch) -> QuagmireResult<()> {
        for write in batch.writes() {
            match write {
                KeyWrite::Set { key, value, ttl } => self.insert(key, value, *ttl),
                KeyWrite::Expire { key, ttl } => self.expire(key, *ttl),
            }
        }
        Ok(())
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> QuagmireResult<(u64, Vec<String>)> {
        self.purge_expired();

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| matches_pattern(entry.key(), pattern))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort_unstable();

        let start = (cursor as usize).min(keys.len());
        let end = start.saturating_add(count.max(1)).min(keys.len());
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next, keys[start..end].to_vec()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
