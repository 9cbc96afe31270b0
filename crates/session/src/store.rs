use std::time::Duration;

use async_trait::async_trait;
use quagmire_common::QuagmireResult;

/// One command inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyWrite {
    /// `SET key value EX ttl`
    Set { key: String, value: String, ttl: Duration },
    /// `EXPIRE key ttl`. Leaves an absent key absent.
    Expire { key: String, ttl: Duration },
}

impl KeyWrite {
    pub fn key(&self) -> &str {
        match self {
            KeyWrite::Set { key, .. } | KeyWrite::Expire { key, .. } => key,
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            KeyWrite::Set { ttl, .. } | KeyWrite::Expire { ttl, .. } => *ttl,
        }
    }
}

/// Writes that must land together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<KeyWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ex(mut self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        self.writes.push(KeyWrite::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    /// Reset the TTL of `key` without touching its value.
    pub fn expire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.writes.push(KeyWrite::Expire { key: key.into(), ttl });
        self
    }

    pub fn writes(&self) -> &[KeyWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Remote key-value store with per-key expiry.
///
/// Implementations map every failure to
/// [`QuagmireError::StoreUnavailable`](quagmire_common::QuagmireError::StoreUnavailable).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn ping(&self) -> QuagmireResult<()>;

    async fn get(&self, key: &str) -> QuagmireResult<Option<String>>;

    async fn exists(&self, key: &str) -> QuagmireResult<bool>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> QuagmireResult<()>;

    /// Apply every write of `batch` atomically.
    async fn write_batch(&self, batch: &WriteBatch) -> QuagmireResult<()>;

    /// One page of a cursor scan over keys matching a `prefix*` pattern.
    ///
    /// Start with cursor `0`; the scan is complete when the returned cursor
    /// is `0` again. Keys may repeat across pages.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> QuagmireResult<(u64, Vec<String>)>;

    fn backend_name(&self) -> &'static str;
}

/// Store TTLs are whole seconds and must be positive.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
