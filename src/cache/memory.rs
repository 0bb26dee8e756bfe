use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::CacheStore;

/// Writes between full sweeps of expired entries.
const SWEEP_EVERY: u64 = 256;

/// Process-local store. Expired entries are dropped on read, and every
/// [`SWEEP_EVERY`] writes the whole map is swept.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, (String, Instant)>,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.entries.values().filter(|(_, exp)| *exp > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries held in memory, expired or not.
    #[cfg(test)]
    fn stored(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match inner.entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => {
                return Ok(Some(value.clone()))
            }
            Some(_) => {}
            None => return Ok(None),
        }
        inner.entries.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = now + ttl;
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), expires_at));
        inner.writes += 1;
        if inner.writes % SWEEP_EVERY == 0 {
            let before = inner.entries.len();
            inner.entries.retain(|_, (_, exp)| *exp > now);
            tracing::debug!(
                target: "cache",
                evicted = before - inner.entries.len(),
                live = inner.entries.len(),
                "memory cache swept"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
