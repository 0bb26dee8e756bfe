//! Cache Store: flat key → string pairs with a per-entry TTL.
//!
//! Stores are shared across requests. Writers racing on one key are fine:
//! no caller ever does read-modify-write, so the last write wins.

pub mod file;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{CacheBackend, CacheConfig};

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` for a missing or expired key.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub type DynCacheStore = Arc<dyn CacheStore>;

/// Namespaced cache key, e.g. `youtube-dQw4w9WgXcQ`.
pub fn cache_key(provider: &str, id: &str) -> String {
    format!("{provider}-{id}")
}

/// Build the configured backend.
pub fn build_store(cfg: &CacheConfig) -> Result<DynCacheStore> {
    Ok(match cfg.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::File => Arc::new(FileStore::open(&cfg.dir)?),
    })
}
