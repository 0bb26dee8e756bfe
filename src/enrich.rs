//! Enrichment Coordinator.
//!
//! One pass per request: cache lookups for every distinct identifier, the
//! misses split into batch-limit chunks and resolved through the resolver's
//! pagination protocol, fresh values written back, all joined before the
//! result is handed to the filter. Nothing in here can fail the request;
//! every fault degrades to "duration unknown".

use metrics::{counter, histogram};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{cache_key, DynCacheStore};
use crate::config::{AppConfig, DEFAULT_CACHE_TTL_SECS, MAX_BATCH_SIZE};
use crate::feed::{extract_identifier, FeedEntry};
use crate::resolver::{resolve_chunk, ChunkLimits, DynResolver};

/// identifier → duration in seconds; `None` means unresolved, never zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentResult {
    durations: HashMap<String, Option<u64>>,
}

impl EnrichmentResult {
    /// Known duration for `id`, if any.
    pub fn get(&self, id: &str) -> Option<u64> {
        self.durations.get(id).copied().flatten()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.durations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.durations.values().filter(|d| d.is_some()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.len() - self.resolved_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.durations.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, Option<u64>)> for EnrichmentResult {
    fn from_iter<I: IntoIterator<Item = (String, Option<u64>)>>(iter: I) -> Self {
        Self {
            durations: iter.into_iter().collect(),
        }
    }
}

pub struct Enricher {
    store: DynCacheStore,
    resolver: DynResolver,
    provider: String,
    ttl: Duration,
    batch_size: usize,
    limits: ChunkLimits,
    max_concurrency: usize,
    cache_timeout: Duration,
}

impl Enricher {
    pub fn new(store: DynCacheStore, resolver: DynResolver) -> Self {
        Self {
            store,
            resolver,
            provider: "youtube".to_string(),
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            batch_size: MAX_BATCH_SIZE,
            limits: ChunkLimits::default(),
            max_concurrency: 16,
            cache_timeout: Duration::from_secs(2),
        }
    }

    pub fn from_config(cfg: &AppConfig, store: DynCacheStore, resolver: DynResolver) -> Self {
        Self::new(store, resolver)
            .with_provider(&cfg.cache.provider_prefix)
            .with_ttl(Duration::from_secs(cfg.cache.ttl_secs))
            .with_batch_size(cfg.resolver.batch_size)
            .with_limits(ChunkLimits {
                max_pages: cfg.resolver.max_pages,
                call_timeout: Duration::from_secs(cfg.resolver.call_timeout_secs),
            })
            .with_max_concurrency(cfg.enrich.max_concurrency)
            .with_cache_timeout(Duration::from_millis(cfg.cache.op_timeout_ms))
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Clamped to `1..=MAX_BATCH_SIZE`.
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_limits(mut self, limits: ChunkLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_cache_timeout(mut self, t: Duration) -> Self {
        self.cache_timeout = t;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Enrich every entry with an extractable identifier.
    pub async fn enrich(&self, entries: &[FeedEntry]) -> EnrichmentResult {
        let mut seen = HashSet::new();
        let ids: Vec<String> = entries
            .iter()
            .filter_map(extract_identifier)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        self.enrich_ids(&ids).await
    }

    /// Same as [`Enricher::enrich`] for bare identifiers. Duplicates collapse.
    pub async fn enrich_ids(&self, ids: &[String]) -> EnrichmentResult {
        crate::metrics::ensure_described();
        let t0 = Instant::now();
        let mut durations: HashMap<String, Option<u64>> =
            ids.iter().map(|id| (id.clone(), None)).collect();
        if durations.is_empty() {
            return EnrichmentResult { durations };
        }
        let sem = Arc::new(Semaphore::new(self.max_concurrency));

        // 1) cache lookups
        let hits = self.lookup(durations.keys().cloned().collect(), &sem).await;
        let hit_count = hits.len();
        for (id, secs) in hits {
            durations.insert(id, Some(secs));
        }

        // 2) resolve misses in chunks, first-seen order
        let mut requested = HashSet::new();
        let misses: Vec<String> = ids
            .iter()
            .filter(|id| durations.get(*id).is_some_and(|d| d.is_none()))
            .filter(|id| requested.insert(id.as_str()))
            .cloned()
            .collect();
        counter!("enrich_cache_hits_total").increment(hit_count as u64);
        counter!("enrich_cache_misses_total").increment(misses.len() as u64);

        let fresh = self.resolve_misses(&misses, &sem).await;

        // 3) write back, then join before handing the result out
        self.write_back(&fresh, &sem).await;

        let fresh_count = fresh.len();
        for (id, secs) in fresh {
            durations.insert(id, Some(secs));
        }

        let result = EnrichmentResult { durations };
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("enrich_pass_ms").record(ms);
        tracing::info!(
            target: "enrich",
            provider = %self.provider,
            ids = result.len(),
            cache_hits = hit_count,
            misses = misses.len(),
            resolved = fresh_count,
            unresolved = result.unresolved_count(),
            elapsed_ms = ms as u64,
            "enrichment pass done"
        );
        result
    }

    async fn lookup(&self, ids: Vec<String>, sem: &Arc<Semaphore>) -> HashMap<String, u64> {
        let mut set = JoinSet::new();
        for id in ids {
            let store = Arc::clone(&self.store);
            let sem = Arc::clone(sem);
            let key = cache_key(&self.provider, &id);
            let timeout = self.cache_timeout;
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let res = tokio::time::timeout(timeout, store.get(&key)).await;
                (id, key, res)
            });
        }

        let mut hits = HashMap::new();
        while let Some(joined) = set.join_next().await {
            let (id, key, res) = match joined {
                Ok(v) => v,
                Err(e) => {
                    counter!("enrich_cache_errors_total").increment(1);
                    tracing::warn!(target: "cache", error = ?e, "cache lookup task failed");
                    continue;
                }
            };
            match res {
                Ok(Ok(Some(raw))) => match raw.trim().parse::<u64>() {
                    Ok(secs) => {
                        hits.insert(id, secs);
                    }
                    Err(_) => {
                        tracing::warn!(target: "cache", %key, value = %raw, "non-numeric cached duration; treating as miss");
                    }
                },
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    counter!("enrich_cache_errors_total").increment(1);
                    tracing::warn!(target: "cache", %key, error = ?e, "cache get failed; treating as miss");
                }
                Err(_) => {
                    counter!("enrich_cache_errors_total").increment(1);
                    tracing::warn!(target: "cache", %key, "cache get timed out; treating as miss");
                }
            }
        }
        hits
    }

    async fn resolve_misses(&self, misses: &[String], sem: &Arc<Semaphore>) -> HashMap<String, u64> {
        let mut set = JoinSet::new();
        for (chunk_no, chunk) in misses.chunks(self.batch_size).enumerate() {
            let resolver = Arc::clone(&self.resolver);
            let sem = Arc::clone(sem);
            let chunk = chunk.to_vec();
            let limits = self.limits;
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let got = resolve_chunk(resolver.as_ref(), &chunk, limits).await;
                tracing::debug!(
                    target: "enrich",
                    chunk_no,
                    requested = chunk.len(),
                    resolved = got.len(),
                    "chunk resolved"
                );
                got
            });
        }

        let wanted: HashSet<&str> = misses.iter().map(String::as_str).collect();
        let mut fresh = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(got) => {
                    // the API may echo ids we never asked for; ignore those
                    fresh.extend(got.into_iter().filter(|(id, _)| wanted.contains(id.as_str())));
                }
                Err(e) => {
                    tracing::warn!(target: "enrich", error = ?e, "chunk task failed; chunk left unresolved");
                }
            }
        }
        fresh
    }

    async fn write_back(&self, fresh: &HashMap<String, u64>, sem: &Arc<Semaphore>) {
        let mut set = JoinSet::new();
        for (id, secs) in fresh {
            let store = Arc::clone(&self.store);
            let sem = Arc::clone(sem);
            let key = cache_key(&self.provider, id);
            let value = secs.to_string();
            let ttl = self.ttl;
            let timeout = self.cache_timeout;
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let res = tokio::time::timeout(timeout, store.put(&key, &value, ttl)).await;
                (key, res)
            });
        }

        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok((_, Ok(Ok(())))) => continue,
                Ok((key, Ok(Err(e)))) => format!("{key}: {e:#}"),
                Ok((key, Err(_))) => format!("{key}: timed out"),
                Err(e) => e.to_string(),
            };
            counter!("enrich_cache_write_errors_total").increment(1);
            tracing::warn!(target: "cache", error = %failure, "cache put failed; value used for this response only");
        }
    }
}
