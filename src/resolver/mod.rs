//! Duration Resolver: external, paginated, batch-size-limited lookup of media
//! durations, plus the chunk protocol the coordinator drives it with.

pub mod iso8601;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use youtube::YouTubeResolver;

use crate::config::MAX_BATCH_SIZE;

/// One page of resolved durations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationPage {
    /// `(identifier, whole seconds)`.
    pub items: Vec<(String, u64)>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait DurationResolver: Send + Sync {
    /// Resolve up to [`MAX_BATCH_SIZE`] identifiers. `Err` means the call
    /// failed outright (transport error or non-success status).
    async fn resolve_page(&self, ids: &[String], cursor: Option<&str>) -> Result<DurationPage>;
    fn name(&self) -> &'static str;
}

pub type DynResolver = Arc<dyn DurationResolver>;

/// Limits applied to one chunk's pagination loop.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    pub max_pages: usize,
    pub call_timeout: Duration,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_pages: 10,
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Run the pagination protocol for one chunk of at most [`MAX_BATCH_SIZE`]
/// identifiers.
///
/// Never fails: a failed or timed-out call ends the loop, and whatever was
/// resolved by earlier pages is still returned. Identifiers missing from the
/// result stay unresolved for this pass.
pub async fn resolve_chunk(
    resolver: &dyn DurationResolver,
    chunk: &[String],
    limits: ChunkLimits,
) -> HashMap<String, u64> {
    debug_assert!(chunk.len() <= MAX_BATCH_SIZE, "chunk larger than batch limit");
    let mut out = HashMap::with_capacity(chunk.len());
    if chunk.is_empty() {
        return out;
    }

    let mut cursor: Option<String> = None;
    for page_no in 0..limits.max_pages.max(1) {
        counter!("resolver_calls_total").increment(1);
        let call = resolver.resolve_page(chunk, cursor.as_deref());
        let page = match tokio::time::timeout(limits.call_timeout, call).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                counter!("resolver_errors_total").increment(1);
                tracing::warn!(
                    target: "resolver",
                    error = ?e,
                    resolver = resolver.name(),
                    chunk_len = chunk.len(),
                    page_no,
                    "resolver call failed; chunk left unresolved"
                );
                break;
            }
            Err(_) => {
                counter!("resolver_errors_total").increment(1);
                tracing::warn!(
                    target: "resolver",
                    resolver = resolver.name(),
                    chunk_len = chunk.len(),
                    page_no,
                    timeout_ms = limits.call_timeout.as_millis() as u64,
                    "resolver call timed out; chunk left unresolved"
                );
                break;
            }
        };

        if page.items.is_empty() {
            break;
        }
        out.extend(page.items);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    out
}

/// Fails every call. Used when no API key is configured, so the pipeline
/// degrades to cache-only enrichment.
pub struct DisabledResolver;

#[async_trait]
impl DurationResolver for DisabledResolver {
    async fn resolve_page(&self, _ids: &[String], _cursor: Option<&str>) -> Result<DurationPage> {
        anyhow::bail!("duration resolver disabled (no API key)")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves scripted pages in order and records the cursors it saw.
    struct Scripted {
        pages: Mutex<Vec<Result<DurationPage>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl Scripted {
        fn new(mut pages: Vec<Result<DurationPage>>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DurationResolver for Scripted {
        async fn resolve_page(
            &self,
            _ids: &[String],
            cursor: Option<&str>,
        ) -> Result<DurationPage> {
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(DurationPage::default()))
        }
        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn page(items: &[(&str, u64)], next: Option<&str>) -> Result<DurationPage> {
        Ok(DurationPage {
            items: items.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            next_cursor: next.map(str::to_string),
        })
    }

    fn ids(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn follows_cursor_until_exhausted() {
        let r = Scripted::new(vec![
            page(&[("a", 10)], Some("p2")),
            page(&[("b", 20)], Some("p3")),
            page(&[("c", 30)], None),
        ]);
        let out = resolve_chunk(&r, &ids(&["a", "b", "c"]), ChunkLimits::default()).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out["c"], 30);
        assert_eq!(
            *r.cursors.lock().unwrap(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn failure_mid_way_keeps_earlier_pages() {
        let r = Scripted::new(vec![
            page(&[("a", 10)], Some("p2")),
            Err(anyhow::anyhow!("HTTP 500")),
        ]);
        let out = resolve_chunk(&r, &ids(&["a", "b"]), ChunkLimits::default()).await;
        assert_eq!(out.get("a"), Some(&10));
        assert_eq!(out.get("b"), None);
    }

    #[tokio::test]
    async fn empty_page_stops_even_with_cursor() {
        let r = Scripted::new(vec![page(&[], Some("again")), page(&[("a", 1)], None)]);
        let out = resolve_chunk(&r, &ids(&["a"]), ChunkLimits::default()).await;
        assert!(out.is_empty());
        assert_eq!(r.cursors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn page_cap_bounds_a_cursor_loop() {
        let pages = (0..20).map(|_| page(&[("a", 1)], Some("same"))).collect();
        let r = Scripted::new(pages);
        let limits = ChunkLimits {
            max_pages: 3,
            ..ChunkLimits::default()
        };
        resolve_chunk(&r, &ids(&["a"]), limits).await;
        assert_eq!(r.cursors.lock().unwrap().len(), 3);
    }

    struct Stalled;

    #[async_trait]
    impl DurationResolver for Stalled {
        async fn resolve_page(
            &self,
            _ids: &[String],
            _cursor: Option<&str>,
        ) -> Result<DurationPage> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            page(&[("a", 1)], None)
        }
        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn timed_out_call_leaves_chunk_unresolved() {
        let limits = ChunkLimits {
            call_timeout: Duration::from_millis(50),
            ..ChunkLimits::default()
        };
        let out = resolve_chunk(&Stalled, &ids(&["a"]), limits).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn disabled_resolver_leaves_everything_unresolved() {
        let out = resolve_chunk(&DisabledResolver, &ids(&["a"]), ChunkLimits::default()).await;
        assert!(out.is_empty());
    }
}
