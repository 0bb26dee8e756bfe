use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose a static gauge for the cache TTL.
    /// Only one recorder can exist per process.
    pub fn init(cache_ttl_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_described();

        // Absolute TTL, no sliding refresh
        gauge!("enrich_cache_ttl_secs").set(cache_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("enrich_cache_hits_total", "Identifiers answered from the cache.");
        describe_counter!(
            "enrich_cache_misses_total",
            "Identifiers sent to the duration resolver."
        );
        describe_counter!(
            "enrich_cache_errors_total",
            "Cache reads that failed or timed out (treated as misses)."
        );
        describe_counter!(
            "enrich_cache_write_errors_total",
            "Cache writes that failed or timed out (swallowed)."
        );
        describe_counter!("resolver_calls_total", "Duration resolver page calls.");
        describe_counter!(
            "resolver_errors_total",
            "Duration resolver calls that failed or timed out."
        );
        describe_counter!("feed_entries_kept_total", "Entries that passed the filter.");
        describe_counter!(
            "feed_entries_dropped_total",
            "Entries removed for being shorter than the threshold."
        );
        describe_counter!(
            "feed_fetch_errors_total",
            "Upstream feed fetches that failed (fatal for the request)."
        );
        describe_histogram!("enrich_pass_ms", "Enrichment pass wall time in milliseconds.");
        describe_gauge!("enrich_cache_ttl_secs", "TTL applied to resolved durations.");
    });
}
