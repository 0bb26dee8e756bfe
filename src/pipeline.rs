// src/pipeline.rs
//! fetch → parse → enrich → filter → serialize, for one request.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{build_store, DynCacheStore};
use crate::config::AppConfig;
use crate::enrich::{Enricher, EnrichmentResult};
use crate::error::FeedError;
use crate::feed::{FeedDocument, FeedFetcher, FetchedFeed, HttpFeedFetcher};
use crate::filter::{FilterPolicy, FilterStats};
use crate::resolver::{DisabledResolver, DynResolver, YouTubeResolver};

pub const DEFAULT_CONTENT_TYPE: &str = "text/xml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub entries: usize,
    pub kept: usize,
    pub dropped: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Filtered feed ready to be sent back.
#[derive(Debug, Clone)]
pub struct FilteredFeed {
    pub body: String,
    pub content_type: String,
    pub stats: PassStats,
}

pub struct FeedPipeline {
    fetcher: Arc<dyn FeedFetcher>,
    enricher: Enricher,
    policy: FilterPolicy,
}

impl FeedPipeline {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, enricher: Enricher, policy: FilterPolicy) -> Self {
        Self {
            fetcher,
            enricher,
            policy,
        }
    }

    /// Wire the production collaborators from config.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFeedFetcher::new(
            cfg.feed.upstream_url.clone(),
            Duration::from_secs(cfg.feed.fetch_timeout_secs),
        )?);
        let store: DynCacheStore = build_store(&cfg.cache)?;
        let resolver: DynResolver = if cfg.resolver.api_key.trim().is_empty() {
            tracing::warn!(target: "resolver", "no YouTube API key configured; serving cache-only durations");
            Arc::new(DisabledResolver)
        } else {
            Arc::new(YouTubeResolver::new(
                cfg.resolver.api_base.clone(),
                cfg.resolver.api_key.clone(),
            )?)
        };
        tracing::info!(
            target: "feed",
            fetcher = fetcher.name(),
            store = store.name(),
            resolver = resolver.name(),
            min_duration_secs = cfg.filter.min_duration_secs,
            "feed pipeline ready"
        );
        let enricher = Enricher::from_config(cfg, store, resolver);
        Ok(Self::new(fetcher, enricher, FilterPolicy::from(&cfg.filter)))
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    /// Full request: a failed upstream fetch is the only fatal outcome.
    pub async fn run(&self, source_id: &str) -> Result<FilteredFeed, FeedError> {
        let fetched = self.fetcher.fetch(source_id).await?;
        self.process(source_id, fetched).await
    }

    /// Everything after the fetch.
    pub async fn process(
        &self,
        source_id: &str,
        fetched: FetchedFeed,
    ) -> Result<FilteredFeed, FeedError> {
        let mut doc = FeedDocument::parse(fetched.body).map_err(|e| FeedError::Malformed {
            source_id: source_id.to_string(),
            message: format!("{e:#}"),
        })?;

        let enrichment: EnrichmentResult = self.enricher.enrich(doc.entries()).await;
        let entries = doc.entries().len();
        let FilterStats { kept, dropped } = self.policy.apply(&mut doc, &enrichment);
        let stats = PassStats {
            entries,
            kept,
            dropped,
            resolved: enrichment.resolved_count(),
            unresolved: enrichment.unresolved_count(),
        };

        tracing::info!(
            target: "feed",
            source_id,
            provider = self.enricher.provider(),
            entries,
            kept,
            dropped,
            unresolved = stats.unresolved,
            "feed filtered"
        );

        Ok(FilteredFeed {
            body: doc.to_xml(),
            content_type: fetched
                .content_type
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            stats,
        })
    }
}
