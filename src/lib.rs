// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod filter;
pub mod metrics;
pub mod pipeline;
pub mod resolver;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::enrich::{Enricher, EnrichmentResult};
pub use crate::error::FeedError;
pub use crate::filter::FilterPolicy;
pub use crate::pipeline::{FeedPipeline, FilteredFeed};

/// Build the in-process app from `config/feed.toml` (or `$FEED_CONFIG_PATH`)
/// and the environment. No metrics recorder is installed here.
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = AppConfig::load_default()?;
    let state = AppState::from_config(&cfg)?;
    Ok(router(state))
}
