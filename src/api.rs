use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::error::FeedError;
use crate::pipeline::FeedPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FeedPipeline>,
    /// `max-age` advertised to edge caches on success.
    pub response_max_age_secs: u64,
}

impl AppState {
    pub fn new(pipeline: FeedPipeline, response_max_age_secs: u64) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            response_max_age_secs,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            FeedPipeline::from_config(cfg)?,
            cfg.server.response_max_age_secs,
        ))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/youtube/{channel_id}", get(youtube_feed))
        .fallback(not_found)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn youtube_feed(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Response, FeedError> {
    let feed = state.pipeline.run(&channel_id).await?;
    let cache_control = format!("public, max-age={}", state.response_max_age_secs);
    Ok((
        [
            (header::CONTENT_TYPE, feed.content_type),
            (header::CACHE_CONTROL, cache_control),
        ],
        feed.body,
    )
        .into_response())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not found",
    )
}
