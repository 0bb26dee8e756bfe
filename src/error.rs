//! Fatal request errors. Everything else in the pipeline degrades to
//! "duration unknown" and is only logged.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Upstream answered with a non-success status.
    #[error("feed not found: {source_id} (upstream status {status})")]
    NotFound { source_id: String, status: u16 },

    /// Upstream could not be reached or timed out.
    #[error("feed unreachable: {source_id}: {message}")]
    Unreachable { source_id: String, message: String },

    /// Upstream body is not a feed we can parse.
    #[error("malformed feed: {source_id}: {message}")]
    Malformed { source_id: String, message: String },
}

impl FeedError {
    pub fn source_id(&self) -> &str {
        match self {
            Self::NotFound { source_id, .. }
            | Self::Unreachable { source_id, .. }
            | Self::Malformed { source_id, .. } => source_id,
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        tracing::warn!(target: "api", error = %self, "feed request failed");
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "Not found",
        )
            .into_response()
    }
}
