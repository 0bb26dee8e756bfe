// src/feed/fetch.rs
use async_trait::async_trait;
use metrics::counter;
use reqwest::{header, Client};
use std::time::Duration;

use crate::error::FeedError;

/// Raw upstream payload plus the content type it was served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeed {
    pub body: String,
    pub content_type: Option<String>,
}

/// Upstream feed source. Any failure here is fatal for the request.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source_id: &str) -> Result<FetchedFeed, FeedError>;
    fn name(&self) -> &'static str;
}

/// Plain HTTP GET of `<upstream_url>?channel_id=<id>`.
pub struct HttpFeedFetcher {
    client: Client,
    upstream_url: String,
}

impl HttpFeedFetcher {
    pub fn new(upstream_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            upstream_url: upstream_url.into(),
        })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source_id: &str) -> Result<FetchedFeed, FeedError> {
        let to_unreachable = |e: reqwest::Error| {
            counter!("feed_fetch_errors_total").increment(1);
            FeedError::Unreachable {
                source_id: source_id.to_string(),
                message: e.to_string(),
            }
        };

        let resp = self
            .client
            .get(&self.upstream_url)
            .query(&[("channel_id", source_id)])
            .send()
            .await
            .map_err(to_unreachable)?;

        let status = resp.status();
        if !status.is_success() {
            counter!("feed_fetch_errors_total").increment(1);
            return Err(FeedError::NotFound {
                source_id: source_id.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.map_err(to_unreachable)?;
        tracing::debug!(target: "feed", source_id, bytes = body.len(), "upstream feed fetched");
        Ok(FetchedFeed { body, content_type })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
