// src/resolver/youtube.rs
//! YouTube Data API v3 `videos.list?part=contentDetails` resolver.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{iso8601, DurationPage, DurationResolver};
use crate::config::MAX_BATCH_SIZE;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: Option<String>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

pub struct YouTubeResolver {
    http: Client,
    api_base: String,
    api_key: String,
}

impl YouTubeResolver {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building youtube http client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn page_from(body: VideoListResponse) -> DurationPage {
        let mut items = Vec::with_capacity(body.items.len());
        for item in body.items {
            let (Some(id), Some(raw)) = (item.id, item.content_details.and_then(|c| c.duration))
            else {
                continue;
            };
            match iso8601::to_seconds(&raw) {
                // P0D: upcoming premiere or live stream, length not known yet
                Ok(0) => {
                    tracing::debug!(target: "resolver", video_id = %id, duration = %raw, "zero duration; left unresolved")
                }
                Ok(secs) => items.push((id, secs)),
                Err(e) => {
                    tracing::warn!(target: "resolver", error = %e, video_id = %id, "unparsable duration")
                }
            }
        }
        DurationPage {
            items,
            next_cursor: body.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl DurationResolver for YouTubeResolver {
    async fn resolve_page(&self, ids: &[String], cursor: Option<&str>) -> Result<DurationPage> {
        if ids.len() > MAX_BATCH_SIZE {
            return Err(anyhow!(
                "{} ids exceed the batch limit of {MAX_BATCH_SIZE}",
                ids.len()
            ));
        }

        let joined = ids.join(",");
        let max_results = MAX_BATCH_SIZE.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("part", "contentDetails"),
            ("id", joined.as_str()),
            ("maxResults", max_results.as_str()),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }

        let resp = self
            .http
            .get(format!("{}/videos", self.api_base))
            .query(&query)
            .send()
            .await
            .context("youtube videos.list request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("youtube videos.list returned {status}"));
        }

        let body: VideoListResponse = resp
            .json()
            .await
            .context("decoding youtube videos.list response")?;
        Ok(Self::page_from(body))
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}
