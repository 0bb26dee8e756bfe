// tests/common/mod.rs
// Shared mocks for integration tests. Not every test binary uses every helper.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use feed_enricher::error::FeedError;
use feed_enricher::feed::{FeedFetcher, FetchedFeed};
use feed_enricher::resolver::{DurationPage, DurationResolver};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const FIXTURE_FEED: &str = include_str!("../fixtures/youtube_feed.xml");

/// Serves one canned payload, or a fixed upstream status.
pub struct StaticFetcher {
    pub body: String,
    pub content_type: Option<String>,
    pub fail_status: Option<u16>,
}

impl StaticFetcher {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: Some("application/atom+xml; charset=UTF-8".to_string()),
            fail_status: None,
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            body: String::new(),
            content_type: None,
            fail_status: Some(status),
        }
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, source_id: &str) -> Result<FetchedFeed, FeedError> {
        if let Some(status) = self.fail_status {
            return Err(FeedError::NotFound {
                source_id: source_id.to_string(),
                status,
            });
        }
        Ok(FetchedFeed {
            body: self.body.clone(),
            content_type: self.content_type.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// In-memory stand-in for the duration API.
///
/// - ids in `durations` resolve, others are silently absent (like deleted videos)
/// - a call containing any id from `fail_ids` fails outright
/// - with `page_size`, results are paginated and the cursor is the next offset
#[derive(Default)]
pub struct MockResolver {
    pub durations: HashMap<String, u64>,
    pub fail_ids: HashSet<String>,
    pub page_size: Option<usize>,
    pub calls: Mutex<Vec<(Vec<String>, Option<String>)>>,
}

impl MockResolver {
    pub fn with(durations: &[(&str, u64)]) -> Self {
        Self {
            durations: durations
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, ids: &[&str]) -> Self {
        self.fail_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn paginated(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn calls(&self) -> Vec<(Vec<String>, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that started a chunk (no cursor).
    pub fn chunk_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|(_, c)| c.is_none())
            .map(|(ids, _)| ids)
            .collect()
    }
}

#[async_trait]
impl DurationResolver for MockResolver {
    async fn resolve_page(&self, ids: &[String], cursor: Option<&str>) -> Result<DurationPage> {
        self.calls
            .lock()
            .unwrap()
            .push((ids.to_vec(), cursor.map(str::to_string)));

        if ids.iter().any(|id| self.fail_ids.contains(id)) {
            return Err(anyhow!("mock: HTTP 503"));
        }

        let found: Vec<(String, u64)> = ids
            .iter()
            .filter_map(|id| self.durations.get(id).map(|d| (id.clone(), *d)))
            .collect();

        let Some(size) = self.page_size else {
            return Ok(DurationPage {
                items: found,
                next_cursor: None,
            });
        };
        let offset: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (offset + size).min(found.len());
        Ok(DurationPage {
            items: found[offset.min(end)..end].to_vec(),
            next_cursor: (end < found.len()).then(|| end.to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Minimal YouTube-style Atom feed. `None` id ⇒ entry without any identifier.
pub fn atom_feed(entries: &[(Option<&str>, &str)]) -> String {
    let mut body = String::new();
    for (id, title) in entries {
        body.push_str(" <entry>\n");
        if let Some(id) = id {
            body.push_str(&format!("  <id>yt:video:{id}</id>\n"));
            body.push_str(&format!("  <yt:videoId>{id}</yt:videoId>\n"));
        }
        body.push_str(&format!("  <title>{title}</title>\n </entry>\n"));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <title>Test Channel</title>
{body}</feed>
"#
    )
}

/// Titles of the entries in a serialized feed, in document order.
pub fn titles(xml: &str) -> Vec<String> {
    feed_enricher::feed::FeedDocument::parse(xml)
        .unwrap()
        .entries()
        .iter()
        .filter_map(|e| e.title.clone())
        .collect()
}
