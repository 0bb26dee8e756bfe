//! Filter Policy: keep/drop per entry given its (possibly unknown) duration.

use metrics::counter;

use crate::config::{FilterConfig, DEFAULT_MIN_DURATION_SECS};
use crate::enrich::EnrichmentResult;
use crate::feed::{extract_identifier, FeedDocument, FeedEntry};

const SHORTS_TAG: &str = "#shorts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Entries strictly shorter than this are dropped.
    pub min_duration_secs: u64,
    /// Also drop entries tagged `#shorts` in title or description.
    pub drop_shorts_tag: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            drop_shorts_tag: false,
        }
    }
}

impl From<&FilterConfig> for FilterPolicy {
    fn from(cfg: &FilterConfig) -> Self {
        Self {
            min_duration_secs: cfg.min_duration_secs,
            drop_shorts_tag: cfg.drop_shorts_tag,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub dropped: usize,
}

impl FilterPolicy {
    pub fn keep(&self, entry: &FeedEntry, result: &EnrichmentResult) -> bool {
        if self.drop_shorts_tag && has_shorts_tag(entry) {
            return false;
        }
        match extract_identifier(entry) {
            None => true,
            Some(id) => self.keep_duration(result.get(&id)),
        }
    }

    /// Unknown duration is never evidence of a violation.
    pub fn keep_duration(&self, duration: Option<u64>) -> bool {
        duration.map_or(true, |d| d >= self.min_duration_secs)
    }

    /// Drop failing entries in place; survivors keep their upstream order.
    pub fn apply(&self, doc: &mut FeedDocument, result: &EnrichmentResult) -> FilterStats {
        let before = doc.entries().len();
        doc.retain_entries(|e| self.keep(e, result));
        let kept = doc.entries().len();
        let stats = FilterStats {
            kept,
            dropped: before - kept,
        };
        counter!("feed_entries_kept_total").increment(stats.kept as u64);
        counter!("feed_entries_dropped_total").increment(stats.dropped as u64);
        stats
    }
}

fn has_shorts_tag(entry: &FeedEntry) -> bool {
    [entry.title.as_deref(), entry.description.as_deref()]
        .into_iter()
        .flatten()
        .any(|s| s.to_ascii_lowercase().contains(SHORTS_TAG))
}
