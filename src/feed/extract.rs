// src/feed/extract.rs
//! Identifier extraction: which video does a feed entry point at?

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::feed::codec::FeedEntry;

const ATOM_ID_PREFIX: &str = "yt:video:";

/// Stable identifier of an entry, or `None` when the entry carries none of the
/// fields enrichable items are guaranteed to have.
///
/// Order: `<yt:videoId>`, then an Atom id of the form `yt:video:<ID>`, then the
/// `v=` parameter or `/shorts/<ID>` segment of the entry link.
pub fn extract_identifier(entry: &FeedEntry) -> Option<String> {
    if let Some(id) = entry.video_id.as_deref().filter(|s| is_video_id(s)) {
        return Some(id.to_string());
    }
    if let Some(id) = entry
        .guid
        .as_deref()
        .and_then(|g| g.strip_prefix(ATOM_ID_PREFIX))
        .filter(|s| is_video_id(s))
    {
        return Some(id.to_string());
    }
    entry.link.as_deref().and_then(id_from_link)
}

/// Pull a video id out of a watch or shorts URL.
pub fn id_from_link(link: &str) -> Option<String> {
    static RE_LINK: OnceCell<Regex> = OnceCell::new();
    let re = RE_LINK.get_or_init(|| {
        Regex::new(r"(?:[?&]v=|/shorts/|youtu\.be/)(?P<id>[A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)")
            .unwrap()
    });
    re.captures(link)
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str().to_string())
}

fn is_video_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
