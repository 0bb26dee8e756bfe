// src/feed/codec.rs
//! Span-preserving Atom/RSS codec.
//!
//! Parsing records the byte range of every `<entry>`/`<item>` element next to
//! the handful of fields the pipeline reads. Serializing copies the original
//! payload and cuts out the ranges of entries that were filtered away, so
//! namespaces, attributes and fields we never looked at survive untouched.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use std::ops::Range;
use time::{format_description::well_known::Rfc2822, format_description::well_known::Rfc3339};
use time::{OffsetDateTime, UtcOffset};

/// One syndicated item. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Dedicated identifier field (`<yt:videoId>`).
    pub video_id: Option<String>,
    /// Atom `<id>` / RSS `<guid>`.
    pub guid: Option<String>,
    pub title: Option<String>,
    /// Unix seconds.
    pub published: Option<i64>,
    pub link: Option<String>,
    /// `<media:description>` (Atom) or `<description>` (RSS).
    pub description: Option<String>,
    span: Range<usize>,
}

impl FeedEntry {
    /// Byte range of this entry in the source payload.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

/// Parsed feed: metadata, ordered entries, and the raw payload they came from.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub title: Option<String>,
    pub link: Option<String>,
    entries: Vec<FeedEntry>,
    all_spans: Vec<Range<usize>>,
    raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    VideoId,
    Guid,
    Title,
    Published,
    Link,
    Description,
}

#[derive(Default)]
struct EntryBuilder {
    start: usize,
    depth: usize,
    video_id: Option<String>,
    guid: Option<String>,
    title: Option<String>,
    published: Option<i64>,
    link: Option<String>,
    description: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, value: String) {
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        match field {
            Field::VideoId => self.video_id = Some(value),
            Field::Guid => self.guid = Some(value),
            Field::Title => self.title = Some(value),
            Field::Published => {
                if self.published.is_none() {
                    self.published = parse_timestamp(&value);
                }
            }
            Field::Link => {
                self.link.get_or_insert(value);
            }
            Field::Description => {
                self.description.get_or_insert(value);
            }
        }
    }

    fn finish(self, end: usize) -> FeedEntry {
        FeedEntry {
            video_id: self.video_id,
            guid: self.guid,
            title: self.title,
            published: self.published,
            link: self.link,
            description: self.description,
            span: self.start..end,
        }
    }
}

fn parse_timestamp(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc2822))
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

fn is_entry(local: &[u8]) -> bool {
    local == b"entry" || local == b"item"
}

fn entry_field(name: &[u8], local: &[u8], direct_child: bool) -> Option<Field> {
    // media:description sits inside media:group, so it is matched at any depth
    if name == b"media:description" {
        return Some(Field::Description);
    }
    if !direct_child {
        return None;
    }
    match (name, local) {
        (b"yt:videoId", _) => Some(Field::VideoId),
        (_, b"id") | (_, b"guid") => Some(Field::Guid),
        (_, b"title") => Some(Field::Title),
        (_, b"published") | (_, b"pubDate") | (_, b"updated") => Some(Field::Published),
        (_, b"link") => Some(Field::Link),
        (b"description", _) => Some(Field::Description),
        _ => None,
    }
}

fn link_href(e: &BytesStart<'_>) -> Result<Option<String>> {
    // Atom: <link rel="alternate" href="..."/>; other rels are ignored
    if let Some(rel) = e.try_get_attribute("rel")? {
        if rel.unescape_value()? != "alternate" {
            return Ok(None);
        }
    }
    match e.try_get_attribute("href")? {
        Some(href) => Ok(Some(href.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

impl FeedDocument {
    /// Parse a raw Atom or RSS payload.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let mut title = None;
        let mut link = None;
        let mut entries = Vec::new();

        {
            let mut reader = Reader::from_str(&raw);
            let mut depth = 0usize;
            let mut current: Option<EntryBuilder> = None;
            // (field, depth of the element, accumulated text)
            let mut capture: Option<(Field, usize, String)> = None;
            let mut meta: Option<(Field, usize, String)> = None;

            loop {
                let before = reader.buffer_position() as usize;
                let event = reader
                    .read_event()
                    .with_context(|| format!("parsing feed xml at byte {before}"))?;
                match event {
                    Event::Start(e) => {
                        depth += 1;
                        let name = e.name();
                        let local = e.local_name();
                        if let Some(cur) = current.as_ref() {
                            if capture.is_none() {
                                let direct = depth == cur.depth + 1;
                                if let Some(f) = entry_field(name.as_ref(), local.as_ref(), direct)
                                {
                                    capture = Some((f, depth, String::new()));
                                }
                            }
                        } else if is_entry(local.as_ref()) {
                            current = Some(EntryBuilder {
                                start: before,
                                depth,
                                ..Default::default()
                            });
                        } else if meta.is_none() && entries.is_empty() {
                            meta = match local.as_ref() {
                                b"title" if title.is_none() => Some((Field::Title, depth, String::new())),
                                b"link" if link.is_none() => Some((Field::Link, depth, String::new())),
                                _ => None,
                            };
                        }
                    }
                    Event::Empty(e) => {
                        if e.local_name().as_ref() != b"link" {
                            continue;
                        }
                        match current.as_mut() {
                            Some(cur) if depth == cur.depth => {
                                if let Some(href) = link_href(&e)? {
                                    cur.set(Field::Link, href);
                                }
                            }
                            None if link.is_none() && entries.is_empty() => {
                                link = link_href(&e)?;
                            }
                            _ => {}
                        }
                    }
                    Event::Text(t) => {
                        let buf = match (capture.as_mut(), meta.as_mut()) {
                            (Some((_, _, buf)), _) | (None, Some((_, _, buf))) => buf,
                            (None, None) => continue,
                        };
                        // Feeds in the wild carry HTML entities that are not valid XML
                        match t.unescape() {
                            Ok(text) => buf.push_str(&text),
                            Err(_) => buf.push_str(&String::from_utf8_lossy(&t)),
                        }
                    }
                    Event::CData(c) => {
                        if let Some((_, _, buf)) = capture.as_mut().or(meta.as_mut()) {
                            buf.push_str(&String::from_utf8_lossy(&c));
                        }
                    }
                    Event::End(_) => {
                        if capture.as_ref().is_some_and(|(_, d, _)| *d == depth) {
                            if let (Some((field, _, text)), Some(cur)) =
                                (capture.take(), current.as_mut())
                            {
                                cur.set(field, text);
                            }
                        }
                        if meta.as_ref().is_some_and(|(_, d, _)| *d == depth) {
                            if let Some((field, _, text)) = meta.take() {
                                let text = text.trim().to_string();
                                if !text.is_empty() {
                                    match field {
                                        Field::Title => title = Some(text),
                                        _ => link = Some(text),
                                    }
                                }
                            }
                        }
                        if current.as_ref().is_some_and(|cur| cur.depth == depth) {
                            let end = reader.buffer_position() as usize;
                            if let Some(cur) = current.take() {
                                entries.push(cur.finish(end));
                            }
                        }
                        depth = depth.saturating_sub(1);
                    }
                    Event::Eof => break,
                    _ => {}
                }
            }
        }

        let all_spans = entries.iter().map(FeedEntry::span).collect();
        Ok(Self {
            title,
            link,
            entries,
            all_spans,
            raw,
        })
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    /// Stable subsequence selection: order of the survivors never changes.
    pub fn retain_entries<F>(&mut self, mut keep: F)
    where
        F: FnMut(&FeedEntry) -> bool,
    {
        self.entries.retain(|e| keep(e));
    }

    /// Serialize back to the original format, minus removed entries.
    pub fn to_xml(&self) -> String {
        let kept: HashSet<usize> = self.entries.iter().map(|e| e.span.start).collect();
        let mut out = String::with_capacity(self.raw.len());
        let mut cursor = 0usize;
        for span in &self.all_spans {
            if kept.contains(&span.start) {
                continue;
            }
            out.push_str(&self.raw[cursor..span.start]);
            cursor = skip_whitespace(&self.raw, span.end);
        }
        out.push_str(&self.raw[cursor..]);
        out
    }
}

fn skip_whitespace(s: &str, from: usize) -> usize {
    let rest = &s[from..];
    from + (rest.len() - rest.trim_start().len())
}
