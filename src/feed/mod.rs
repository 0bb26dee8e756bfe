// src/feed/mod.rs
pub mod codec;
pub mod extract;
pub mod fetch;

pub use codec::{FeedDocument, FeedEntry};
pub use extract::extract_identifier;
pub use fetch::{FeedFetcher, FetchedFeed, HttpFeedFetcher};
