//! Feed source: turns a feed URL into a title and an ordered list of items.
//!
//! - [`parser`] - RSS/Atom/JSON Feed parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP retrieval with retry, timeout and size limits
//!
//! # Example
//!
//! ```ignore
//! use rrss::feed::fetch_feed;
//!
//! let feed = fetch_feed(&client, "https://example.com/rss.xml", &config).await?;
//! println!("{} has {} items", feed.title, feed.items.len());
//! ```

mod fetcher;
mod parser;

pub use fetcher::{fetch_feed, FetchError};
pub use parser::{parse_feed, Feed, FeedItem};
