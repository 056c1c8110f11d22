//! rrss: turns a syndication feed into sanitized, article-enriched records.
//!
//! ```ignore
//! let records = rrss::parse("https://example.com/rss.xml").await?;
//! for record in &records {
//!     println!("{} {}", record.id, record.item_title);
//! }
//! ```

pub mod config;
pub mod content;
pub mod feed;
pub mod identity;
pub mod pipeline;
pub mod util;

pub use config::Config;
pub use pipeline::{build_client, parse, EnrichedRecord, Pipeline, PipelineError};
