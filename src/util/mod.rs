//! Utility functions shared by the feed source and the article enricher.
//!
//! - **URL validation**: SSRF-focused checks applied before any outbound request
//! - **URL resolution**: turning relative `src`/`content` attributes into absolute links
//! - **Bounded bodies**: size-capped response reading shared by every fetch
//!
//! # Examples
//!
//! ```
//! use rrss::util::{resolve_link, validate_url, HostPolicy};
//!
//! let url = validate_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! let img = resolve_link("https://example.com/a/post", "../img/cover.png");
//! assert_eq!(img.as_deref(), Some("https://example.com/img/cover.png"));
//! ```

mod body;
mod url_validator;

pub use body::{read_limited_bytes, BodyError};
pub use url_validator::{resolve_link, validate_url, HostPolicy, UrlValidationError};
