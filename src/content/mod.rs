//! Article content: fetching linked pages, extracting their main text and
//! image, and reducing any HTML to a safe subset.
//!
//! - [`article`] - fetch + Readability extraction behind a shared rate limiter
//! - [`fallback`] - largest-`<article>` extraction straight from markup
//! - [`sanitize`] - the allowlist sanitizer applied to every textual field

mod article;
mod fallback;
mod rate_limit;
mod sanitize;

pub use article::{extract, Article, ArticleFetcher, ContentError};
pub use fallback::largest_article;
pub use rate_limit::RateLimiter;
pub use sanitize::sanitize;
