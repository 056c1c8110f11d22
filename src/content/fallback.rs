//! Markup-level article extraction, independent of Readability.
//!
//! Useful when the Readability pass rejects a page or keeps too little of
//! it: every `<article>` container is sanitized and the largest one wins.
//! Never chained automatically by the pipeline.

use crate::content::article::{ArticleFetcher, ContentError};
use crate::content::sanitize::sanitize;
use crate::util::validate_url;
use scraper::{Html, Selector};

/// Returns the largest sanitized `<article>` element of `html`, or an empty
/// string when the page has none. Ties keep the earliest candidate.
pub fn largest_article(html: &str) -> String {
    let Ok(selector) = Selector::parse("article") else {
        return String::new();
    };

    Html::parse_document(html)
        .select(&selector)
        .map(|el| sanitize(&el.inner_html()))
        .fold(String::new(), |best, candidate| {
            if candidate.len() > best.len() {
                candidate
            } else {
                best
            }
        })
}

impl ArticleFetcher {
    /// Fetches `url` and returns its largest sanitized `<article>` markup.
    ///
    /// Shares validation, rate limiting, timeout and size limits with
    /// [`ArticleFetcher::enrich`].
    ///
    /// # Errors
    ///
    /// Fails on an invalid URL, network error, timeout, oversized body or a
    /// non-2xx status. A page without `<article>` elements is not an error.
    pub async fn extract_article_markup(&self, url: &str) -> Result<String, ContentError> {
        let page_url = validate_url(url, self.host_policy())?;
        let html = self.fetch_html(&page_url).await?;
        let article = largest_article(&html);

        tracing::debug!(
            url = %url,
            body_len = article.len(),
            "Fallback article extraction finished"
        );
        Ok(article)
    }
}
