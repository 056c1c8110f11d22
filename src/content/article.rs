use crate::config::Config;
use crate::content::rate_limit::RateLimiter;
use crate::util::{
    read_limited_bytes, resolve_link, validate_url, BodyError, HostPolicy, UrlValidationError,
};
use dom_smoothie::Readability;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Meta tags consulted for a page's representative image, best first.
const IMAGE_META_SELECTORS: &[(&str, &str)] = &[
    (r#"meta[property="og:image:secure_url"]"#, "content"),
    (r#"meta[property="og:image"]"#, "content"),
    (r#"meta[name="og:image"]"#, "content"),
    (r#"meta[name="twitter:image"]"#, "content"),
    (r#"meta[property="twitter:image"]"#, "content"),
    (r#"meta[name="twitter:image:src"]"#, "content"),
    (r#"link[rel="image_src"]"#, "href"),
];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid article URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl From<BodyError> for ContentError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::Network(e) => ContentError::Network(e),
            BodyError::TooLarge(limit) => ContentError::ResponseTooLarge(limit),
            BodyError::Incomplete { expected, received } => {
                ContentError::IncompleteResponse { expected, received }
            }
        }
    }
}

/// Main content pulled out of an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    /// Boilerplate-free article text. Not sanitized yet.
    pub text: String,
    /// Absolute URL of the representative image, empty when none was found.
    pub top_image: String,
}

/// Fetches linked pages and extracts their article content.
///
/// One fetcher is shared by every item of a pipeline run: the HTTP client,
/// host policy and limits are read-only, and the rate limiter is the only
/// state touched concurrently.
#[derive(Debug)]
pub struct ArticleFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    host_policy: HostPolicy,
    timeout: Duration,
    max_size: usize,
}

impl ArticleFetcher {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(config.min_request_interval()),
            host_policy: HostPolicy::from_allow_private(config.allow_private_hosts),
            timeout: config.article_timeout(),
            max_size: config.max_article_size,
        }
    }

    /// Fetches `url` and runs Readability over it.
    ///
    /// # Errors
    ///
    /// - [`ContentError::InvalidUrl`] - scheme or host refused, no request made
    /// - [`ContentError::Timeout`] - page not received within the article timeout
    /// - [`ContentError::HttpStatus`] - non-2xx response
    /// - [`ContentError::ResponseTooLarge`] - page over the size limit
    /// - [`ContentError::Extraction`] - no article content could be identified
    pub async fn enrich(&self, url: &str) -> Result<Article, ContentError> {
        let page_url = validate_url(url, self.host_policy)?;
        let html = self.fetch_html(&page_url).await?;
        let page = page_url.to_string();

        // Readability is CPU-bound on large pages; keep it off the async workers
        let article = tokio::task::spawn_blocking(move || extract(&html, &page))
            .await
            .map_err(|e| ContentError::Extraction(e.to_string()))??;

        tracing::debug!(
            url = %url,
            text_len = article.text.len(),
            has_image = !article.top_image.is_empty(),
            "Article extracted"
        );
        Ok(article)
    }

    /// Fetches the raw markup of an already validated page.
    pub(crate) async fn fetch_html(&self, url: &Url) -> Result<String, ContentError> {
        self.limiter.acquire().await;

        let request = async {
            let response = self.client.get(url.as_str()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ContentError::HttpStatus(status.as_u16()));
            }
            let bytes = read_limited_bytes(response, self.max_size).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        };

        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ContentError::Timeout(self.timeout))?
    }

    pub(crate) fn host_policy(&self) -> HostPolicy {
        self.host_policy
    }
}

/// Separates the primary article from page furniture.
///
/// Runs Readability for the text and picks the representative image from
/// Open Graph/Twitter metadata, falling back to the first image inside the
/// extracted article.
pub fn extract(html: &str, page_url: &str) -> Result<Article, ContentError> {
    // Pages beyond this many elements are not worth the Readability pass
    let cfg = dom_smoothie::Config {
        max_elements_to_parse: 9000,
        ..Default::default()
    };

    let mut readability = Readability::new(html, Some(page_url), Some(cfg))
        .map_err(|e| ContentError::Extraction(e.to_string()))?;
    let parsed = readability
        .parse()
        .map_err(|e| ContentError::Extraction(e.to_string()))?;

    let content_html = parsed.content.to_string();
    let top_image = meta_image(html, page_url)
        .or_else(|| first_image(&content_html, page_url))
        .unwrap_or_default();

    Ok(Article {
        text: parsed.text_content.trim().to_string(),
        top_image,
    })
}

fn meta_image(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    IMAGE_META_SELECTORS.iter().find_map(|(css, attr)| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .find_map(|candidate| resolve_link(page_url, candidate))
    })
}

fn first_image(html: &str, page_url: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("img[src]").ok()?;
    fragment
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| resolve_link(page_url, src))
}
