use crate::config::Config;
use crate::feed::parser::{parse_feed, Feed};
use crate::util::{read_limited_bytes, validate_url, BodyError, HostPolicy, UrlValidationError};
use std::time::Duration;
use thiserror::Error;

const MAX_RETRIES: u32 = 3;

/// Errors that can occur while retrieving a feed.
///
/// Any of these aborts the whole pipeline run: without the feed there are no
/// items to enrich.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL failed validation (bad scheme, private host, etc.)
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured feed timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl From<BodyError> for FetchError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::Network(e) => FetchError::Network(e),
            BodyError::TooLarge(limit) => FetchError::ResponseTooLarge(limit),
            BodyError::Incomplete { expected, received } => {
                FetchError::IncompleteResponse { expected, received }
            }
        }
    }
}

/// Downloads and parses the feed at `url`.
///
/// # Behavior
///
/// - The URL is validated first; private hosts are refused unless
///   `config.allow_private_hosts` is set
/// - Each attempt is bounded by `config.feed_timeout_secs`
/// - HTTP 429 and 5xx responses, and truncated bodies, are retried with
///   exponential backoff (2s, 4s, 8s) up to 3 times
/// - Other non-2xx responses fail immediately
/// - The body is capped at `config.max_feed_size`
///
/// # Errors
///
/// Returns a [`FetchError`] describing why no feed could be produced.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    config: &Config,
) -> Result<Feed, FetchError> {
    let validated = validate_url(url, HostPolicy::from_allow_private(config.allow_private_hosts))?;
    let mut retry_count = 0;

    let bytes = loop {
        let response = tokio::time::timeout(
            config.feed_timeout(),
            client.get(validated.as_str()).send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= MAX_RETRIES {
                return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    FetchError::RateLimited(MAX_RETRIES)
                } else {
                    FetchError::HttpStatus(status.as_u16())
                });
            }

            let delay_secs = 2u64.pow(retry_count + 1); // 2s, 4s, 8s
            tracing::warn!(
                feed = %url,
                status = %status,
                retry = retry_count,
                delay_secs = delay_secs,
                "Feed server busy, retrying after delay"
            );

            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            retry_count += 1;
            continue;
        }

        // 4xx and other non-success statuses fail immediately
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, config.max_feed_size).await {
            Ok(bytes) => break bytes,
            Err(BodyError::Incomplete { expected, received }) if retry_count < MAX_RETRIES => {
                let delay_secs = 2u64.pow(retry_count + 1);
                tracing::debug!(
                    feed = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    delay_secs = delay_secs,
                    "Retrying incomplete feed download"
                );

                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
            }
            Err(e) => return Err(e.into()),
        }
    };

    let feed = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    tracing::debug!(
        feed = %url,
        title = %feed.title,
        items = feed.items.len(),
        "Feed retrieved"
    );
    Ok(feed)
}
