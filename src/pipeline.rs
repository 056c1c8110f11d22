//! Enrichment orchestrator: feed in, one sanitized record per item out.
//!
//! # Concurrency
//!
//! Items are enriched through an unordered buffered stream: at most
//! `max_concurrent_fetches` items are in flight, and a slow item only holds
//! its own slot. Each future yields its feed index with the record, and the
//! single consumer drops it into a pre-sized slot vector, so output follows
//! feed order and no collection is shared between tasks.
//!
//! # Cancellation
//!
//! Every run has a deadline (`pipeline_timeout_secs`) and honours an
//! external [`CancellationToken`]. Either one abandons pending article
//! fetches; the affected items are still emitted, just without extended
//! content, so the record count always matches the item count.

use crate::config::{Config, ConfigError};
use crate::content::{sanitize, Article, ArticleFetcher};
use crate::feed::{fetch_feed, FeedItem, FetchError};
use crate::identity;
use crate::util::{resolve_link, validate_url, HostPolicy};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stand-in deadline when the configured budget overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// One enriched feed item.
///
/// Every textual field has been through [`sanitize`]; `item_url` and
/// `item_image` are absolute http(s) URLs or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    pub id: String,
    pub feed_url: String,
    pub feed_title: String,
    pub item_image: String,
    pub item_title: String,
    pub item_body: String,
    pub item_url: String,
    pub item_extended_body: String,
    pub published: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The feed itself could not be retrieved or parsed. No records exist.
    #[error("Failed to retrieve feed '{url}': {source}")]
    Feed {
        url: String,
        #[source]
        source: FetchError,
    },
    /// Cancelled before the feed was retrieved.
    #[error("Cancelled before feed '{0}' was retrieved")]
    Cancelled(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds the transport shared by the feed source and the article fetcher.
pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .pool_idle_timeout(config.idle_timeout())
        .user_agent(config.user_agent.as_str())
        .build()
}

/// Per-run state borrowed by every item future.
struct RunContext<'a> {
    feed_url: &'a str,
    feed_title: &'a str,
    total: usize,
    cancel: &'a CancellationToken,
    deadline: Instant,
}

impl RunContext<'_> {
    fn interrupted(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }
}

/// The enrichment pipeline. Cheap to reuse across feeds.
#[derive(Debug)]
pub struct Pipeline {
    client: reqwest::Client,
    fetcher: ArticleFetcher,
    config: Config,
}

impl Pipeline {
    /// Validates `config` and builds a client from it.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self::with_client(client, config))
    }

    /// Uses a caller-configured client for both feed and article requests.
    pub fn with_client(client: reqwest::Client, config: Config) -> Self {
        let fetcher = ArticleFetcher::new(client.clone(), &config);
        Self {
            client,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The article fetcher, for one-off extraction outside a pipeline run.
    pub fn fetcher(&self) -> &ArticleFetcher {
        &self.fetcher
    }

    /// Enriches every item of the feed at `feed_url`.
    ///
    /// # Returns
    ///
    /// One [`EnrichedRecord`] per feed item, in feed order. Article failures
    /// never remove a record; they leave its extended body and image empty.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Feed`] when the feed cannot be retrieved or parsed.
    pub async fn run(&self, feed_url: &str) -> Result<Vec<EnrichedRecord>, PipelineError> {
        self.run_with_cancel(feed_url, CancellationToken::new())
            .await
    }

    /// [`Pipeline::run`] that stops waiting on articles once `cancel` fires.
    ///
    /// Cancelling before the feed arrives yields [`PipelineError::Cancelled`];
    /// cancelling afterwards still returns a complete record list.
    pub async fn run_with_cancel(
        &self,
        feed_url: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<EnrichedRecord>, PipelineError> {
        tracing::info!(feed = %feed_url, "Received feed url");
        let started = Instant::now();
        let deadline = started
            .checked_add(self.config.pipeline_timeout())
            .unwrap_or_else(|| started + FAR_FUTURE);

        // Records carry the normalized URL, which percent-encodes markup
        let policy = HostPolicy::from_allow_private(self.config.allow_private_hosts);
        let feed_url = validate_url(feed_url, policy)
            .map_err(|e| PipelineError::Feed {
                url: feed_url.to_string(),
                source: e.into(),
            })?
            .to_string();
        let feed_url = feed_url.as_str();

        let feed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(PipelineError::Cancelled(feed_url.to_string()));
            }
            result = fetch_feed(&self.client, feed_url, &self.config) => {
                result.map_err(|source| {
                    tracing::warn!(feed = %feed_url, error = %source, "Feed retrieval failed");
                    PipelineError::Feed {
                        url: feed_url.to_string(),
                        source,
                    }
                })?
            }
        };

        let feed_title = sanitize(&feed.title);
        tracing::info!(
            feed = %feed_url,
            title = %feed_title,
            items = feed.items.len(),
            "Parsing feed"
        );

        let ctx = RunContext {
            feed_url,
            feed_title: &feed_title,
            total: feed.items.len(),
            cancel: &cancel,
            deadline,
        };
        let ctx = &ctx;

        let mut slots: Vec<Option<EnrichedRecord>> = vec![None; feed.items.len()];
        let mut completed = stream::iter(feed.items.iter().enumerate())
            .map(|(index, item)| async move { (index, self.enrich_item(ctx, index, item).await) })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1));

        while let Some((index, record)) = completed.next().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(record);
            }
        }
        let records: Vec<EnrichedRecord> = slots.into_iter().flatten().collect();

        tracing::info!(
            feed = %feed_url,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Parsed feed"
        );
        Ok(records)
    }

    async fn enrich_item(
        &self,
        ctx: &RunContext<'_>,
        index: usize,
        item: &FeedItem,
    ) -> EnrichedRecord {
        let id = identity::resolve(item).unwrap_or_else(|e| {
            let fallback = identity::fallback_id(item);
            tracing::warn!(
                error = %e,
                fallback_id = %fallback,
                title = %item.title,
                "Failed to generate id, using link/title digest"
            );
            fallback
        });

        let item_url = resolve_link(ctx.feed_url, &item.link).unwrap_or_default();

        let article = if item.link.trim().is_empty() {
            tracing::debug!(id = %id, title = %item.title, "Item has no link, skipping extended fetch");
            Article::default()
        } else if item_url.is_empty() {
            tracing::warn!(id = %id, link = %item.link, "Item link is not an http(s) URL, skipping extended fetch");
            Article::default()
        } else {
            self.fetch_article(ctx, &id, &item_url).await
        };

        let record = EnrichedRecord {
            item_extended_body: sanitize(&article.text),
            item_body: sanitize(&item.description),
            item_title: sanitize(&item.title),
            item_image: article.top_image,
            id,
            feed_url: ctx.feed_url.to_string(),
            feed_title: ctx.feed_title.to_string(),
            item_url,
            published: item.published.clone(),
            created: Utc::now(),
        };

        tracing::debug!(
            id = %record.id,
            feed = %record.feed_url,
            extended_len = record.item_extended_body.len(),
            item = index + 1,
            total = ctx.total,
            "Item enriched"
        );
        record
    }

    /// Fetches and extracts one article, then observes the pacing delay.
    /// Every failure degrades to an empty [`Article`].
    async fn fetch_article(&self, ctx: &RunContext<'_>, id: &str, url: &str) -> Article {
        if ctx.interrupted() {
            tracing::warn!(id = %id, url = %url, "Pipeline stopped, skipping extended fetch");
            return Article::default();
        }

        tracing::debug!(id = %id, url = %url, "Fetching extended article");
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            _ = tokio::time::sleep_until(ctx.deadline) => None,
            result = self.fetcher.enrich(url) => Some(result),
        };

        let article = match outcome {
            Some(Ok(article)) => article,
            Some(Err(e)) => {
                tracing::warn!(id = %id, url = %url, error = %e, "Failed to fetch extended article");
                Article::default()
            }
            None => {
                tracing::warn!(id = %id, url = %url, "Pipeline stopped, abandoned extended fetch");
                return Article::default();
            }
        };

        let pacing = self.config.fetch_pacing();
        if !pacing.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep_until(ctx.deadline) => {}
                _ = tokio::time::sleep(pacing) => {}
            }
        }

        article
    }
}

/// Enriches `feed_url` with the default configuration.
pub async fn parse(feed_url: &str) -> Result<Vec<EnrichedRecord>, PipelineError> {
    Pipeline::new(Config::default())?.run(feed_url).await
}
