//! Stable identifiers for feed items.

use crate::content::sanitize;
use crate::feed::FeedItem;
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Builder;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The OS entropy source could not supply random bytes.
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),
}

/// Assigns an identifier to `item`. First match wins:
///
/// 1. The provider's guid, verbatim. A guid carrying markup (`<` or `>`) is
///    replaced by its sanitized form, or skipped if nothing survives.
/// 2. Hex SHA-256 of the raw description, empty or not. Items sharing a
///    description share an id on purpose: re-posts of the same text collapse
///    into one record downstream.
/// 3. A fresh UUIDv7 (unix-millis timestamp plus OS randomness), when the
///    digest comes back empty.
///
/// Only step 3 can fail, and only when the OS entropy source does.
pub fn resolve(item: &FeedItem) -> Result<String, IdentityError> {
    resolve_with(item, os_entropy)
}

/// [`resolve`] with a caller-supplied randomness source for step 3.
pub fn resolve_with<F>(item: &FeedItem, fill_random: F) -> Result<String, IdentityError>
where
    F: FnOnce(&mut [u8]) -> Result<(), IdentityError>,
{
    if let Some(guid) = provider_id(item) {
        tracing::trace!(id = %guid, "Using provided guid as id");
        return Ok(guid);
    }

    let digest = hash_content(&item.description);
    if !digest.is_empty() {
        tracing::trace!("Using hashed description as id");
        return Ok(digest);
    }

    tracing::trace!(title = %item.title, "Falling back to generated UUID id");
    generate_uuid(fill_random)
}

fn provider_id(item: &FeedItem) -> Option<String> {
    let guid = item.guid.as_deref().filter(|g| !g.trim().is_empty())?;
    if !guid.contains(['<', '>']) {
        return Some(guid.to_string());
    }

    let cleaned = sanitize(guid);
    if cleaned.trim().is_empty() {
        tracing::warn!(title = %item.title, "Provided guid is all markup, ignoring it");
        None
    } else {
        tracing::debug!(id = %cleaned, "Provided guid carried markup, using sanitized form");
        Some(cleaned)
    }
}

fn os_entropy(buf: &mut [u8]) -> Result<(), IdentityError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| IdentityError::Entropy(e.to_string()))
}

/// Time-ordered UUIDv7 whose random bits come from `fill_random`.
pub fn generate_uuid<F>(fill_random: F) -> Result<String, IdentityError>
where
    F: FnOnce(&mut [u8]) -> Result<(), IdentityError>,
{
    let mut random = [0u8; 10];
    fill_random(&mut random)?;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Ok(Builder::from_unix_timestamp_millis(millis, &random)
        .into_uuid()
        .to_string())
}

/// Deterministic id for when [`resolve`] fails: SHA-256 over the item's
/// link, title and publication time.
pub fn fallback_id(item: &FeedItem) -> String {
    hash_content(&format!("{}|{}|{}", item.link, item.title, item.published))
}

/// Lowercase hex SHA-256 of `content`.
pub fn hash_content(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}
