use feed_rs::parser;

/// One entry of a syndication feed, as handed to the enrichment pipeline.
///
/// Every textual field is raw: `description` may hold arbitrary HTML and
/// nothing here has been sanitized yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    /// Link to the full article, empty when the entry has none.
    pub link: String,
    pub title: String,
    /// Summary (or content body when no summary exists).
    pub description: String,
    /// Publication (or last update) time as RFC 3339, empty when unknown.
    pub published: String,
    /// Provider-supplied identifier (`<guid>` / `<id>`), if the feed carried one.
    pub guid: Option<String>,
}

/// A parsed feed: its title and items in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub items: Vec<FeedItem>,
}

/// Parses RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes into a [`Feed`].
///
/// feed-rs invents an id for entries that lack one; the generator is replaced
/// so those entries come back with `guid: None` and identity resolution can
/// fall through to its own strategies.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed, parser::ParseFeedError> {
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)?;

    let title = feed.title.map(|t| t.content).unwrap_or_default();

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry.title.map(|t| t.content).unwrap_or_default();

            let guid = {
                let trimmed = entry.id.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            };

            FeedItem {
                link,
                title,
                description,
                published,
                guid,
            }
        })
        .collect();

    Ok(Feed { title, items })
}
