//! Signal collection from news feeds.
//!
//! The pipeline consumes signals as one opaque block of text; where that
//! text comes from is hidden behind [`SignalFeed`]. The bundled HTTP
//! implementation reads RSS/Atom feeds with a lightweight tag scanner
//! rather than a full XML parser; feed markup in the wild is too messy
//! for strictness to pay off, and a skipped item costs nothing.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::FeedError;

/// Hours in the initial collection window.
const PRIMARY_WINDOW_HOURS: i64 = 24;

/// Hours in the widened retry window.
const RETRY_WINDOW_HOURS: i64 = 48;

/// Minimum items before the window widens.
const MIN_ITEMS_BEFORE_RETRY: usize = 3;

/// Maximum items taken from one feed.
const MAX_ITEMS_PER_FEED: usize = 8;

/// Maximum items overall.
const MAX_ITEMS_TOTAL: usize = 30;

/// Maximum description length per item.
const MAX_DESCRIPTION_LENGTH: usize = 150;

/// A source of recent market/news signals as plain text.
#[async_trait]
pub trait SignalFeed: Send + Sync {
    /// Fetch recent signals, formatted one per paragraph.
    async fn fetch_signals(&self) -> Result<String, FeedError>;
}

/// A fixed-text feed for tests and dry runs.
pub struct StaticFeed {
    text: String,
}

impl StaticFeed {
    /// Create a feed that always returns `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl SignalFeed for StaticFeed {
    async fn fetch_signals(&self) -> Result<String, FeedError> {
        Ok(self.text.clone())
    }
}

/// Fetches headlines from configured RSS/Atom feeds.
pub struct HttpHeadlineFeed {
    client: reqwest::Client,
    feeds: Vec<String>,
    timeout: Duration,
}

impl HttpHeadlineFeed {
    /// Create a feed over the given URLs.
    pub fn new(feeds: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            feeds,
            timeout: Duration::from_secs(15),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn collect_window(&self, window_hours: i64) -> Vec<String> {
        let cutoff = Utc::now() - ChronoDuration::hours(window_hours);
        let mut items = Vec::new();

        for url in &self.feeds {
            let response = self
                .client
                .get(url)
                .timeout(self.timeout)
                .send()
                .await;

            let xml = match response {
                Ok(response) if response.status().is_success() => {
                    response.text().await.unwrap_or_default()
                }
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "feed fetch failed");
                    continue;
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "feed fetch failed");
                    continue;
                }
            };

            extract_items(&xml, cutoff, &mut items);
            if items.len() >= MAX_ITEMS_TOTAL {
                break;
            }
        }

        items.truncate(MAX_ITEMS_TOTAL);
        items
    }
}

#[async_trait]
impl SignalFeed for HttpHeadlineFeed {
    async fn fetch_signals(&self) -> Result<String, FeedError> {
        if self.feeds.is_empty() {
            return Err(FeedError::NotConfigured);
        }

        let mut items = self.collect_window(PRIMARY_WINDOW_HOURS).await;
        if items.len() < MIN_ITEMS_BEFORE_RETRY {
            info!(
                count = items.len(),
                "too few items in the 24h window, widening to 48h"
            );
            items = self.collect_window(RETRY_WINDOW_HOURS).await;
        }

        Ok(items.join("\n\n"))
    }
}

/// Extract `[News] title: description` lines from RSS or Atom markup.
fn extract_items(xml: &str, cutoff: DateTime<Utc>, collector: &mut Vec<String>) {
    let before = collector.len();

    for block in element_blocks(xml, "item") {
        if collector.len() - before >= MAX_ITEMS_PER_FEED {
            return;
        }
        let title = tag_text(block, "title").map(clean_markup).unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        let description = tag_text(block, "description")
            .map(clean_markup)
            .unwrap_or_default();
        let published = tag_text(block, "pubDate").or_else(|| tag_text(block, "dc:date"));
        if !is_recent(published, cutoff) {
            continue;
        }
        collector.push(format_item(&title, &description));
    }

    if collector.len() > before {
        return;
    }

    for block in element_blocks(xml, "entry") {
        if collector.len() - before >= MAX_ITEMS_PER_FEED {
            return;
        }
        let title = tag_text(block, "title").map(clean_markup).unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        let summary = tag_text(block, "summary")
            .or_else(|| tag_text(block, "content"))
            .map(clean_markup)
            .unwrap_or_default();
        if !is_recent(tag_text(block, "updated"), cutoff) {
            continue;
        }
        collector.push(format_item(&title, &summary));
    }
}

fn format_item(title: &str, description: &str) -> String {
    let truncated: String = description.chars().take(MAX_DESCRIPTION_LENGTH).collect();
    let ellipsis = if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        "..."
    } else {
        ""
    };
    format!("[News] {}: {}{}", title, truncated, ellipsis)
}

/// Successive `<tag …>…</tag>` block bodies within `xml`.
fn element_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        // The match must be the tag itself, not a longer name sharing the prefix.
        match after_open.chars().next() {
            Some('>') | Some(' ') | Some('\n') | Some('\t') => {}
            _ => {
                rest = after_open;
                continue;
            }
        }
        let Some(body_offset) = after_open.find('>') else {
            break;
        };
        let body = &after_open[body_offset + 1..];
        let Some(end) = body.find(&close) else {
            break;
        };
        blocks.push(&body[..end]);
        rest = &body[end + close.len()..];
    }

    blocks
}

/// The text body of the first `<tag>` element in `block`.
fn tag_text<'a>(block: &'a str, tag: &str) -> Option<&'a str> {
    element_blocks(block, tag).into_iter().next()
}

/// Unwrap CDATA, strip tags, collapse whitespace.
fn clean_markup(raw: &str) -> String {
    let trimmed = raw.trim();
    let text = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(trimmed);

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => stripped.push(c),
            _ => {}
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a publication date falls inside the window. Undated or
/// unparseable items count as recent; stale feeds are cheaper to keep
/// than fresh ones are to lose.
fn is_recent(date_text: Option<&str>, cutoff: DateTime<Utc>) -> bool {
    let Some(raw) = date_text else {
        return true;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return true;
    }

    let parsed = DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc));

    match parsed {
        Ok(published) => published >= cutoff,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss><channel>
<item>
  <title><![CDATA[Yields hit a cycle high]]></title>
  <description>Ten-year &lt;b&gt;yields&lt;/b&gt; rose again on heavy supply</description>
  <pubDate>Mon, 03 Aug 2026 09:00:00 +0000</pubDate>
</item>
<item>
  <title>Stale story</title>
  <description>Old news</description>
  <pubDate>Mon, 06 Jan 2020 09:00:00 +0000</pubDate>
</item>
</channel></rss>"#;

    #[test]
    fn test_extract_rss_items_with_window() {
        let cutoff = Utc::now() - ChronoDuration::days(36500);
        let mut items = Vec::new();
        extract_items(RSS_SAMPLE, cutoff, &mut items);
        assert_eq!(items.len(), 2);
        assert!(items[0].starts_with("[News] Yields hit a cycle high:"));
    }

    #[test]
    fn test_stale_items_filtered() {
        let cutoff = DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut items = Vec::new();
        extract_items(RSS_SAMPLE, cutoff, &mut items);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_atom_entries_parsed_when_no_items() {
        let atom = r#"<feed>
<entry><title>Oil rallies</title><summary>Supply cut extended</summary>
<updated>2026-08-03T10:00:00Z</updated></entry>
</feed>"#;
        let cutoff = DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut items = Vec::new();
        extract_items(atom, cutoff, &mut items);
        assert_eq!(items, vec!["[News] Oil rallies: Supply cut extended".to_string()]);
    }

    #[test]
    fn test_undated_items_kept() {
        let xml = "<item><title>No date</title><description>d</description></item>";
        let cutoff = Utc::now();
        let mut items = Vec::new();
        extract_items(xml, cutoff, &mut items);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_clean_markup() {
        assert_eq!(
            clean_markup("<![CDATA[Rates <b>rise</b>   fast]]>"),
            "Rates rise fast"
        );
    }

    #[test]
    fn test_element_blocks_ignores_longer_tag_names() {
        let xml = "<entryGroup>skip</entryGroup><entry>keep</entry>";
        assert_eq!(element_blocks(xml, "entry"), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_static_feed() {
        let feed = StaticFeed::new("[News] one signal");
        assert_eq!(feed.fetch_signals().await.unwrap(), "[News] one signal");
    }

    #[tokio::test]
    async fn test_http_feed_requires_configuration() {
        let feed = HttpHeadlineFeed::new(Vec::new());
        assert!(matches!(
            feed.fetch_signals().await,
            Err(FeedError::NotConfigured)
        ));
    }
}
