// src/ingest/mod.rs
//! Feed aggregation: fetch every configured source, keep the head of each feed,
//! normalize into `NewsItem`s. Fails fast on the first broken source.

pub mod feed;
pub mod http;
pub mod types;

use std::sync::Arc;

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::ingest::feed::{parse_feed, FeedEntry};
use crate::ingest::types::{FeedFetcher, FeedSource, NewsItem};

/// Items kept per source, in feed order.
pub const MAX_ITEMS_PER_SOURCE: usize = 5;
/// Snippet budget in chars (not bytes, not display width).
pub const SNIPPET_MAX_CHARS: usize = 100;

pub const NO_TITLE: &str = "No Title";
pub const NO_URL: &str = "#";
pub const NO_SNIPPET: &str = "No snippet available.";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_total", "News items kept after aggregation.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Sources that failed to fetch or parse (aborts the run)."
        );
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to process feed from \"{source_name}\" ({source_url}). Reason: {cause}. Please check if the URL is a valid RSS feed.")]
pub struct FeedFetchError {
    pub source_name: String,
    pub source_url: String,
    pub cause: String,
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cap to `SNIPPET_MAX_CHARS`, marking the cut with "...".
pub fn make_snippet(raw: Option<&str>) -> String {
    let text = raw.map(normalize_text).unwrap_or_default();
    if text.is_empty() {
        return NO_SNIPPET.to_string();
    }
    if text.chars().count() > SNIPPET_MAX_CHARS {
        let mut cut: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text
    }
}

fn to_news_item(entry: FeedEntry) -> NewsItem {
    let title = entry
        .title
        .as_deref()
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());
    let url = entry
        .link
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_URL.to_string());
    NewsItem {
        title,
        url,
        snippet: make_snippet(entry.summary.as_deref()),
    }
}

/// Turn a fetched document into at most `MAX_ITEMS_PER_SOURCE` items.
pub fn items_from_document(body: &str) -> anyhow::Result<Vec<NewsItem>> {
    let entries = parse_feed(body)?;
    Ok(entries
        .into_iter()
        .take(MAX_ITEMS_PER_SOURCE)
        .map(to_news_item)
        .collect())
}

/// Reads a snapshot of sources and produces the aggregated article set.
#[derive(Clone)]
pub struct FeedAggregator {
    fetcher: Arc<dyn FeedFetcher>,
}

impl FeedAggregator {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self { fetcher }
    }

    /// Sources are processed in order; the first failure aborts the batch and
    /// nothing from later sources is fetched.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> Result<Vec<NewsItem>, FeedFetchError> {
        ensure_metrics_described();

        let mut all = Vec::with_capacity(sources.len() * MAX_ITEMS_PER_SOURCE);
        for src in sources {
            let items = match self.fetch_source(src).await {
                Ok(items) => items,
                Err(e) => {
                    counter!("feed_fetch_errors_total").increment(1);
                    tracing::warn!(
                        target: "ingest",
                        source = %src.name,
                        url = %src.url,
                        error = %format!("{e:#}"),
                        "feed source failed; aborting aggregation"
                    );
                    return Err(FeedFetchError {
                        source_name: src.name.clone(),
                        source_url: src.url.clone(),
                        cause: format!("{e:#}"),
                    });
                }
            };
            tracing::debug!(target: "ingest", source = %src.name, kept = items.len(), "feed source ok");
            all.extend(items);
        }

        counter!("feed_items_total").increment(all.len() as u64);
        Ok(all)
    }

    async fn fetch_source(&self, src: &FeedSource) -> anyhow::Result<Vec<NewsItem>> {
        let body = self.fetcher.fetch(&src.url).await?;
        items_from_document(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <p>Hello&amp;<b>world</b></p>\n\t ok ";
        assert_eq!(normalize_text(s), "Hello& world ok");
    }

    #[test]
    fn snippet_under_budget_is_untouched() {
        assert_eq!(make_snippet(Some("short text")), "short text");
    }

    #[test]
    fn snippet_over_budget_is_cut_with_ellipsis() {
        let s = "a".repeat(150);
        let out = make_snippet(Some(&s));
        assert_eq!(out.chars().count(), SNIPPET_MAX_CHARS + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn snippet_counts_chars_not_bytes() {
        let s = "あ".repeat(100);
        assert_eq!(make_snippet(Some(&s)), s);
        let longer = "あ".repeat(101);
        let out = make_snippet(Some(&longer));
        assert_eq!(out, format!("{}...", "あ".repeat(100)));
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let item = to_news_item(FeedEntry::default());
        assert_eq!(item.title, NO_TITLE);
        assert_eq!(item.url, NO_URL);
        assert_eq!(item.snippet, NO_SNIPPET);
    }
}
