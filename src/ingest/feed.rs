// src/ingest/feed.rs
//! Syndication document parsing (RSS 2.0, RSS 1.0/RDF, Atom, JSON Feed).

use anyhow::{Context, Result};
use feed_rs::{model::Entry, parser};
use metrics::histogram;

/// Entry fields the aggregator cares about, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
}

impl From<Entry> for FeedEntry {
    fn from(e: Entry) -> Self {
        // rel defaults to "alternate" when absent
        let link = e
            .links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| e.links.first())
            .map(|l| l.href.clone());
        Self {
            title: e.title.map(|t| t.content),
            link,
            summary: e
                .summary
                .map(|s| s.content)
                .or_else(|| e.content.and_then(|c| c.body)),
        }
    }
}

/// Parse a feed document into entries, preserving document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let feed = parser::parse(xml_clean.as_bytes())
        .context("unsupported or malformed feed document")?;
    let entries: Vec<FeedEntry> = feed.entries.into_iter().map(FeedEntry::from).collect();

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

/// HTML named entities are not valid XML; feeds still ship them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
