pub mod feed_service;

use shared::NewsArticle;
use std::io::Write;

pub use feed_service::{NewsError, NewsService};

pub const DEFAULT_SOURCE: &str = "Google News";

/// Parses an RSS document into articles numbered by feed position.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<NewsArticle>, NewsError> {
    let channel = rss::Channel::read_from(bytes)?;
    let source = Some(channel.title().trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_SOURCE)
        .to_string();

    let articles = channel
        .items()
        .iter()
        .enumerate()
        .map(|(id, item)| NewsArticle {
            id,
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            published: item.pub_date().unwrap_or_default().to_string(),
            summary: item.description().unwrap_or_default().to_string(),
            source: source.clone(),
        })
        .collect();
    Ok(articles)
}

/// Prints up to `limit` entries in the poller's plain-text format and
/// returns how many were written.
pub fn write_entries<W: Write>(
    out: &mut W,
    articles: &[NewsArticle],
    limit: usize,
) -> std::io::Result<usize> {
    let mut written = 0;
    for article in articles.iter().take(limit) {
        writeln!(out, "Title: {}", article.title)?;
        writeln!(out, "Link: {}", article.link)?;
        writeln!(out, "Published: {}", article.published)?;
        writeln!(out, "---")?;
        written += 1;
    }
    Ok(written)
}
