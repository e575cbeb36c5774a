use chrono::{DateTime, Utc};
use feed_rs::model::Feed;
use nb_core::storage::NewArticle;
use scraper::Html;

/// Flatten feed markup (summaries frequently arrive as HTML fragments)
/// into plain text.
pub fn strip_markup(fragment: &str) -> String {
    let document = Html::parse_fragment(fragment);
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map feed entries onto article insert payloads. Entries without a link or
/// a title carry nothing we can cluster on and are dropped.
pub fn articles_from_feed(
    source_id: i64,
    feed: &Feed,
    fetched_at: DateTime<Utc>,
) -> Vec<NewArticle> {
    feed.entries
        .iter()
        .filter_map(|entry| {
            let url = entry.links.first()?.href.clone();
            let title = entry.title.as_ref()?.content.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let snippet = entry
                .summary
                .as_ref()
                .map(|s| strip_markup(&s.content))
                .filter(|s| !s.is_empty());
            Some(NewArticle {
                source_id,
                url,
                title,
                snippet,
                content: None,
                published_at: entry.published,
                fetched_at,
            })
        })
        .collect()
}
