use chrono::{DateTime, Utc};
use nb_core::{Error, NewsStore, Result, Source};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::feed::articles_from_feed;

/// Counters for one ingestion pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub sources_checked: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

/// Fetches every source's feed and appends new articles, deduplicated on
/// URL. Articles land unclustered; the clustering engine picks them up on
/// its next run.
pub struct FeedIngestor {
    store: Arc<dyn NewsStore>,
    client: reqwest::Client,
}

impl FeedIngestor {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("nb-feed-ingestor/0.1")
            .build()
            .unwrap_or_default();
        Self { store, client }
    }

    /// One pass over all sources. A failing source is logged and skipped;
    /// it never stops the rest.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        for source in self.store.list_sources().await? {
            if source.feed_url.is_none() {
                continue;
            }
            info!("Fetching feed for source: {}", source.name);
            match self.ingest_source(&source, now).await {
                Ok((inserted, duplicates)) => {
                    info!(
                        "{}: {} new articles, {} duplicates",
                        source.name, inserted, duplicates
                    );
                    summary.sources_checked += 1;
                    summary.inserted += inserted;
                    summary.duplicates += duplicates;
                    if let Err(e) = self.store.touch_source(source.id, now).await {
                        warn!("failed to update last_checked for {}: {}", source.name, e);
                    }
                }
                Err(e) => warn!("failed to ingest {}: {}", source.name, e),
            }
        }
        info!(
            "Ingestion complete: {} sources, {} new articles",
            summary.sources_checked, summary.inserted
        );
        Ok(summary)
    }

    async fn ingest_source(
        &self,
        source: &Source,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize)> {
        let feed_url = source
            .feed_url
            .as_deref()
            .ok_or_else(|| Error::Feed(format!("source {} has no feed URL", source.name)))?;

        let bytes = self
            .client
            .get(feed_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Feed(format!("{}: {}", feed_url, e)))?
            .bytes()
            .await
            .map_err(|e| Error::Feed(format!("{}: {}", feed_url, e)))?;

        let feed = feed_rs::parser::parse(bytes.as_ref())
            .map_err(|e| Error::Feed(format!("{}: {}", feed_url, e)))?;

        let mut inserted = 0;
        let mut duplicates = 0;
        for article in articles_from_feed(source.id, &feed, now) {
            match self.store.add_article(article).await? {
                Some(_) => inserted += 1,
                None => duplicates += 1,
            }
        }
        Ok((inserted, duplicates))
    }
}
