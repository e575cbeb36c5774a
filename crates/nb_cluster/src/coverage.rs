use nb_core::{NewsStore, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Keeps the `StoryCoverage` aggregate in line with the actual article
/// assignments. The stored rows are an optimization; the recount from
/// articles joined with sources is the source of truth.
pub struct CoverageAggregator {
    store: Arc<dyn NewsStore>,
}

impl CoverageAggregator {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }

    /// Recompute coverage for the given stories, typically the ones touched
    /// by a clustering run. One story's failure never blocks the rest;
    /// its rows stay stale until the next run. Idempotent.
    pub async fn recompute(&self, story_ids: &[i64]) -> Result<usize> {
        let mut updated = 0;
        for &story_id in story_ids {
            match self.recompute_story(story_id).await {
                Ok(()) => updated += 1,
                Err(e) => warn!("coverage recompute failed for story {}: {}", story_id, e),
            }
        }
        info!("Updated coverage for {} stories", updated);
        Ok(updated)
    }

    /// Full rebuild over every story, for reconciliation on demand.
    pub async fn recompute_all(&self) -> Result<usize> {
        let ids: Vec<i64> = self
            .store
            .list_stories()
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        self.recompute(&ids).await
    }

    async fn recompute_story(&self, story_id: i64) -> Result<()> {
        let counts = self.store.bias_counts(story_id).await?;
        self.store.replace_coverage(story_id, &counts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_core::storage::{NewArticle, NewSource, NewStory};
    use nb_core::BiasCategory;
    use nb_storage::backends::memory::MemoryStorage;

    async fn seed(store: &MemoryStorage) -> i64 {
        let gov = store
            .add_source(NewSource {
                name: "state radio".to_string(),
                url: "http://radio.example".to_string(),
                feed_url: None,
                bias: BiasCategory::GovOfficial,
            })
            .await
            .unwrap();
        let indie = store
            .add_source(NewSource {
                name: "daily".to_string(),
                url: "http://daily.example".to_string(),
                feed_url: None,
                bias: BiasCategory::IndependentLocal,
            })
            .await
            .unwrap();
        let story = store
            .create_story(NewStory {
                headline: "Flooding hits Mogadishu".to_string(),
                first_seen: chrono::Utc::now(),
            })
            .await
            .unwrap();

        for (i, source_id) in [gov.id, gov.id, indie.id].into_iter().enumerate() {
            let article = store
                .add_article(NewArticle {
                    source_id,
                    url: format!("http://example.com/{}", i),
                    title: "Flooding hits Mogadishu".to_string(),
                    snippet: None,
                    content: None,
                    published_at: None,
                    fetched_at: chrono::Utc::now(),
                })
                .await
                .unwrap()
                .unwrap();
            store.claim_article(article.id, story.id).await.unwrap();
        }
        story.id
    }

    #[tokio::test]
    async fn stored_coverage_matches_recount() {
        let store = Arc::new(MemoryStorage::new());
        let story_id = seed(&store).await;

        let aggregator = CoverageAggregator::new(store.clone());
        assert_eq!(aggregator.recompute(&[story_id]).await.unwrap(), 1);

        let stored = store.coverage_for_story(story_id).await.unwrap();
        let recounted = store.bias_counts(story_id).await.unwrap();
        assert_eq!(
            stored
                .iter()
                .map(|c| (c.bias, c.article_count))
                .collect::<Vec<_>>(),
            recounted
        );

        // Sum of coverage equals the number of assigned articles.
        let total: u32 = stored.iter().map(|c| c.article_count).sum();
        assert_eq!(
            total as usize,
            store.articles_for_story(story_id).await.unwrap().len()
        );
    }

    #[tokio::test]
    async fn recompute_twice_yields_identical_rows() {
        let store = Arc::new(MemoryStorage::new());
        let story_id = seed(&store).await;

        let aggregator = CoverageAggregator::new(store.clone());
        aggregator.recompute(&[story_id]).await.unwrap();
        let first = store.coverage_for_story(story_id).await.unwrap();
        aggregator.recompute(&[story_id]).await.unwrap();
        let second = store.coverage_for_story(story_id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_story_does_not_block_others() {
        let store = Arc::new(MemoryStorage::new());
        let story_id = seed(&store).await;

        let aggregator = CoverageAggregator::new(store.clone());
        // 9999 recounts to an empty set; it simply clears nothing and
        // should not interfere with the valid story.
        let updated = aggregator.recompute(&[9999, story_id]).await.unwrap();
        assert!(updated >= 1);
        assert!(!store.coverage_for_story(story_id).await.unwrap().is_empty());
    }
}
