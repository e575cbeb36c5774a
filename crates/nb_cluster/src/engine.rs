use chrono::{DateTime, Utc};
use nb_core::storage::NewStory;
use nb_core::{Article, ClusterConfig, NewsStore, Result, Story};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::similarity::SimilarityScorer;

/// Outcome counters for one clustering run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Unclustered articles the run looked at.
    pub examined: usize,
    /// Articles assigned to a pre-existing story.
    pub assigned: usize,
    /// Stories created for articles with no match.
    pub created: usize,
    /// Articles left unclustered (persistence failure, lost claim race,
    /// or missing source); the next run retries them.
    pub skipped: usize,
    /// Ids of every story that gained an article, for coverage recompute.
    pub touched_stories: Vec<i64>,
}

/// The batch clustering pass: assigns every unclustered article within the
/// recency window to its best-matching story, or creates a new one.
///
/// Stateless between runs; all state lives in the store. Safe to re-run at
/// any time: the null-story filter means a completed run finds nothing to
/// do, and the compare-and-set claim keeps overlapping runs from
/// double-assigning an article.
pub struct ClusteringEngine {
    store: Arc<dyn NewsStore>,
    scorer: Arc<dyn SimilarityScorer>,
    config: ClusterConfig,
}

impl ClusteringEngine {
    /// Fails fast on invalid configuration; a run with bad parameters would
    /// produce meaningless assignments.
    pub fn new(
        store: Arc<dyn NewsStore>,
        scorer: Arc<dyn SimilarityScorer>,
        config: ClusterConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            scorer,
            config,
        })
    }

    /// One sequential pass over the unclustered articles, oldest first.
    /// Stories created mid-run join the candidate set for later articles.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let articles = self
            .store
            .unclustered_articles(now, self.config.window_days)
            .await?;
        info!("Found {} unclustered articles", articles.len());

        let mut summary = RunSummary {
            examined: articles.len(),
            ..Default::default()
        };
        if articles.is_empty() {
            return Ok(summary);
        }

        let mut candidates = self
            .store
            .recent_stories(now, self.config.window_days)
            .await?;
        info!("Found {} recent stories for matching", candidates.len());

        let sources: HashMap<i64, _> = self
            .store
            .list_sources()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut touched = BTreeSet::new();
        for article in &articles {
            if !sources.contains_key(&article.source_id) {
                warn!(
                    "article {} references missing source {}, skipping",
                    article.id, article.source_id
                );
                summary.skipped += 1;
                continue;
            }

            match self.place_article(article, &mut candidates).await {
                Ok(Placement::Assigned(story_id)) => {
                    touched.insert(story_id);
                    summary.assigned += 1;
                }
                Ok(Placement::Created(story_id)) => {
                    touched.insert(story_id);
                    summary.created += 1;
                }
                Ok(Placement::Lost) => summary.skipped += 1,
                Err(e) => {
                    // Leave the article unclustered; the next scheduled run
                    // picks it up again.
                    warn!("failed to place article {}: {}", article.id, e);
                    summary.skipped += 1;
                }
            }
        }

        summary.touched_stories = touched.into_iter().collect();
        info!(
            "Clustering complete: {} assigned, {} new stories, {} skipped",
            summary.assigned, summary.created, summary.skipped
        );
        Ok(summary)
    }

    async fn place_article(
        &self,
        article: &Article,
        candidates: &mut Vec<Story>,
    ) -> Result<Placement> {
        let text = article.comparison_text();

        let mut best: Option<(usize, f64)> = None;
        for (idx, story) in candidates.iter().enumerate() {
            let score = self.scorer.score(&text, &story.comparison_text());
            let better = match best {
                None => score > 0.0,
                Some((best_idx, best_score)) => {
                    score > best_score
                        // Exact tie: prefer the more recently active story.
                        || (score == best_score
                            && story.last_updated > candidates[best_idx].last_updated)
                }
            };
            if better {
                best = Some((idx, score));
            }
        }

        if let Some((idx, score)) = best {
            if score >= self.config.similarity_threshold {
                let story_id = candidates[idx].id;
                if !self.store.claim_article(article.id, story_id).await? {
                    warn!(
                        "article {} already claimed by a concurrent run",
                        article.id
                    );
                    return Ok(Placement::Lost);
                }
                info!(
                    "Assigned article {} to story {} (score: {:.2})",
                    article.id, story_id, score
                );
                // Assignment is already durable; a failed bump only delays
                // the activity timestamp until the next run touches it.
                if let Err(e) = self.store.bump_story(story_id, article.fetched_at).await {
                    warn!("failed to bump story {}: {}", story_id, e);
                }
                if article.fetched_at > candidates[idx].last_updated {
                    candidates[idx].last_updated = article.fetched_at;
                }
                return Ok(Placement::Assigned(story_id));
            }
        }

        // No candidate reached the threshold (or the article has no usable
        // tokens at all): start a new story and make it visible to the rest
        // of this run.
        let story = self
            .store
            .create_story(NewStory {
                headline: article.title.clone(),
                first_seen: article.fetched_at,
            })
            .await?;
        if !self.store.claim_article(article.id, story.id).await? {
            warn!(
                "article {} already claimed by a concurrent run",
                article.id
            );
            return Ok(Placement::Lost);
        }
        info!(
            "Created story {} for article {}",
            story.id, article.id
        );
        let story_id = story.id;
        candidates.push(story);
        Ok(Placement::Created(story_id))
    }
}

enum Placement {
    Assigned(i64),
    Created(i64),
    Lost,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::JaccardScorer;
    use nb_core::storage::{NewArticle, NewSource};
    use nb_core::BiasCategory;
    use nb_storage::backends::memory::MemoryStorage;

    async fn seed_source(store: &MemoryStorage, name: &str, bias: BiasCategory) -> i64 {
        store
            .add_source(NewSource {
                name: name.to_string(),
                url: format!("http://{}.example", name),
                feed_url: None,
                bias,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_article(
        store: &MemoryStorage,
        source_id: i64,
        title: &str,
        fetched_at: DateTime<Utc>,
    ) -> i64 {
        store
            .add_article(NewArticle {
                source_id,
                url: format!("http://example.com/{}", title.replace(' ', "-")),
                title: title.to_string(),
                snippet: None,
                content: None,
                published_at: None,
                fetched_at,
            })
            .await
            .unwrap()
            .unwrap()
            .id
    }

    fn engine(store: Arc<MemoryStorage>, config: ClusterConfig) -> ClusteringEngine {
        ClusteringEngine::new(store, Arc::new(JaccardScorer::new()), config).unwrap()
    }

    #[tokio::test]
    async fn overlapping_headlines_join_the_same_story() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let radio = seed_source(&store, "radio", BiasCategory::GovOfficial).await;
        let daily = seed_source(&store, "daily", BiasCategory::IndependentLocal).await;

        seed_article(&store, radio, "Flooding hits Mogadishu", now - chrono::Duration::hours(2)).await;
        seed_article(
            &store,
            daily,
            "Mogadishu flooding displaces residents",
            now - chrono::Duration::hours(1),
        )
        .await;

        let summary = engine(store.clone(), ClusterConfig::default())
            .run(now)
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.assigned, 1);
        assert_eq!(summary.skipped, 0);

        let stories = store.list_stories().await.unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].headline, "Flooding hits Mogadishu");
        assert_eq!(
            store.articles_for_story(stories[0].id).await.unwrap().len(),
            2
        );

        let counts = store.bias_counts(stories[0].id).await.unwrap();
        assert_eq!(
            counts,
            vec![
                (BiasCategory::GovOfficial, 1),
                (BiasCategory::IndependentLocal, 1)
            ]
        );
    }

    #[tokio::test]
    async fn unrelated_article_starts_its_own_story() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let source = seed_source(&store, "wire", BiasCategory::International).await;

        seed_article(&store, source, "Flooding hits Mogadishu", now - chrono::Duration::hours(2)).await;
        seed_article(
            &store,
            source,
            "Parliament passes new budget bill",
            now - chrono::Duration::hours(1),
        )
        .await;

        let summary = engine(store.clone(), ClusterConfig::default())
            .run(now)
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.assigned, 0);
        assert_eq!(store.list_stories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn score_exactly_at_threshold_is_assigned() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let source = seed_source(&store, "wire", BiasCategory::Regional).await;

        // Jaccard of the pair is exactly 2/5 = 0.4.
        seed_article(&store, source, "Flooding hits Mogadishu", now - chrono::Duration::hours(2)).await;
        seed_article(
            &store,
            source,
            "Mogadishu flooding displaces residents",
            now - chrono::Duration::hours(1),
        )
        .await;

        let config = ClusterConfig {
            similarity_threshold: 2.0 / 5.0,
            ..Default::default()
        };
        let summary = engine(store.clone(), config).run(now).await.unwrap();
        assert_eq!(summary.assigned, 1);
        assert_eq!(store.list_stories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rerun_with_no_new_articles_changes_nothing() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let source = seed_source(&store, "wire", BiasCategory::Western).await;

        seed_article(&store, source, "Flooding hits Mogadishu", now - chrono::Duration::hours(2)).await;
        seed_article(
            &store,
            source,
            "Mogadishu flooding displaces residents",
            now - chrono::Duration::hours(1),
        )
        .await;

        let engine = engine(store.clone(), ClusterConfig::default());
        engine.run(now).await.unwrap();
        let stories_before = store.list_stories().await.unwrap();

        let second = engine.run(now).await.unwrap();
        assert_eq!(second.examined, 0);
        assert_eq!(second.assigned, 0);
        assert_eq!(second.created, 0);

        let stories_after = store.list_stories().await.unwrap();
        assert_eq!(stories_before.len(), stories_after.len());
        for (before, after) in stories_before.iter().zip(&stories_after) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.last_updated, after.last_updated);
        }
    }

    #[tokio::test]
    async fn article_with_missing_source_is_skipped() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        seed_article(&store, 999, "Flooding hits Mogadishu", now - chrono::Duration::hours(1)).await;

        let summary = engine(store.clone(), ClusterConfig::default())
            .run(now)
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.created, 0);
        assert!(store.list_stories().await.unwrap().is_empty());
        // Still unclustered, so a later run can retry once the source exists.
        assert_eq!(store.unclustered_articles(now, 7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_title_creates_a_story_instead_of_matching() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let source = seed_source(&store, "wire", BiasCategory::Regional).await;

        seed_article(&store, source, "Flooding hits Mogadishu", now - chrono::Duration::hours(2)).await;
        store
            .add_article(NewArticle {
                source_id: source,
                url: "http://example.com/untitled".to_string(),
                title: "...".to_string(),
                snippet: None,
                content: None,
                published_at: None,
                fetched_at: now - chrono::Duration::hours(1),
            })
            .await
            .unwrap();

        let summary = engine(store.clone(), ClusterConfig::default())
            .run(now)
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.assigned, 0);
    }

    #[tokio::test]
    async fn story_activity_timestamp_never_moves_backward() {
        let store = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let source = seed_source(&store, "wire", BiasCategory::Regional).await;

        // A story already more recently active than the joining article.
        let story = store
            .create_story(NewStory {
                headline: "Mogadishu flooding displaces residents".to_string(),
                first_seen: now,
            })
            .await
            .unwrap();
        seed_article(&store, source, "Mogadishu flooding displaces many", now - chrono::Duration::hours(1)).await;

        let engine = engine(store.clone(), ClusterConfig::default());
        let summary = engine.run(now).await.unwrap();
        assert_eq!(summary.assigned, 1);

        let stored = store.get_story(story.id).await.unwrap().unwrap();
        assert_eq!(stored.last_updated, now);
    }
}
