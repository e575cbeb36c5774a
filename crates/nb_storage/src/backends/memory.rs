use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nb_core::storage::{NewArticle, NewSource, NewStory};
use nb_core::{Article, BiasCategory, Error, NewsStore, Result, Source, Story, StoryCoverage};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::warn;

use crate::StorageBackend;

#[derive(Default)]
struct MemoryInner {
    sources: Vec<Source>,
    articles: Vec<Article>,
    stories: Vec<Story>,
    coverage: BTreeMap<i64, Vec<StoryCoverage>>,
    next_source_id: i64,
    next_article_id: i64,
    next_story_id: i64,
}

/// In-memory store used in tests and local development. Mirrors the SQLite
/// backend's semantics, including URL dedup and the compare-and-set claim.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should always be available"
    }

    async fn new() -> Result<Self> {
        Ok(Self::default())
    }
}

fn window_start(now: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(window_days))
}

#[async_trait]
impl NewsStore for MemoryStorage {
    async fn add_source(&self, source: NewSource) -> Result<Source> {
        let mut inner = self.inner.write().await;
        inner.next_source_id += 1;
        let source = Source {
            id: inner.next_source_id,
            name: source.name,
            url: source.url,
            feed_url: source.feed_url,
            bias: source.bias,
            last_checked: None,
        };
        inner.sources.push(source.clone());
        Ok(source)
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.inner.read().await.sources.clone())
    }

    async fn get_source(&self, id: i64) -> Result<Option<Source>> {
        Ok(self
            .inner
            .read()
            .await
            .sources
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn touch_source(&self, id: i64, when: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let source = inner
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::Data(format!("source {} not found", id)))?;
        source.last_checked = Some(when);
        Ok(())
    }

    async fn add_article(&self, article: NewArticle) -> Result<Option<Article>> {
        let mut inner = self.inner.write().await;
        if inner.articles.iter().any(|a| a.url == article.url) {
            return Ok(None);
        }
        inner.next_article_id += 1;
        let article = Article {
            id: inner.next_article_id,
            source_id: article.source_id,
            url: article.url,
            title: article.title,
            snippet: article.snippet,
            content: article.content,
            published_at: article.published_at,
            fetched_at: article.fetched_at,
            story_id: None,
            embedding: None,
        };
        inner.articles.push(article.clone());
        Ok(Some(article))
    }

    async fn unclustered_articles(
        &self,
        now: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Vec<Article>> {
        let start = window_start(now, window_days);
        let mut articles: Vec<Article> = self
            .inner
            .read()
            .await
            .articles
            .iter()
            .filter(|a| a.story_id.is_none() && a.fetched_at >= start && a.fetched_at <= now)
            .cloned()
            .collect();
        articles.sort_by_key(|a| a.fetched_at);
        Ok(articles)
    }

    async fn articles_for_story(&self, story_id: i64) -> Result<Vec<Article>> {
        Ok(self
            .inner
            .read()
            .await
            .articles
            .iter()
            .filter(|a| a.story_id == Some(story_id))
            .cloned()
            .collect())
    }

    async fn create_story(&self, story: NewStory) -> Result<Story> {
        let mut inner = self.inner.write().await;
        inner.next_story_id += 1;
        let story = Story {
            id: inner.next_story_id,
            headline: story.headline,
            summary: None,
            first_seen: story.first_seen,
            last_updated: story.first_seen,
            tags: Vec::new(),
        };
        inner.stories.push(story.clone());
        Ok(story)
    }

    async fn get_story(&self, id: i64) -> Result<Option<Story>> {
        Ok(self
            .inner
            .read()
            .await
            .stories
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn recent_stories(&self, now: DateTime<Utc>, window_days: u32) -> Result<Vec<Story>> {
        let start = window_start(now, window_days);
        let mut stories: Vec<Story> = self
            .inner
            .read()
            .await
            .stories
            .iter()
            .filter(|s| s.last_updated >= start)
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(stories)
    }

    async fn list_stories(&self) -> Result<Vec<Story>> {
        Ok(self.inner.read().await.stories.clone())
    }

    async fn bump_story(&self, story_id: i64, when: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let story = inner
            .stories
            .iter_mut()
            .find(|s| s.id == story_id)
            .ok_or_else(|| Error::Data(format!("story {} not found", story_id)))?;
        if when > story.last_updated {
            story.last_updated = when;
        }
        Ok(())
    }

    async fn claim_article(&self, article_id: i64, story_id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let article = inner
            .articles
            .iter_mut()
            .find(|a| a.id == article_id)
            .ok_or_else(|| Error::Data(format!("article {} not found", article_id)))?;
        if article.story_id.is_some() {
            return Ok(false);
        }
        article.story_id = Some(story_id);
        Ok(true)
    }

    async fn bias_counts(&self, story_id: i64) -> Result<Vec<(BiasCategory, u32)>> {
        let inner = self.inner.read().await;
        let mut counts: BTreeMap<BiasCategory, u32> = BTreeMap::new();
        for article in inner.articles.iter().filter(|a| a.story_id == Some(story_id)) {
            match inner.sources.iter().find(|s| s.id == article.source_id) {
                Some(source) => *counts.entry(source.bias).or_insert(0) += 1,
                None => warn!(
                    "article {} references missing source {}, skipping",
                    article.id, article.source_id
                ),
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn replace_coverage(
        &self,
        story_id: i64,
        counts: &[(BiasCategory, u32)],
    ) -> Result<()> {
        let rows: Vec<StoryCoverage> = counts
            .iter()
            .map(|(bias, article_count)| StoryCoverage {
                story_id,
                bias: *bias,
                article_count: *article_count,
            })
            .collect();
        let mut inner = self.inner.write().await;
        if rows.is_empty() {
            inner.coverage.remove(&story_id);
        } else {
            inner.coverage.insert(story_id, rows);
        }
        Ok(())
    }

    async fn coverage_for_story(&self, story_id: i64) -> Result<Vec<StoryCoverage>> {
        Ok(self
            .inner
            .read()
            .await
            .coverage
            .get(&story_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_coverage(&self) -> Result<Vec<StoryCoverage>> {
        Ok(self
            .inner
            .read()
            .await
            .coverage
            .values()
            .flatten()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article(url: &str, source_id: i64) -> NewArticle {
        NewArticle {
            source_id,
            url: url.to_string(),
            title: "Test Article".to_string(),
            snippet: None,
            content: None,
            published_at: None,
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn deduplicates_on_url() {
        let storage = MemoryStorage::new();
        let first = storage
            .add_article(sample_article("http://example.com/a", 1))
            .await
            .unwrap();
        assert!(first.is_some());
        let second = storage
            .add_article(sample_article("http://example.com/a", 1))
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn claim_is_compare_and_set() {
        let storage = MemoryStorage::new();
        let article = storage
            .add_article(sample_article("http://example.com/a", 1))
            .await
            .unwrap()
            .unwrap();
        let story = storage
            .create_story(NewStory {
                headline: "Test".to_string(),
                first_seen: Utc::now(),
            })
            .await
            .unwrap();

        assert!(storage.claim_article(article.id, story.id).await.unwrap());
        assert!(!storage.claim_article(article.id, story.id).await.unwrap());
    }

    #[tokio::test]
    async fn bump_never_moves_backward() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let story = storage
            .create_story(NewStory {
                headline: "Test".to_string(),
                first_seen: now,
            })
            .await
            .unwrap();

        storage
            .bump_story(story.id, now - Duration::hours(1))
            .await
            .unwrap();
        let stored = storage.get_story(story.id).await.unwrap().unwrap();
        assert_eq!(stored.last_updated, now);

        let later = now + Duration::hours(1);
        storage.bump_story(story.id, later).await.unwrap();
        let stored = storage.get_story(story.id).await.unwrap().unwrap();
        assert_eq!(stored.last_updated, later);
    }

    #[tokio::test]
    async fn unclustered_window_is_ordered_oldest_first() {
        let storage = MemoryStorage::new();
        let now = Utc::now();

        for (i, days_ago) in [2i64, 1, 3].iter().enumerate() {
            let mut article = sample_article(&format!("http://example.com/{}", i), 1);
            article.fetched_at = now - Duration::days(*days_ago);
            storage.add_article(article).await.unwrap();
        }
        // Outside the window entirely.
        let mut old = sample_article("http://example.com/old", 1);
        old.fetched_at = now - Duration::days(30);
        storage.add_article(old).await.unwrap();

        let articles = storage.unclustered_articles(now, 7).await.unwrap();
        assert_eq!(articles.len(), 3);
        assert!(articles.windows(2).all(|w| w[0].fetched_at <= w[1].fetched_at));
    }
}
