use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, BiasCategory, Source, Story, StoryCoverage};
use crate::Result;

/// Insert payload for a source; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub feed_url: Option<String>,
    pub bias: BiasCategory,
}

/// Insert payload for an article. `story_id` starts out unset; only the
/// clustering engine writes it, through `claim_article`.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: i64,
    pub url: String,
    pub title: String,
    pub snippet: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// Insert payload for a story. `last_updated` starts equal to `first_seen`.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub headline: String,
    pub first_seen: DateTime<Utc>,
}

/// The persistence seam between the clustering core and whatever store the
/// surrounding system provides. All mutation of clustering state goes
/// through this trait; the read API and ingestion only ever append articles
/// or read.
#[async_trait]
pub trait NewsStore: Send + Sync {
    async fn add_source(&self, source: NewSource) -> Result<Source>;

    async fn list_sources(&self) -> Result<Vec<Source>>;

    async fn get_source(&self, id: i64) -> Result<Option<Source>>;

    /// Record that a source's feed was checked.
    async fn touch_source(&self, id: i64, when: DateTime<Utc>) -> Result<()>;

    /// Insert an article, deduplicating on URL. Returns `None` when an
    /// article with the same URL already exists; that is not an error.
    async fn add_article(&self, article: NewArticle) -> Result<Option<Article>>;

    /// Unclustered articles fetched within the window, oldest first, so
    /// earlier articles establish the stories later ones can join.
    async fn unclustered_articles(
        &self,
        now: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Vec<Article>>;

    async fn articles_for_story(&self, story_id: i64) -> Result<Vec<Article>>;

    async fn create_story(&self, story: NewStory) -> Result<Story>;

    async fn get_story(&self, id: i64) -> Result<Option<Story>>;

    /// Stories updated within the window, most recently updated first.
    async fn recent_stories(&self, now: DateTime<Utc>, window_days: u32) -> Result<Vec<Story>>;

    async fn list_stories(&self) -> Result<Vec<Story>>;

    /// Move a story's `last_updated` forward to `when`. Monotonic: if the
    /// stored value is already later, it stays.
    async fn bump_story(&self, story_id: i64, when: DateTime<Utc>) -> Result<()>;

    /// Compare-and-set assignment: succeeds only while the article is still
    /// unclustered. Returns `false` when another run already claimed it.
    async fn claim_article(&self, article_id: i64, story_id: i64) -> Result<bool>;

    /// Recount a story's coverage from articles joined with their sources.
    /// This is the correctness reference for `StoryCoverage`; results are in
    /// canonical bias order.
    async fn bias_counts(&self, story_id: i64) -> Result<Vec<(BiasCategory, u32)>>;

    /// Replace a story's stored coverage rows. Idempotent.
    async fn replace_coverage(
        &self,
        story_id: i64,
        counts: &[(BiasCategory, u32)],
    ) -> Result<()>;

    async fn coverage_for_story(&self, story_id: i64) -> Result<Vec<StoryCoverage>>;

    async fn list_coverage(&self) -> Result<Vec<StoryCoverage>>;
}
