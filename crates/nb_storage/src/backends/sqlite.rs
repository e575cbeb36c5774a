use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use nb_core::storage::{NewArticle, NewSource, NewStory};
use nb_core::{Article, BiasCategory, Error, NewsStore, Result, Source, Story, StoryCoverage};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        feed_url TEXT,
        bias TEXT NOT NULL,
        last_checked TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        headline TEXT NOT NULL,
        summary TEXT,
        first_seen TEXT NOT NULL,
        last_updated TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL REFERENCES sources(id),
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        snippet TEXT,
        content TEXT,
        published_at TEXT,
        fetched_at TEXT NOT NULL,
        story_id INTEGER REFERENCES stories(id),
        embedding TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS story_coverage (
        story_id INTEGER NOT NULL REFERENCES stories(id),
        bias TEXT NOT NULL,
        article_count INTEGER NOT NULL,
        PRIMARY KEY (story_id, bias)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_story ON articles(story_id)",
    "CREATE INDEX IF NOT EXISTS idx_articles_fetched ON articles(fetched_at)",
];

/// SQLite-backed store. Timestamps are stored as fixed-width RFC 3339 UTC
/// strings so lexicographic comparison in SQL matches chronological order.
pub struct SqliteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

fn ts(when: DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("bad timestamp {:?}: {}", raw, e)))
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

fn window_start(now: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(window_days))
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let bias: String = row.get("bias");
    let last_checked: Option<String> = row.get("last_checked");
    Ok(Source {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        feed_url: row.get("feed_url"),
        bias: BiasCategory::from_str(&bias)?,
        last_checked: last_checked.as_deref().map(parse_ts).transpose()?,
    })
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let published_at: Option<String> = row.get("published_at");
    let fetched_at: String = row.get("fetched_at");
    let embedding: Option<String> = row.get("embedding");
    Ok(Article {
        id: row.get("id"),
        source_id: row.get("source_id"),
        url: row.get("url"),
        title: row.get("title"),
        snippet: row.get("snippet"),
        content: row.get("content"),
        published_at: published_at.as_deref().map(parse_ts).transpose()?,
        fetched_at: parse_ts(&fetched_at)?,
        story_id: row.get("story_id"),
        embedding: embedding
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
    })
}

fn story_from_row(row: &SqliteRow) -> Result<Story> {
    let first_seen: String = row.get("first_seen");
    let last_updated: String = row.get("last_updated");
    let tags: String = row.get("tags");
    Ok(Story {
        id: row.get("id"),
        headline: row.get("headline"),
        summary: row.get("summary"),
        first_seen: parse_ts(&first_seen)?,
        last_updated: parse_ts(&last_updated)?,
        tags: serde_json::from_str(&tags)?,
    })
}

impl SqliteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(db_err)?;

        for migration in MIGRATIONS {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(db_err)?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./news.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new("news.db")).await
    }
}

#[async_trait]
impl NewsStore for SqliteStorage {
    async fn add_source(&self, source: NewSource) -> Result<Source> {
        let result = sqlx::query(
            "INSERT INTO sources (name, url, feed_url, bias) VALUES (?, ?, ?, ?)",
        )
        .bind(&source.name)
        .bind(&source.url)
        .bind(&source.feed_url)
        .bind(source.bias.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Source {
            id: result.last_insert_rowid(),
            name: source.name,
            url: source.url,
            feed_url: source.feed_url,
            bias: source.bias,
            last_checked: None,
        })
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(source_from_row).collect()
    }

    async fn get_source(&self, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn touch_source(&self, id: i64, when: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE sources SET last_checked = ? WHERE id = ?")
            .bind(ts(when))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::Data(format!("source {} not found", id)));
        }
        Ok(())
    }

    async fn add_article(&self, article: NewArticle) -> Result<Option<Article>> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (source_id, url, title, snippet, content, published_at, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(article.source_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.snippet)
        .bind(&article.content)
        .bind(article.published_at.map(ts))
        .bind(ts(article.fetched_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Article {
            id: result.last_insert_rowid(),
            source_id: article.source_id,
            url: article.url,
            title: article.title,
            snippet: article.snippet,
            content: article.content,
            published_at: article.published_at,
            fetched_at: article.fetched_at,
            story_id: None,
            embedding: None,
        }))
    }

    async fn unclustered_articles(
        &self,
        now: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE story_id IS NULL AND fetched_at >= ? AND fetched_at <= ?
            ORDER BY fetched_at ASC
            "#,
        )
        .bind(ts(window_start(now, window_days)))
        .bind(ts(now))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(article_from_row).collect()
    }

    async fn articles_for_story(&self, story_id: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles WHERE story_id = ? ORDER BY fetched_at")
            .bind(story_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(article_from_row).collect()
    }

    async fn create_story(&self, story: NewStory) -> Result<Story> {
        let stamp = ts(story.first_seen);
        let result = sqlx::query(
            "INSERT INTO stories (headline, first_seen, last_updated) VALUES (?, ?, ?)",
        )
        .bind(&story.headline)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Story {
            id: result.last_insert_rowid(),
            headline: story.headline,
            summary: None,
            first_seen: story.first_seen,
            last_updated: story.first_seen,
            tags: Vec::new(),
        })
    }

    async fn get_story(&self, id: i64) -> Result<Option<Story>> {
        let row = sqlx::query("SELECT * FROM stories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(story_from_row).transpose()
    }

    async fn recent_stories(&self, now: DateTime<Utc>, window_days: u32) -> Result<Vec<Story>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM stories
            WHERE last_updated >= ?
            ORDER BY last_updated DESC
            "#,
        )
        .bind(ts(window_start(now, window_days)))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(story_from_row).collect()
    }

    async fn list_stories(&self) -> Result<Vec<Story>> {
        let rows = sqlx::query("SELECT * FROM stories ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(story_from_row).collect()
    }

    async fn bump_story(&self, story_id: i64, when: DateTime<Utc>) -> Result<()> {
        // MAX over the fixed-width timestamp strings keeps the value monotonic.
        let result = sqlx::query("UPDATE stories SET last_updated = MAX(last_updated, ?) WHERE id = ?")
            .bind(ts(when))
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::Data(format!("story {} not found", story_id)));
        }
        Ok(())
    }

    async fn claim_article(&self, article_id: i64, story_id: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE articles SET story_id = ? WHERE id = ? AND story_id IS NULL")
                .bind(story_id)
                .bind(article_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists = sqlx::query("SELECT 1 FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(Error::Data(format!("article {} not found", article_id)));
        }
        Ok(false)
    }

    async fn bias_counts(&self, story_id: i64) -> Result<Vec<(BiasCategory, u32)>> {
        let rows = sqlx::query(
            r#"
            SELECT s.bias AS bias, COUNT(*) AS n
            FROM articles a
            JOIN sources s ON a.source_id = s.id
            WHERE a.story_id = ?
            GROUP BY s.bias
            "#,
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut counts: BTreeMap<BiasCategory, u32> = BTreeMap::new();
        for row in &rows {
            let bias: String = row.get("bias");
            let n: i64 = row.get("n");
            counts.insert(BiasCategory::from_str(&bias)?, n as u32);
        }
        Ok(counts.into_iter().collect())
    }

    async fn replace_coverage(
        &self,
        story_id: i64,
        counts: &[(BiasCategory, u32)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM story_coverage WHERE story_id = ?")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        for (bias, article_count) in counts {
            sqlx::query(
                "INSERT INTO story_coverage (story_id, bias, article_count) VALUES (?, ?, ?)",
            )
            .bind(story_id)
            .bind(bias.as_str())
            .bind(i64::from(*article_count))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn coverage_for_story(&self, story_id: i64) -> Result<Vec<StoryCoverage>> {
        let rows = sqlx::query(
            "SELECT * FROM story_coverage WHERE story_id = ? ORDER BY bias",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        coverage_from_rows(&rows)
    }

    async fn list_coverage(&self) -> Result<Vec<StoryCoverage>> {
        let rows = sqlx::query("SELECT * FROM story_coverage ORDER BY story_id, bias")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        coverage_from_rows(&rows)
    }
}

fn coverage_from_rows(rows: &[SqliteRow]) -> Result<Vec<StoryCoverage>> {
    rows.iter()
        .map(|row| {
            let bias: String = row.get("bias");
            let article_count: i64 = row.get("article_count");
            Ok(StoryCoverage {
                story_id: row.get("story_id"),
                bias: BiasCategory::from_str(&bias)?,
                article_count: article_count as u32,
            })
        })
        .collect()
}
