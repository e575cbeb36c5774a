use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Editorial position of a source. Closed set with a fixed canonical order;
/// the derived `Ord` is the tie-break order for dominant-bias computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BiasCategory {
    GovOfficial,
    Regional,
    IndependentLocal,
    PanAfrican,
    International,
    Western,
}

impl BiasCategory {
    /// All categories in canonical order.
    pub const ALL: [BiasCategory; 6] = [
        BiasCategory::GovOfficial,
        BiasCategory::Regional,
        BiasCategory::IndependentLocal,
        BiasCategory::PanAfrican,
        BiasCategory::International,
        BiasCategory::Western,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BiasCategory::GovOfficial => "gov-official",
            BiasCategory::Regional => "regional",
            BiasCategory::IndependentLocal => "independent-local",
            BiasCategory::PanAfrican => "pan-african",
            BiasCategory::International => "international",
            BiasCategory::Western => "western",
        }
    }
}

impl fmt::Display for BiasCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiasCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gov-official" => Ok(BiasCategory::GovOfficial),
            "regional" => Ok(BiasCategory::Regional),
            "independent-local" => Ok(BiasCategory::IndependentLocal),
            "pan-african" => Ok(BiasCategory::PanAfrican),
            "international" => Ok(BiasCategory::International),
            "western" => Ok(BiasCategory::Western),
            other => Err(crate::Error::Data(format!(
                "unknown bias category: {}",
                other
            ))),
        }
    }
}

/// A feed or publisher. The bias category is assigned externally and is
/// immutable as far as the clustering core is concerned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub feed_url: Option<String>,
    pub bias: BiasCategory,
    pub last_checked: Option<DateTime<Utc>>,
}

/// One fetched item. `url` is the dedup key, the only hard uniqueness
/// invariant in the system. `story_id == None` means unclustered; the
/// clustering engine is the only writer of that field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub title: String,
    pub snippet: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub story_id: Option<i64>,
    /// Precomputed embedding, reserved for a future semantic scorer.
    pub embedding: Option<Vec<f32>>,
}

impl Article {
    /// Comparison text used by the clustering engine: title plus snippet,
    /// title alone when the snippet is absent.
    pub fn comparison_text(&self) -> String {
        match &self.snippet {
            Some(snippet) if !snippet.is_empty() => format!("{} {}", self.title, snippet),
            _ => self.title.clone(),
        }
    }
}

/// A cluster of articles believed to report the same news event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    /// Headline of the first article, set at creation and never changed.
    pub headline: String,
    pub summary: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl Story {
    /// Candidate text the engine scores articles against.
    pub fn comparison_text(&self) -> String {
        match &self.summary {
            Some(summary) if !summary.is_empty() => format!("{} {}", self.headline, summary),
            _ => self.headline.clone(),
        }
    }
}

/// Derived aggregate: article count for one (story, bias) pair. Always
/// reconcilable by recounting articles joined with their sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCoverage {
    pub story_id: i64,
    pub bias: BiasCategory,
    pub article_count: u32,
}

/// A story whose coverage is dominated by a single bias category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blindspot {
    pub story_id: i64,
    pub headline: String,
    pub dominant_bias: BiasCategory,
    pub dominant_percentage: f64,
    pub total_articles: u32,
}
