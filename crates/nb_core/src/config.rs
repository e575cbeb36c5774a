use serde::{Deserialize, Serialize};

/// Parameters for a clustering run. Validated before the run starts; a run
/// with invalid parameters would produce meaningless results rather than
/// degraded ones, so validation failure is fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Recency window bounding both unclustered articles and candidate
    /// stories, in days.
    pub window_days: u32,
    /// Minimum Jaccard score for an article to join a story. Inclusive.
    pub similarity_threshold: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            similarity_threshold: 0.3,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.window_days == 0 {
            return Err(crate::Error::Config(
                "window_days must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(crate::Error::Config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Parameters for blindspot detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlindspotConfig {
    /// Stories with fewer total articles are never flagged.
    pub min_total_articles: u32,
    /// Fraction of coverage one bias category must reach.
    pub dominant_threshold: f64,
    /// Maximum number of stories returned.
    pub limit: usize,
}

impl Default for BlindspotConfig {
    fn default() -> Self {
        Self {
            min_total_articles: 3,
            dominant_threshold: 0.7,
            limit: 10,
        }
    }
}

impl BlindspotConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_total_articles == 0 {
            return Err(crate::Error::Config(
                "min_total_articles must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dominant_threshold) {
            return Err(crate::Error::Config(format!(
                "dominant_threshold must be within [0, 1], got {}",
                self.dominant_threshold
            )));
        }
        if self.limit == 0 {
            return Err(crate::Error::Config("limit must be at least 1".to_string()));
        }
        Ok(())
    }
}
