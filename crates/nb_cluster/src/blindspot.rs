use nb_core::{BlindspotConfig, Blindspot, NewsStore, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Read-side detection of stories whose coverage is dominated by a single
/// bias category. Never mutates anything.
pub struct BlindspotDetector {
    store: Arc<dyn NewsStore>,
    config: BlindspotConfig,
}

impl BlindspotDetector {
    pub fn new(store: Arc<dyn NewsStore>, config: BlindspotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub async fn detect(&self) -> Result<Vec<Blindspot>> {
        // Ordered map so the scan (and therefore the output on exact
        // percentage ties) is deterministic.
        let mut per_story: BTreeMap<i64, Vec<(nb_core::BiasCategory, u32)>> = BTreeMap::new();
        for row in self.store.list_coverage().await? {
            per_story
                .entry(row.story_id)
                .or_default()
                .push((row.bias, row.article_count));
        }

        let mut blindspots = Vec::new();
        for (story_id, mut counts) in per_story {
            let total: u32 = counts.iter().map(|(_, n)| n).sum();
            if total < self.config.min_total_articles {
                continue;
            }

            // Canonical bias order first; only a strictly higher count
            // displaces the leader, so an exact count tie resolves to the
            // first category in that order.
            counts.sort_by_key(|(bias, _)| *bias);
            let mut dominant = counts[0];
            for &candidate in &counts[1..] {
                if candidate.1 > dominant.1 {
                    dominant = candidate;
                }
            }
            let (dominant_bias, dominant_count) = dominant;
            let dominant_percentage = f64::from(dominant_count) / f64::from(total);
            if dominant_percentage < self.config.dominant_threshold {
                continue;
            }

            let headline = match self.store.get_story(story_id).await? {
                Some(story) => story.headline,
                None => {
                    warn!("coverage references missing story {}, skipping", story_id);
                    continue;
                }
            };

            blindspots.push(Blindspot {
                story_id,
                headline,
                dominant_bias,
                dominant_percentage,
                total_articles: total,
            });
        }

        blindspots.sort_by(|a, b| {
            b.dominant_percentage
                .partial_cmp(&a.dominant_percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.story_id.cmp(&b.story_id))
        });
        blindspots.truncate(self.config.limit);
        Ok(blindspots)
    }
}
