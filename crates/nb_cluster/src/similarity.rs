use std::collections::HashSet;

/// Scores how likely two pieces of text describe the same event, in
/// [0.0, 1.0]. The trait exists so the lexical baseline can be swapped for
/// an embedding-based scorer without touching the engine.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Token-set Jaccard index over case-normalized words. Cheap and
/// explainable; not semantic.
pub struct JaccardScorer {
    stop_words: HashSet<&'static str>,
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "is", "it", "of", "on", "or", "the",
    "to", "with",
];

impl Default for JaccardScorer {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl JaccardScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scorer that keeps stop words, matching sources whose headlines are
    /// mostly function words.
    pub fn without_stop_words() -> Self {
        Self {
            stop_words: HashSet::new(),
        }
    }

    fn tokenize(&self, text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .filter(|w| !self.stop_words.contains(w.as_str()))
            .collect()
    }
}

impl SimilarityScorer for JaccardScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let left = self.tokenize(a);
        let right = self.tokenize(b);

        let union = left.union(&right).count();
        if union == 0 {
            // No evidence either way; defined as no similarity.
            return 0.0;
        }
        let intersection = left.intersection(&right).count();
        intersection as f64 / union as f64
    }
}
