pub mod blindspot;
pub mod coverage;
pub mod engine;
pub mod similarity;

pub use blindspot::BlindspotDetector;
pub use coverage::CoverageAggregator;
pub use engine::{ClusteringEngine, RunSummary};
pub use similarity::{JaccardScorer, SimilarityScorer};

pub mod prelude {
    pub use super::{BlindspotDetector, ClusteringEngine, CoverageAggregator, JaccardScorer};
    pub use nb_core::{BlindspotConfig, ClusterConfig, NewsStore, Result};
}
