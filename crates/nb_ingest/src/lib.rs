pub mod feed;
pub mod ingestor;
pub mod sources;

pub use ingestor::{FeedIngestor, IngestSummary};
pub use sources::load_sources;

pub mod prelude {
    pub use super::FeedIngestor;
    pub use nb_core::{NewsStore, Result};
}
