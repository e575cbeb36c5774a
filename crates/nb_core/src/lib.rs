pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{BlindspotConfig, ClusterConfig};
pub use error::Error;
pub use storage::{NewArticle, NewSource, NewStory, NewsStore};
pub use types::{Article, BiasCategory, Blindspot, Source, Story, StoryCoverage};

pub type Result<T> = std::result::Result<T, Error>;
