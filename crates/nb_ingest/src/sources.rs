use nb_core::storage::NewSource;
use nb_core::{BiasCategory, NewsStore, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// One entry in the seed file. Bias uses the same wire strings as the API.
#[derive(Debug, Deserialize)]
pub struct SeedSource {
    pub name: String,
    pub url: String,
    pub feed_url: Option<String>,
    pub bias: BiasCategory,
}

/// Load a JSON array of sources into the store. Sources whose canonical URL
/// is already present are left untouched, so reloading the same file is
/// harmless.
pub async fn load_sources(store: &dyn NewsStore, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let seeds: Vec<SeedSource> = serde_json::from_str(&raw)?;

    let known: Vec<String> = store
        .list_sources()
        .await?
        .into_iter()
        .map(|s| s.url)
        .collect();

    let mut added = 0;
    for seed in seeds {
        if known.iter().any(|url| *url == seed.url) {
            continue;
        }
        store
            .add_source(NewSource {
                name: seed.name,
                url: seed.url,
                feed_url: seed.feed_url,
                bias: seed.bias,
            })
            .await?;
        added += 1;
    }
    info!("Loaded {} new sources from {}", added, path.display());
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_storage::backends::memory::MemoryStorage;
    use std::io::Write;

    const SEED: &str = r#"[
        {"name": "State Radio", "url": "http://radio.example", "feed_url": "http://radio.example/rss", "bias": "gov-official"},
        {"name": "The Daily", "url": "http://daily.example", "bias": "independent-local"}
    ]"#;

    #[tokio::test]
    async fn loads_and_skips_existing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let store = MemoryStorage::new();
        assert_eq!(load_sources(&store, file.path()).await.unwrap(), 2);
        // Reloading the same file adds nothing.
        assert_eq!(load_sources(&store, file.path()).await.unwrap(), 0);

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].bias, BiasCategory::GovOfficial);
        assert!(sources[1].feed_url.is_none());
    }
}
