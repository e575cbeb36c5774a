use async_trait::async_trait;
use nb_core::{NewsStore, Result};
use std::sync::Arc;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self>
    where
        Self: Sized;
}

/// Build a store from a backend name. `path` only applies to file-backed
/// backends.
#[cfg_attr(not(feature = "sqlite"), allow(unused_variables))]
pub async fn create_storage(kind: &str, path: Option<&str>) -> Result<Arc<dyn NewsStore>> {
    match kind {
        "memory" => Ok(Arc::new(
            <backends::memory::MemoryStorage as StorageBackend>::new().await?,
        )),
        #[cfg(feature = "sqlite")]
        "sqlite" => match path {
            Some(path) => Ok(Arc::new(
                backends::sqlite::SqliteStorage::new_with_path(std::path::Path::new(path))
                    .await?,
            )),
            None => Ok(Arc::new(
                <backends::sqlite::SqliteStorage as StorageBackend>::new().await?,
            )),
        },
        other => Err(nb_core::Error::Storage(format!(
            "unknown storage backend: {}",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::backends::memory::MemoryStorage;
    pub use super::StorageBackend;
    pub use nb_core::{NewsStore, Result};
}
