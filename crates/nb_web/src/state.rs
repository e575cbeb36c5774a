use nb_core::{BlindspotConfig, NewsStore};
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn NewsStore>,
    /// Defaults for /api/blindspots; query parameters override per request.
    pub blindspot_defaults: BlindspotConfig,
}
