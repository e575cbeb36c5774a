use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use nb_cluster::BlindspotDetector;
use nb_core::{Blindspot, BlindspotConfig, Story, StoryCoverage};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::AppState;

fn internal(e: nb_core::Error) -> StatusCode {
    error!("request failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn list_stories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Story>>, StatusCode> {
    let stories = state.store.list_stories().await.map_err(internal)?;
    Ok(Json(stories))
}

pub async fn get_story(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Story>, StatusCode> {
    match state.store.get_story(id).await.map_err(internal)? {
        Some(story) => Ok(Json(story)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

pub async fn get_story_coverage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StoryCoverage>>, StatusCode> {
    if state.store.get_story(id).await.map_err(internal)?.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    let coverage = state.store.coverage_for_story(id).await.map_err(internal)?;
    Ok(Json(coverage))
}

#[derive(Debug, Deserialize)]
pub struct BlindspotParams {
    pub min_articles: Option<u32>,
    pub threshold: Option<f64>,
    pub limit: Option<usize>,
}

pub async fn list_blindspots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BlindspotParams>,
) -> impl IntoResponse {
    let defaults = &state.blindspot_defaults;
    let config = BlindspotConfig {
        min_total_articles: params.min_articles.unwrap_or(defaults.min_total_articles),
        dominant_threshold: params.threshold.unwrap_or(defaults.dominant_threshold),
        limit: params.limit.unwrap_or(defaults.limit),
    };

    let detector = match BlindspotDetector::new(state.store.clone(), config) {
        Ok(detector) => detector,
        Err(e) => return Err((StatusCode::BAD_REQUEST, e.to_string())),
    };
    match detector.detect().await {
        Ok(blindspots) => Ok(Json::<Vec<Blindspot>>(blindspots)),
        Err(e) => Err((internal(e), String::new())),
    }
}
