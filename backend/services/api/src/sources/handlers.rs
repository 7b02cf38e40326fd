use axum::extract::{Path, State};
use axum::Json;
use ordersync_common::error::SyncError;
use ordersync_db::sources::models::Source;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub data: Vec<Source>,
    pub count: usize,
}

/// Enabled sources. Credentials never leave the process.
pub async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let data = state.stores.sources.list_enabled().await?;
    let count = data.len();
    Ok(Json(SourcesResponse { data, count }))
}

#[derive(Debug, Serialize)]
pub struct SourceResponse {
    pub data: Source,
}

/// One source by its URL (percent-encoded in the path).
pub async fn get_source(
    State(state): State<AppState>,
    Path(url): Path<String>,
) -> Result<Json<SourceResponse>, ApiError> {
    let data = state
        .stores
        .sources
        .get(&url)
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("source: {url}")))?;
    Ok(Json(SourceResponse { data }))
}
