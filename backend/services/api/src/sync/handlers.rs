use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use ordersync_db::runs::models::RunFilter;
use ordersync_ingest::scheduler::LoopSettings;

use crate::error::ApiError;
use crate::sync::requests::UpdateSettingsRequest;
use crate::sync::responses::{
    CheckpointsResponse, RunsResponse, SettingsResponse, TriggerResponse,
};
use crate::AppState;

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let current = state.controller.settings();
    let data = state
        .control
        .get_or_create(
            &state.scope,
            current.enabled,
            current.interval.as_secs() as i64,
        )
        .await?;
    Ok(Json(SettingsResponse { data }))
}

/// Persist new loop settings, then hand them to the running loop.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    req.validate()?;

    let data = state
        .control
        .update_settings(&state.scope, req.enabled, req.interval_secs)
        .await?;
    let settings = LoopSettings::from_control(&data);
    state.controller.update(settings);

    tracing::info!(
        scope = %state.scope,
        enabled = settings.enabled,
        interval_secs = data.interval_secs,
        "sync settings updated"
    );
    Ok(Json(SettingsResponse { data }))
}

pub async fn trigger_run(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    state.controller.trigger()?;
    tracing::info!(scope = %state.scope, "manual sync requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse { status: "accepted" }),
    ))
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(filter): Query<RunFilter>,
) -> Result<Json<RunsResponse>, ApiError> {
    let data = state.stores.runs.list(filter).await?;
    let count = data.len();
    Ok(Json(RunsResponse { data, count }))
}

pub async fn latest_runs(State(state): State<AppState>) -> Result<Json<RunsResponse>, ApiError> {
    let data = state.stores.runs.latest_per_source().await?;
    let count = data.len();
    Ok(Json(RunsResponse { data, count }))
}

pub async fn list_checkpoints(
    State(state): State<AppState>,
) -> Result<Json<CheckpointsResponse>, ApiError> {
    let data = state.stores.checkpoints.list_checkpoints().await?;
    let count = data.len();
    Ok(Json(CheckpointsResponse { data, count }))
}
