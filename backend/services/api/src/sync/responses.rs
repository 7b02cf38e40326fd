use ordersync_db::checkpoints::models::Checkpoint;
use ordersync_db::control::models::SyncControl;
use ordersync_db::runs::models::RunSummary;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub data: SyncControl,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub data: Vec<RunSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckpointsResponse {
    pub data: Vec<Checkpoint>,
    pub count: usize,
}
