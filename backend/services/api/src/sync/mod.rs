pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sync/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/sync/run", post(handlers::trigger_run))
        .route("/sync/runs", get(handlers::list_runs))
        .route("/sync/runs/latest", get(handlers::latest_runs))
        .route("/sync/checkpoints", get(handlers::list_checkpoints))
}
