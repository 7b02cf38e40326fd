pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sources", get(handlers::list_sources))
        .route("/sources/{url}", get(handlers::get_source))
}
