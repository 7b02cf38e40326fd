mod error;
mod sources;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use ordersync_common::types::ServiceInfo;
use ordersync_config::{init_tracing, AppConfig, SyncConfig};
use ordersync_db::control::pg_repository::PgSyncControlRepository;
use ordersync_db::control::repositories::SyncControlRepository;
use ordersync_ingest::orchestrator::{SyncOrchestrator, SyncStores};
use ordersync_ingest::pacing::TokioSleeper;
use ordersync_ingest::scheduler::{ControlRowGuard, LoopSettings, SyncController, SyncLoop};
use ordersync_ingest::store::client::StoreClient;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub stores: SyncStores,
    pub control: Arc<dyn SyncControlRepository>,
    pub controller: SyncController,
    pub scope: String,
    pub info: ServiceInfo,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.info)
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(sync::router())
        .merge(sources::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load config");
    let sync_config = SyncConfig::from_env().expect("invalid sync config");
    tracing::info!(service = "ordersync-api", scope = %sync_config.scope, "starting");

    let pool = ordersync_db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");
    ordersync_db::schema::ensure_schema(&pool)
        .await
        .expect("failed to bootstrap schema");

    // The stored row wins over SYNC_ENABLED / SYNC_INTERVAL_SECS once it exists.
    let control: Arc<dyn SyncControlRepository> =
        Arc::new(PgSyncControlRepository::new(pool.clone()));
    let row = control
        .get_or_create(
            &sync_config.scope,
            sync_config.loop_enabled,
            sync_config.loop_interval.as_secs() as i64,
        )
        .await
        .expect("failed to read sync control");

    let stores = SyncStores::postgres(pool);
    let client = StoreClient::new(sync_config.request_timeout).expect("failed to build http client");
    let orchestrator =
        SyncOrchestrator::from_config(stores.clone(), client, TokioSleeper, &sync_config);
    let guard = Arc::new(ControlRowGuard::new(
        control.clone(),
        &sync_config.scope,
        sync_config.stale_after,
    ));
    let (sync_loop, controller) =
        SyncLoop::new(orchestrator, guard, LoopSettings::from_control(&row));
    tokio::spawn(sync_loop.run());

    tracing::info!(
        enabled = row.enabled,
        interval_secs = row.interval_secs,
        "sync loop configured"
    );

    let state = AppState {
        stores,
        control,
        controller,
        info: ServiceInfo::new("ordersync-api").with_scope(&sync_config.scope),
        scope: sync_config.scope,
    };

    let app = build_router(state);
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;
    use uuid::Uuid;

    use ordersync_db::checkpoints::repositories::CheckpointRepository;
    use ordersync_db::memory::{
        InMemoryCheckpointRepository, InMemoryOrderRepository, InMemoryRunSummaryRepository,
        InMemorySourceRepository, InMemorySyncControlRepository,
    };
    use ordersync_db::runs::models::{RunStatus, RunSummary};
    use ordersync_db::runs::repositories::RunSummaryRepository;
    use ordersync_db::sources::models::Source;
    use ordersync_ingest::orchestrator::CycleReport;
    use ordersync_ingest::scheduler::CycleRunner;

    const SCOPE: &str = "test";

    struct NoopRunner;

    #[async_trait]
    impl CycleRunner for NoopRunner {
        async fn run_cycle(&self) -> CycleReport {
            CycleReport {
                cycle_id: Uuid::new_v4(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                summaries: Vec::new(),
            }
        }
    }

    struct TestApp {
        state: AppState,
        checkpoints: Arc<InMemoryCheckpointRepository>,
        runs: Arc<InMemoryRunSummaryRepository>,
        // held so the command channel stays open
        _loop: SyncLoop<NoopRunner>,
    }

    async fn test_app() -> TestApp {
        let control = Arc::new(InMemorySyncControlRepository::default());
        let row = control.get_or_create(SCOPE, false, 3600).await.unwrap();
        let checkpoints = Arc::new(InMemoryCheckpointRepository::default());
        let runs = Arc::new(InMemoryRunSummaryRepository::default());
        let sources = Arc::new(InMemorySourceRepository::with_sources(vec![
            Source::new("https://a.shop.test", "ck_live_secret", "cs_live_secret").with_label("Shop A"),
        ]));
        let stores = SyncStores {
            sources,
            checkpoints: checkpoints.clone(),
            orders: Arc::new(InMemoryOrderRepository::default()),
            runs: runs.clone(),
        };
        let guard = Arc::new(ControlRowGuard::new(
            control.clone(),
            SCOPE,
            Duration::from_secs(7200),
        ));
        let (sync_loop, controller) =
            SyncLoop::new(NoopRunner, guard, LoopSettings::from_control(&row));
        TestApp {
            state: AppState {
                stores,
                control,
                controller,
                scope: SCOPE.to_string(),
                info: ServiceInfo::new("ordersync-api").with_scope(SCOPE),
            },
            checkpoints,
            runs,
            _loop: sync_loop,
        }
    }

    fn summary(source: &str, status: RunStatus, minute: u32) -> RunSummary {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap();
        RunSummary {
            id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
            source_url: source.to_string(),
            status,
            new_orders: 1,
            updated_orders: 0,
            pages: 1,
            duration_ms: 20,
            message: "ok".to_string(),
            started_at: at,
            finished_at: at,
        }
    }

    async fn read_body(resp: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = test_app().await;
        let resp = build_router(app.state).oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn info_reports_scope() {
        let app = test_app().await;
        let resp = build_router(app.state).oneshot(get("/info")).await.unwrap();
        let body = read_body(resp).await;
        assert_eq!(body["name"], "ordersync-api");
        assert_eq!(body["scope"], SCOPE);
    }

    #[tokio::test]
    async fn settings_roundtrip_reaches_loop() {
        let app = test_app().await;
        let controller = app.state.controller.clone();
        let router = build_router(app.state);

        let resp = router.clone().oneshot(get("/sync/settings")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_body(resp).await;
        assert_eq!(body["data"]["enabled"], false);
        assert_eq!(body["data"]["interval_secs"], 3600);

        let resp = router
            .clone()
            .oneshot(put_json(
                "/sync/settings",
                serde_json::json!({ "enabled": true, "interval_secs": 900 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_body(resp).await;
        assert_eq!(body["data"]["enabled"], true);
        assert_eq!(body["data"]["interval_secs"], 900);

        assert_eq!(
            controller.settings(),
            LoopSettings {
                enabled: true,
                interval: Duration::from_secs(900),
            }
        );
    }

    #[tokio::test]
    async fn short_interval_is_rejected() {
        let app = test_app().await;
        let controller = app.state.controller.clone();
        let resp = build_router(app.state)
            .oneshot(put_json(
                "/sync/settings",
                serde_json::json!({ "interval_secs": 10 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(read_body(resp).await["error"]
            .as_str()
            .unwrap()
            .contains("interval_secs"));
        assert_eq!(controller.settings().interval, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn manual_run_is_accepted() {
        let app = test_app().await;
        let req = Request::builder()
            .method("POST")
            .uri("/sync/run")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(app.state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(read_body(resp).await["status"], "accepted");
    }

    #[tokio::test]
    async fn runs_filter_by_source_and_limit() {
        let app = test_app().await;
        for minute in 0..5 {
            app.runs
                .append(&summary("https://a.shop.test", RunStatus::Success, minute))
                .await
                .unwrap();
        }
        app.runs
            .append(&summary("https://b.shop.test", RunStatus::Error, 30))
            .await
            .unwrap();
        let router = build_router(app.state);

        let resp = router
            .clone()
            .oneshot(get("/sync/runs?source=https://a.shop.test&limit=2"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_body(resp).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["source_url"], "https://a.shop.test");

        let resp = router.oneshot(get("/sync/runs/latest")).await.unwrap();
        let body = read_body(resp).await;
        assert_eq!(body["count"], 2);
        let statuses: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["status"].as_str().unwrap())
            .collect();
        assert!(statuses.contains(&"error"));
    }

    #[tokio::test]
    async fn checkpoints_are_listed() {
        let app = test_app().await;
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        app.checkpoints
            .advance_checkpoint("https://a.shop.test", Some(at), Some(at))
            .await
            .unwrap();

        let resp = build_router(app.state)
            .oneshot(get("/sync/checkpoints"))
            .await
            .unwrap();
        let body = read_body(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["source_url"], "https://a.shop.test");
    }

    #[tokio::test]
    async fn sources_hide_credentials() {
        let app = test_app().await;
        let resp = build_router(app.state).oneshot(get("/sources")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_body(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["label"], "Shop A");
        let raw = body.to_string();
        assert!(!raw.contains("ck_live_secret"));
        assert!(!raw.contains("cs_live_secret"));
    }

    #[tokio::test]
    async fn source_by_url() {
        let app = test_app().await;
        let resp = build_router(app.state)
            .oneshot(get("/sources/https%3A%2F%2Fa.shop.test"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_body(resp).await;
        assert_eq!(body["data"]["url"], "https://a.shop.test");
        assert!(!body.to_string().contains("cs_live_secret"));
    }

    #[tokio::test]
    async fn unknown_source_is_not_found() {
        let app = test_app().await;
        let resp = build_router(app.state)
            .oneshot(get("/sources/https%3A%2F%2Fnowhere.test"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = read_body(resp).await;
        assert_eq!(body["error"], "source: https://nowhere.test");
    }

    #[tokio::test]
    async fn unknown_scope_update_is_not_found() {
        let app = test_app().await;
        let mut state = app.state;
        state.scope = "missing".to_string();
        let resp = build_router(state)
            .oneshot(put_json("/sync/settings", serde_json::json!({ "enabled": true })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
