pub mod db;
pub mod routes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::BaselineEngineClient;
use crate::store::PgProfileStore;
use routes::AppState;

const DEFAULT_LOG_FILTER: &str = "uba_gateway=info,tower_http=info";
const INTERNAL_ERROR: &str = "서버 내부 오류가 발생했습니다.";

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": INTERNAL_ERROR,
            "message": INTERNAL_ERROR,
        })),
    )
        .into_response()
}

/// Wrap the API router with the outer layers and static file serving.
pub fn app(state: AppState, static_dir: &str) -> Router {
    let mut app = routes::build_router(state);

    let dir = Path::new(static_dir);
    if dir.is_dir() {
        tracing::info!("Serving static files from {}", static_dir);
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    } else {
        tracing::warn!("Static directory {} not found, serving API only", static_dir);
    }

    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}

/// Run the web server.
pub async fn run(config: Config) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let addr = config.server.listen_addr();
    tracing::info!("Starting uba-gateway on {}", addr);
    tracing::info!("Database: {}", config.database.describe());
    tracing::info!("Baseline engine: {}", config.engine.url);

    // Database pool; an unreachable database is fatal
    let pool = db::Pool::new(&config.database).map_err(|e| e.to_string())?;
    match pool.probe().await {
        Ok(now) => tracing::info!(server_time = %now, "Database connected"),
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed");
            std::process::exit(1);
        }
    }
    let pool = Arc::new(pool);

    let engine = BaselineEngineClient::new(&config.engine.url, config.engine.timeout)
        .map_err(|e| e.to_string())?;

    let state = AppState {
        store: Arc::new(PgProfileStore::new(pool)),
        engine: Arc::new(engine),
        users_profile_id: config.engine.users_profile_id.clone(),
    };
    let app = app(state, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {e}"))
}
