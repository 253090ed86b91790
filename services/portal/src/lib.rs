//! HTTP front for the download catalog: public listing, admin upload/delete,
//! and static serving of the stored installers.

pub mod auth;
pub mod catalog_exec;
pub mod config;
pub mod error;
pub mod routes_downloads;
pub mod state;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use config::AppConfig;
pub use state::{AppState, SharedState};

pub fn app(state: SharedState) -> Router {
    let public = Router::new()
        .route("/downloads", get(routes_downloads::get_downloads))
        .route("/downloads/latest", get(routes_downloads::get_latest));

    // The upload handler enforces its own cap while streaming.
    let admin = Router::new()
        .route(
            "/downloads",
            get(routes_downloads::get_admin_downloads).post(upload::post_download),
        )
        .route(
            "/downloads/:id",
            patch(routes_downloads::patch_download).delete(routes_downloads::delete_download),
        )
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/health", get(health))
        .nest("/api", public)
        .nest("/api/admin", admin)
        .nest_service("/downloads", ServeDir::new(&state.cfg.downloads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
