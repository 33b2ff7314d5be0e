use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::signal;
use crate::state::AppState;

fn build_cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = match config.cors_origins() {
        Some(origins) => AllowOrigin::list(origins),
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the full axum Router: group API, signaling socket, health and the
/// static page fallback.
pub fn build_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/group", get(api::get_group).post(api::create_group))
        .route("/group/join", post(api::join_group))
        .route("/ws", get(signal::ws_handler))
        .route("/health", get(api::health))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(build_cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
