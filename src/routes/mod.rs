pub mod api_routes;
pub mod chat_routes;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::relay_service::RelayService;
use api_routes::{health_handler, index_handler};
use chat_routes::chat_handler;

/// Builds the full application router.
pub fn router(relay: RelayService) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}
