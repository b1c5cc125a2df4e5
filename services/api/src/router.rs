//! Axum Router Configuration
//!
//! HTTP routing for the service: the voice websocket, the REST endpoints,
//! the OpenAPI document and the frontend bundle.

use crate::{
    handlers,
    models::{ChatRequest, ChatResponse, ErrorResponse, FeedbackPayload, StatusResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::collect_feedback, handlers::chat),
    components(schemas(FeedbackPayload, ChatRequest, ChatResponse, StatusResponse, ErrorResponse)),
    tags(
        (name = "Aerodesk API", description = "Voice relay and text chat for airline customer support")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let static_dir = app_state.config.frontend_build_dir.join("static");

    let mut app_router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/feedback", post(handlers::collect_feedback))
        .route("/api/turkish-airlines/chat", post(handlers::chat))
        .route("/", get(handlers::serve_index))
        .route("/{*path}", get(handlers::serve_spa));

    if static_dir.is_dir() {
        info!(path = %static_dir.display(), "Serving static assets");
        app_router = app_router.nest_service("/static", ServeDir::new(static_dir));
    }

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(app_router.with_state(app_state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/feedback"));
        assert!(doc.paths.paths.contains_key("/api/turkish-airlines/chat"));
    }
}
