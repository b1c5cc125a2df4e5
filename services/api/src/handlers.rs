//! Axum Handlers for the REST API
//!
//! Feedback collection, the synchronous chat endpoint and single-page app
//! hosting. Documented with `utoipa` for the OpenAPI document.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use std::{path::Path as FsPath, sync::Arc};
use tracing::{error, info};

use crate::{
    models::{ChatRequest, ChatResponse, ErrorResponse, FeedbackPayload, StatusResponse},
    state::AppState,
};
use aerodesk_core::agent::final_response_text;

pub const DEFAULT_USER_ID: &str = "default_user";

const FRONTEND_MISSING: &str =
    "Frontend not built. Run 'npm run build' in the frontend directory.";
const RESERVED_PREFIXES: [&str; 4] = ["ws", "feedback", "static", "api"];

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Record user feedback for a voice run.
#[utoipa::path(
    post,
    path = "/feedback",
    request_body = FeedbackPayload,
    responses(
        (status = 200, description = "Feedback recorded", body = StatusResponse)
    )
)]
pub async fn collect_feedback(Json(feedback): Json<FeedbackPayload>) -> Json<StatusResponse> {
    info!(
        log_type = "feedback",
        score = feedback.score,
        text = %feedback.text,
        run_id = %feedback.run_id,
        user_id = ?feedback.user_id,
        "Feedback received"
    );
    Json(StatusResponse {
        status: "success".to_string(),
    })
}

/// Send one message to the text support agent.
///
/// Failures are reported in the body; the status code is always 200.
#[utoipa::path(
    post,
    path = "/api/turkish-airlines/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Agent reply or in-band error", body = ChatResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let user_id = request
        .user_id
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    let session_id = format!("session_{user_id}");

    let session = state
        .chat_sessions
        .get_or_create(&user_id, &session_id)
        .await;

    match state.chat_agent.run(&session, &request.message).await {
        Ok(events) => Json(ChatResponse::Success {
            response: final_response_text(&events),
            user_id: request.user_id,
        }),
        Err(e) => {
            error!(error = ?e, %user_id, "Error in Turkish Airlines chat");
            Json(ChatResponse::Error {
                error: e.to_string(),
                user_id: request.user_id,
            })
        }
    }
}

async fn index_page(build_dir: &FsPath) -> Result<Html<String>, ApiError> {
    let index = build_dir.join("index.html");
    if !tokio::fs::try_exists(&index).await.unwrap_or(false) {
        return Err(ApiError::NotFound(FRONTEND_MISSING.to_string()));
    }
    Ok(Html(tokio::fs::read_to_string(&index).await?))
}

/// Serve the frontend entry page.
pub async fn serve_index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    index_page(&state.config.frontend_build_dir).await
}

/// Catch-all for client-side routes. Paths under the API prefixes are never
/// answered with the app.
pub async fn serve_spa(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Html<String>, ApiError> {
    if RESERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return Err(ApiError::NotFound("Not found".to_string()));
    }
    index_page(&state.config.frontend_build_dir).await
}
