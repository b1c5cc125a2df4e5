//! HTTP Request and Response Models
//!
//! Payloads for the REST endpoints, annotated for OpenAPI generation with
//! `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User feedback on a voice run.
#[derive(Deserialize, Serialize, ToSchema, Debug, Clone)]
pub struct FeedbackPayload {
    #[schema(example = 1.0)]
    pub score: f64,
    #[serde(default)]
    pub text: String,
    #[schema(example = "run-42")]
    pub run_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatRequest {
    #[schema(example = "I want to change my flight")]
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Outcome of a chat turn. Both variants are returned with HTTP 200 and
/// echo the `user_id` exactly as the request carried it.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChatResponse {
    Success {
        response: String,
        user_id: Option<String>,
    },
    Error {
        error: String,
        user_id: Option<String>,
    },
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StatusResponse {
    #[schema(example = "success")]
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
