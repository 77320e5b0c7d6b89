use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use parley_media::MediaError;
use parley_types::api::ErrorBody;

/// Fault taxonomy for the request surface. Faults from media resolution
/// and the store are reclassified exactly once, here. Every failure
/// resolves to a single `{error}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or rejected attachment payload — the caller's fault,
    /// reported with the offending kind.
    #[error("{0}")]
    Client(#[from] MediaError),

    /// Caller-supplied input failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// Missing or unusable credentials.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The request collides with existing state.
    #[error("{0}")]
    Conflict(&'static str),

    /// Store unavailability or any unclassified internal failure —
    /// reported generically, detail stays in the logs.
    #[error("Internal server error")]
    Server(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Client(media) => (StatusCode::BAD_REQUEST, media.to_string()),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            ApiError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, (*reason).to_string()),
            ApiError::Conflict(reason) => (StatusCode::CONFLICT, (*reason).to_string()),
            ApiError::Server(source) => {
                error!("Request failed: {:#}", source);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
