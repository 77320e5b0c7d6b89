use anyhow::anyhow;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::warn;

use parley_db::models::UserSummaryRow;
use parley_types::api::{Claims, UserResponse};

use crate::AppState;
use crate::error::ApiError;

/// GET /users — everyone except the caller, for the sidebar. Passwords
/// never reach this layer; the store does not select them for listings.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let caller_id = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || db.db.list_users_except(&caller_id))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    let users: Vec<UserResponse> = rows.into_iter().map(user_row_to_response).collect();
    Ok(Json(users))
}

fn user_row_to_response(row: UserSummaryRow) -> UserResponse {
    UserResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt user id '{}': {}", row.id, e);
            uuid::Uuid::default()
        }),
        username: row.username,
        created_at: row
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .or_else(|_| {
                // SQLite stores default timestamps as "YYYY-MM-DD HH:MM:SS"
                // without timezone. Parse as naive UTC and convert.
                chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on user '{}': {}", row.created_at, row.id, e);
                chrono::DateTime::default()
            }),
    }
}
