use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_db::queries::NewAttachments;
use parley_media::pipeline::AttachmentRequest;
use parley_types::api::{Claims, MessageResponse, SendMessageRequest};
use parley_types::events::GatewayEvent;

use crate::AppState;
use crate::error::ApiError;

/// POST /messages/{peer_id} — the send pipeline end to end: resolve
/// attachments, persist, then push to the receiver's live connection.
pub async fn send_message(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = execute_send(&state, claims.sub, peer_id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages/{peer_id} — full history between caller and peer,
/// ascending by creation time.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let caller_id = claims.sub.to_string();
    let peer = peer_id.to_string();

    let rows = tokio::task::spawn_blocking(move || db.db.conversation(&caller_id, &peer))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    let messages: Vec<MessageResponse> = rows.into_iter().map(message_row_to_response).collect();
    Ok(Json(messages))
}

/// One send request, start to finish. Attachment resolution happens before
/// anything touches the store, so a rejected or failed upload aborts with
/// zero persisted records; delivery comes last and is fire-and-forget.
/// Because the steps are sequenced in this one future, an abandoned
/// request can never persist a message whose upload did not complete.
pub async fn execute_send(
    state: &AppState,
    sender_id: Uuid,
    receiver_id: Uuid,
    req: SendMessageRequest,
) -> Result<MessageResponse, ApiError> {
    let resolved = parley_media::resolve_attachments(
        state.uploader.as_ref(),
        &AttachmentRequest {
            image: req.image.as_deref(),
            video: req.video.as_deref(),
            audio: req.audio.as_deref(),
            file: req.file.as_deref(),
            filename: req.filename.as_deref(),
        },
    )
    .await?;

    let attachments = NewAttachments {
        image_url: resolved.image,
        video_url: resolved.video,
        audio_url: resolved.audio,
        file_url: resolved.file,
    };

    // Run blocking DB insert off the async runtime
    let db = state.clone();
    let sender = sender_id.to_string();
    let receiver = receiver_id.to_string();
    let text = req.text;
    let row = tokio::task::spawn_blocking(move || {
        db.db.insert_message(&sender, &receiver, text.as_deref(), &attachments)
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    let message = message_row_to_response(row);

    // Best-effort live delivery; a recipient who is offline (or drops in
    // this window) fetches history on next connect instead. The outcome
    // never reaches the sender and never unwinds the persisted message.
    state
        .dispatcher
        .send_to_user(receiver_id, GatewayEvent::NewMessage { message: message.clone() })
        .await;

    Ok(message)
}

fn message_row_to_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        sender_id: row.sender_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt sender_id '{}' on message '{}': {}", row.sender_id, row.id, e);
            Uuid::default()
        }),
        receiver_id: row.receiver_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt receiver_id '{}' on message '{}': {}", row.receiver_id, row.id, e);
            Uuid::default()
        }),
        text: row.text,
        image: row.image_url,
        video: row.video_url,
        audio: row.audio_url,
        file: row.file_url,
        created_at: row
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on message '{}': {}", row.created_at, row.id, e);
                chrono::DateTime::default()
            }),
    }
}
