use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared across parley-api (REST middleware) and the gateway
/// upgrade. Canonical definition lives here in parley-types to eliminate
/// duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Messages --

/// One send request: optional text plus at most one attachment payload
/// per kind. Attachment payloads are base64 data URIs; `filename` is only
/// meaningful alongside `file`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub file: Option<String>,
    pub filename: Option<String>,
}

/// A persisted message as it appears on the wire. Attachment fields hold
/// storage URLs and serialize as explicit nulls when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub file: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Errors --

/// The single error body every failed request resolves to.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_serializes_null_attachments() {
        let msg = MessageResponse {
            id: Uuid::nil(),
            sender_id: Uuid::nil(),
            receiver_id: Uuid::nil(),
            text: Some("hi".into()),
            image: None,
            video: None,
            audio: None,
            file: None,
            created_at: chrono::DateTime::default(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["text"], "hi");
        assert!(json["image"].is_null());
        assert!(json["video"].is_null());
        assert!(json["audio"].is_null());
        assert!(json["file"].is_null());
        assert!(json.get("senderId").is_some());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn send_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<SendMessageRequest>(r#"{"text":"x","caption":"y"}"#);
        assert!(err.is_err());
    }
}
