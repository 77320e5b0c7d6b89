use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::ResourceType;

/// A successfully stored object.
#[derive(Debug, Clone)]
pub struct UploadedObject {
    /// Canonical URL the object can be fetched from.
    pub url: String,
}

/// External object-storage upload API. Timeouts and retries belong to the
/// implementation, not to callers.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        payload: &[u8],
        resource_type: ResourceType,
        object_key: Option<&str>,
    ) -> Result<UploadedObject>;
}

/// Uploader backed by a Cloudinary-shaped HTTP API: unsigned multipart
/// POST to `{base_url}/{resource_type}/upload`, JSON response carrying
/// the stored object's `secure_url`.
pub struct HttpUploader {
    client: reqwest::Client,
    base_url: String,
    upload_preset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl HttpUploader {
    pub fn new(base_url: impl Into<String>, upload_preset: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            upload_preset,
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        payload: &[u8],
        resource_type: ResourceType,
        object_key: Option<&str>,
    ) -> Result<UploadedObject> {
        let url = format!(
            "{}/{}/upload",
            self.base_url.trim_end_matches('/'),
            resource_type.as_str()
        );

        let mut form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(payload.to_vec()));
        if let Some(preset) = &self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }
        if let Some(key) = object_key {
            form = form.text("public_id", key.to_string());
        }

        debug!("Uploading {} bytes to {}", payload.len(), url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?
            .error_for_status()
            .context("upload rejected by storage service")?;

        let body: UploadResponse = response
            .json()
            .await
            .context("malformed upload response")?;

        Ok(UploadedObject { url: body.secure_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_multipart_to_resource_typed_endpoint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secure_url": "https://store.example/image/v1/abc.png"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new(mock_server.uri(), None);
        let stored = uploader
            .upload(b"png-bytes", ResourceType::Image, None)
            .await
            .unwrap();

        assert_eq!(stored.url, "https://store.example/image/v1/abc.png");
    }

    #[tokio::test]
    async fn sends_object_key_as_public_id() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raw/upload"))
            .and(body_string_contains("public_id"))
            .and(body_string_contains("a_b_1_txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secure_url": "https://store.example/raw/a_b_1_txt"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new(mock_server.uri(), None);
        let stored = uploader
            .upload(b"file-bytes", ResourceType::Raw, Some("a_b_1_txt"))
            .await
            .unwrap();

        assert_eq!(stored.url, "https://store.example/raw/a_b_1_txt");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/video/upload"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new(mock_server.uri(), Some("chat-preset".into()));
        let err = uploader
            .upload(b"mp4-bytes", ResourceType::Video, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("rejected"));
    }
}
