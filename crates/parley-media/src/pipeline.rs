use tracing::debug;

use crate::upload::Uploader;
use crate::{AttachmentKind, MediaError, decode_data_uri, sanitize_object_key};

/// The attachment slots of one send request. Payloads are base64 data
/// URIs; `filename` only matters when `file` is populated. At most one
/// slot is populated per message in the current protocol, but resolution
/// stays correct if several are.
#[derive(Debug, Default)]
pub struct AttachmentRequest<'a> {
    pub image: Option<&'a str>,
    pub video: Option<&'a str>,
    pub audio: Option<&'a str>,
    pub file: Option<&'a str>,
    pub filename: Option<&'a str>,
}

impl AttachmentRequest<'_> {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.video.is_none() && self.audio.is_none() && self.file.is_none()
    }
}

/// Storage URLs for every resolved slot. A field is populated if and only
/// if the corresponding upload completed and returned a URL.
#[derive(Debug, Default, Clone)]
pub struct ResolvedAttachments {
    pub image: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub file: Option<String>,
}

/// Validate and upload every populated slot, sequentially. The first
/// failure aborts the whole resolution, so callers never see a partial
/// set — all-or-nothing per message.
pub async fn resolve_attachments(
    uploader: &dyn Uploader,
    request: &AttachmentRequest<'_>,
) -> Result<ResolvedAttachments, MediaError> {
    if request.is_empty() {
        return Ok(ResolvedAttachments::default());
    }

    let mut resolved = ResolvedAttachments::default();

    if let Some(payload) = request.image {
        // The payload must carry an image-format marker before it is
        // accepted for upload.
        if !payload.starts_with("data:image/") {
            return Err(MediaError::Rejected {
                kind: AttachmentKind::Image,
                reason: "invalid image base64 format".into(),
            });
        }
        resolved.image = Some(upload_slot(uploader, AttachmentKind::Image, payload, None).await?);
    }

    if let Some(payload) = request.video {
        resolved.video = Some(upload_slot(uploader, AttachmentKind::Video, payload, None).await?);
    }

    if let Some(payload) = request.audio {
        resolved.audio = Some(upload_slot(uploader, AttachmentKind::Audio, payload, None).await?);
    }

    if let Some(payload) = request.file {
        let object_key = request.filename.map(sanitize_object_key);
        resolved.file = Some(
            upload_slot(uploader, AttachmentKind::File, payload, object_key.as_deref()).await?,
        );
    }

    Ok(resolved)
}

async fn upload_slot(
    uploader: &dyn Uploader,
    kind: AttachmentKind,
    payload: &str,
    object_key: Option<&str>,
) -> Result<String, MediaError> {
    let bytes = decode_data_uri(kind, payload)?;

    let stored = uploader
        .upload(&bytes, kind.resource_type(), object_key)
        .await
        .map_err(|source| MediaError::Upload { kind, source })?;

    debug!("{} attachment stored at {}", kind, stored.url);
    Ok(stored.url)
}
