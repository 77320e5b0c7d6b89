pub mod pipeline;
pub mod upload;

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

pub use pipeline::{AttachmentRequest, ResolvedAttachments, resolve_attachments};
pub use upload::{HttpUploader, UploadedObject, Uploader};

/// Classification of an uploaded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

impl AttachmentKind {
    /// Resource-type hint passed to the upload API. The store has no
    /// dedicated audio class; audio goes up under the video hint and still
    /// resolves to a directly playable URL.
    pub fn resource_type(self) -> ResourceType {
        match self {
            AttachmentKind::Image => ResourceType::Image,
            AttachmentKind::Video | AttachmentKind::Audio => ResourceType::Video,
            AttachmentKind::File => ResourceType::Raw,
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::File => "file",
        };
        f.write_str(name)
    }
}

/// Resource classes the upload API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Video,
    Raw,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
        }
    }
}

/// Every media failure is attributable to the caller's payload and aborts
/// the send before anything is persisted. The offending kind is always
/// named so the sender knows which slot to fix.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("{kind} upload failed: {reason}")]
    Rejected { kind: AttachmentKind, reason: String },

    #[error("{kind} upload failed: {source}")]
    Upload {
        kind: AttachmentKind,
        #[source]
        source: anyhow::Error,
    },
}

impl MediaError {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            MediaError::Rejected { kind, .. } | MediaError::Upload { kind, .. } => *kind,
        }
    }
}

/// Derive a storage object key from a client-supplied filename: characters
/// outside [A-Za-z0-9_-] (spaces, punctuation, path separators) become `_`.
pub fn sanitize_object_key(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Decode a `data:<mediatype>;base64,<payload>` URI into raw bytes.
/// Anything that is not a well-formed base64 data URI is a rejection.
pub(crate) fn decode_data_uri(kind: AttachmentKind, payload: &str) -> Result<Vec<u8>, MediaError> {
    if !payload.starts_with("data:") {
        return Err(MediaError::Rejected {
            kind,
            reason: "payload is not a data URI".into(),
        });
    }

    let encoded = payload
        .split_once(";base64,")
        .map(|(_, rest)| rest)
        .ok_or_else(|| MediaError::Rejected {
            kind,
            reason: "payload is not base64 encoded".into(),
        })?;

    B64.decode(encoded).map_err(|e| MediaError::Rejected {
        kind,
        reason: format!("invalid base64 payload: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_leaves_nothing_outside_charset() {
        let key = sanitize_object_key("a b#1.txt");
        assert_eq!(key, "a_b_1_txt");
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));

        assert_eq!(sanitize_object_key("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_object_key("report-v2_final"), "report-v2_final");
    }

    #[test]
    fn audio_maps_to_video_resource_type() {
        assert_eq!(AttachmentKind::Audio.resource_type(), ResourceType::Video);
        assert_eq!(AttachmentKind::Image.resource_type(), ResourceType::Image);
        assert_eq!(AttachmentKind::File.resource_type(), ResourceType::Raw);
    }

    #[test]
    fn decode_rejects_non_data_uris() {
        let err = decode_data_uri(AttachmentKind::Video, "https://example.com/clip.mp4")
            .unwrap_err();
        assert_eq!(err.kind(), AttachmentKind::Video);

        let err = decode_data_uri(AttachmentKind::Video, "data:video/mp4,rawbody").unwrap_err();
        assert!(matches!(err, MediaError::Rejected { .. }));
    }

    #[test]
    fn decode_round_trips_base64() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n");
        let uri = format!("data:image/png;base64,{}", encoded);
        let bytes = decode_data_uri(AttachmentKind::Image, &uri).unwrap();
        assert_eq!(&bytes, b"\x89PNG\r\n");
    }
}
