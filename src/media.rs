use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::error::StudioError;

const FALLBACK_MIME: &str = "image/jpeg";

/// The uploaded photo. Only ever read by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, StudioError> {
        if bytes.is_empty() {
            return Err(StudioError::InvalidImage("image payload is empty".into()));
        }
        Ok(Self { mime_type: mime_type.into(), bytes })
    }

    /// Raw file contents; media type is sniffed from the magic bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, StudioError> {
        let mime = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or(FALLBACK_MIME);
        Self::new(mime, bytes)
    }

    /// Accepts `data:image/<type>;base64,<payload>` or a bare base64 payload.
    /// Without a recognizable prefix the media type defaults to JPEG.
    pub fn from_data_url(encoded: &str) -> Result<Self, StudioError> {
        let encoded = encoded.trim();
        let (mime, payload) = match split_data_url(encoded) {
            Some((mime, payload)) => (mime, payload),
            None => (FALLBACK_MIME, encoded),
        };
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| StudioError::InvalidImage(format!("payload is not valid base64: {e}")))?;
        Self::new(mime, bytes)
    }

    pub async fn from_path(path: &Path) -> Result<Self, StudioError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

fn split_data_url(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let subtype = mime.strip_prefix("image/")?;
    let valid = !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphabetic() || c == '+');
    valid.then_some((mime, payload))
}

/// One successful variation, handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    pub id: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub seed: u32,
}

impl GeneratedImage {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_sets_mime_and_is_stripped() {
        let img = SourceImage::from_data_url("data:image/webp;base64,aGVsbG8=").unwrap();
        assert_eq!(img.mime_type(), "image/webp");
        assert_eq!(img.bytes(), b"hello");
        assert_eq!(img.to_base64(), "aGVsbG8=");
    }

    #[test]
    fn bare_base64_defaults_to_jpeg() {
        let img = SourceImage::from_data_url("aGVsbG8=").unwrap();
        assert_eq!(img.mime_type(), "image/jpeg");
    }

    #[test]
    fn empty_or_garbage_payload_is_rejected() {
        assert!(matches!(SourceImage::from_data_url("data:image/png;base64,"), Err(StudioError::InvalidImage(_))));
        assert!(matches!(SourceImage::from_data_url("not base64 at all!"), Err(StudioError::InvalidImage(_))));
        assert!(SourceImage::new("image/png", Vec::new()).is_err());
    }

    #[test]
    fn png_magic_is_sniffed() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let img = SourceImage::from_bytes(png.to_vec()).unwrap();
        assert_eq!(img.mime_type(), "image/png");
    }

    #[test]
    fn generated_image_round_trips_to_data_url() {
        let g = GeneratedImage { id: "gen-1-0".into(), bytes: b"hi".to_vec(), mime_type: "image/png".into(), seed: 7 };
        assert_eq!(g.to_data_url(), "data:image/png;base64,aGk=");
        assert_eq!(g.extension(), "png");
    }
}
