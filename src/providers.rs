use std::{io::Cursor, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};

use crate::config::ApiKey;
use crate::error::{ProviderError, StudioError};
use crate::settings::AspectRatio;

/// Everything that is identical across the attempts of one batch. Built once.
#[derive(Debug)]
pub struct BatchPayload {
    pub model: String,
    pub prompt: String,
    pub mime_type: String,
    pub image_base64: String,
}

/// One outbound generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub attempt: usize,
    pub seed: u32,
    pub aspect_ratio: AspectRatio,
    pub payload: Arc<BatchPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Image { mime_type: String, data: String },
    Text(String),
    Other,
}

/// Parts of the first candidate, in the order the model returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub parts: Vec<ResponsePart>,
}

impl ModelResponse {
    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { parts: vec![ResponsePart::Image { mime_type: mime_type.into(), data: data.into() }] }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![ResponsePart::Text(text.into())] }
    }

    /// First image part in declared order.
    pub fn first_image(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|p| match p {
            ResponsePart::Image { mime_type, data } => Some((mime_type.as_str(), data.as_str())),
            _ => None,
        })
    }

    /// Concatenated text parts, if any.
    pub fn joined_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        (!texts.is_empty()).then(|| texts.join(""))
    }
}

#[async_trait]
pub trait ImageTransport: Send + Sync {
    async fn generate(&self, key: &ApiKey, request: &GenerationRequest) -> Result<ModelResponse, ProviderError>;
    fn name(&self) -> &'static str;
}

// ---- Gemini generateContent -------------------------------------------------

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiTransport {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StudioError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StudioError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline(InlinePart<'a>),
    Text(TextPart<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlinePart<'a> {
    inline_data: Blob<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    seed: u32,
    response_modalities: [&'static str; 2],
    image_config: ImageConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig<'a> {
    aspect_ratio: &'a str,
}

fn encode_request(req: &GenerationRequest) -> GenerateContentRequest<'_> {
    let p = &req.payload;
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                RequestPart::Inline(InlinePart { inline_data: Blob { mime_type: &p.mime_type, data: &p.image_base64 } }),
                RequestPart::Text(TextPart { text: &p.prompt }),
            ],
        }],
        generation_config: GenerationConfig {
            seed: req.seed,
            response_modalities: ["IMAGE", "TEXT"],
            image_config: ImageConfig { aspect_ratio: req.aspect_ratio.as_str() },
        },
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct WirePart {
    text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<WireBlob>,
}

#[derive(Deserialize)]
struct WireBlob {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

fn decode_response(resp: GenerateContentResponse) -> ModelResponse {
    let parts = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .map(|p| match (p.inline_data, p.text) {
            (Some(blob), _) => ResponsePart::Image {
                mime_type: blob.mime_type.unwrap_or_else(|| "image/png".into()),
                data: blob.data,
            },
            (None, Some(text)) => ResponsePart::Text(text),
            (None, None) => ResponsePart::Other,
        })
        .collect();
    ModelResponse { parts }
}

#[async_trait]
impl ImageTransport for GeminiTransport {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, key: &ApiKey, request: &GenerationRequest) -> Result<ModelResponse, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint(&request.payload.model))
            .header("x-goog-api-key", key.expose())
            .json(&encode_request(request))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(if status.is_server_error() {
                ProviderError::Http(format!("HTTP {status}: {snippet}"))
            } else {
                ProviderError::Fatal(format!("HTTP {status}: {snippet}"))
            });
        }

        let body: GenerateContentResponse = resp.json().await?;
        Ok(decode_response(body))
    }
}

// ---- Offline ---------------------------------------------------------------

/// Synthesizes a PNG locally. Used for dry runs without network access.
pub struct MockTransport;

#[async_trait]
impl ImageTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, _key: &ApiKey, request: &GenerationRequest) -> Result<ModelResponse, ProviderError> {
        let (w, h) = mock_dimensions(request.aspect_ratio);
        let tint = (request.payload.prompt.len() % 255) as u8;
        let shift = (request.seed % 256) as u32;
        let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = (((x + shift) ^ y) & 0xFF) as u8;
            *p = Rgba([v, 255 - v, tint, 255]);
        }
        let mut png_bytes: Vec<u8> = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| ProviderError::Fatal(format!("encode error: {e}")))?;

        Ok(ModelResponse::image("image/png", STANDARD.encode(&png_bytes)))
    }
}

fn mock_dimensions(ar: AspectRatio) -> (u32, u32) {
    match ar {
        AspectRatio::Square => (256, 256),
        AspectRatio::Portrait3x4 => (192, 256),
        AspectRatio::Landscape4x3 => (256, 192),
        AspectRatio::Tall9x16 => (144, 256),
        AspectRatio::Wide16x9 => (256, 144),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(seed: u32) -> GenerationRequest {
        GenerationRequest {
            attempt: 0,
            seed,
            aspect_ratio: AspectRatio::Tall9x16,
            payload: Arc::new(BatchPayload {
                model: "gemini-2.5-flash-image".into(),
                prompt: "Enhance this image professionally.".into(),
                mime_type: "image/jpeg".into(),
                image_base64: "AAAA".into(),
            }),
        }
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let req = request(1234);
        let body = serde_json::to_value(encode_request(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        { "inlineData": { "mimeType": "image/jpeg", "data": "AAAA" } },
                        { "text": "Enhance this image professionally." }
                    ]
                }],
                "generationConfig": {
                    "seed": 1234,
                    "responseModalities": ["IMAGE", "TEXT"],
                    "imageConfig": { "aspectRatio": "9:16" }
                }
            })
        );
    }

    #[test]
    fn first_image_part_wins_over_leading_text() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "Zmlyc3Q=" } },
                    { "inlineData": { "mimeType": "image/png", "data": "c2Vjb25k" } }
                ]}
            }]
        });
        let resp = decode_response(serde_json::from_value(raw).unwrap());
        assert_eq!(resp.first_image(), Some(("image/png", "Zmlyc3Q=")));
        assert_eq!(resp.joined_text().as_deref(), Some("Here you go"));
    }

    #[test]
    fn refusal_has_no_image() {
        let raw = json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't edit this photo." }] } }]
        });
        let resp = decode_response(serde_json::from_value(raw).unwrap());
        assert_eq!(resp.first_image(), None);
        assert_eq!(resp.parts, vec![ResponsePart::Text("I can't edit this photo.".into())]);
    }

    #[test]
    fn empty_or_blocked_response_decodes_to_no_parts() {
        let resp = decode_response(serde_json::from_value(json!({ "promptFeedback": {} })).unwrap());
        assert!(resp.parts.is_empty());
        let resp = decode_response(serde_json::from_value(json!({ "candidates": [{}] })).unwrap());
        assert!(resp.parts.is_empty());
    }

    #[test]
    fn unknown_part_kinds_are_kept_as_other() {
        let raw = json!({
            "candidates": [{ "content": { "parts": [
                { "functionCall": { "name": "x" } },
                { "inline_data": { "data": "AAAA" } }
            ]}}]
        });
        let resp = decode_response(serde_json::from_value(raw).unwrap());
        assert_eq!(resp.parts[0], ResponsePart::Other);
        assert_eq!(resp.first_image(), Some(("image/png", "AAAA")));
    }

    #[tokio::test]
    async fn mock_transport_produces_png_in_requested_shape() {
        let resp = MockTransport.generate(&ApiKey::new("offline"), &request(9)).await.unwrap();
        let (mime, data) = resp.first_image().unwrap();
        assert_eq!(mime, "image/png");
        let bytes = STANDARD.decode(data).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (144, 256));
    }

    #[test]
    fn endpoint_includes_model() {
        let t = GeminiTransport::new("http://localhost:9/", Duration::from_secs(5)).unwrap();
        assert_eq!(t.endpoint("m1"), "http://localhost:9/v1beta/models/m1:generateContent");
    }
}
