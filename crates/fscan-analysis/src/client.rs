//! Gemini AI client for frame batch analysis.
//!
//! Submits a batch of frame images to the Gemini `generateContent` API in a
//! single call and parses one [`FrameReport`] per frame out of the JSON
//! response.

use std::future::Future;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fscan_models::FrameReport;

use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::record_request;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Extracted frames are always PNG.
const FRAME_MIME_TYPE: &str = "image/png";

/// One frame's content, ready for submission.
#[derive(Debug, Clone)]
pub struct FramePayload {
    /// File name, for logging.
    pub file_name: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl FramePayload {
    /// Create a payload from a name and raw bytes.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

/// The seam between the batch scheduler and the remote service.
///
/// Implementations analyze an ordered batch of frames and return exactly
/// one report per frame, in input order.
pub trait FrameAnalyzer: Send + Sync + 'static {
    fn analyze_frames(
        &self,
        frames: &[FramePayload],
    ) -> impl Future<Output = AnalysisResult<Vec<FrameReport>>> + Send;
}

impl<T: FrameAnalyzer> FrameAnalyzer for std::sync::Arc<T> {
    fn analyze_frames(
        &self,
        frames: &[FramePayload],
    ) -> impl Future<Output = AnalysisResult<Vec<FrameReport>>> + Send {
        (**self).analyze_frames(frames)
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(data: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: FRAME_MIME_TYPE.to_string(),
                data: STANDARD.encode(data),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Create a client from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> AnalysisResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AnalysisError::config("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_generate_content(
        &self,
        frames: &[FramePayload],
    ) -> AnalysisResult<Vec<FrameReport>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mut parts = vec![Part::text(build_prompt(frames.len()))];
        parts.extend(frames.iter().map(|f| Part::image(&f.data)));

        let request = GeminiRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        debug!(
            frames = frames.len(),
            model = %self.model,
            first = %frames[0].file_name,
            "Submitting frame batch"
        );

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        record_request(status.as_str());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::rate_limited(body));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::service(status.as_u16(), body));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::malformed(format!("Failed to parse response envelope: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| AnalysisError::malformed("No content in response"))?;

        let reports: Vec<FrameReport> = serde_json::from_str(strip_code_fences(text))
            .map_err(|e| AnalysisError::malformed(format!("Failed to parse reports JSON: {}", e)))?;

        if reports.len() != frames.len() {
            return Err(AnalysisError::malformed(format!(
                "Expected {} reports, got {}",
                frames.len(),
                reports.len()
            )));
        }

        info!(frames = frames.len(), "Frame batch analyzed");
        Ok(reports)
    }
}

impl FrameAnalyzer for GeminiClient {
    async fn analyze_frames(&self, frames: &[FramePayload]) -> AnalysisResult<Vec<FrameReport>> {
        self.call_generate_content(frames).await
    }
}

/// Build the instruction prompt for a batch of `count` frames.
fn build_prompt(count: usize) -> String {
    format!(
        r#"Analyze the {count} attached video frames, in the order they are attached.

IMPORTANT: You must strictly follow this output format.
Return ONLY a JSON array with exactly {count} objects, one per frame, in attachment order:
[
  {{
    "description": "One or two sentences on what the frame shows",
    "labels": ["subject", "subject"]
  }}
]

Additional instructions:
- Return ONLY the JSON array and nothing else.
- Use short lowercase labels for the dominant subjects.
- Never merge or skip frames; the array length must be exactly {count}.
"#
    )
}

/// Strip markdown code fences the model sometimes wraps JSON in.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}
