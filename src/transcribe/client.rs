use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::Segment;
use crate::media::MediaPayload;
use crate::{CoreResult, TranscriptorError};

/// Segments and detected language returned by a transcription provider
#[derive(Debug, Clone, PartialEq)]
pub struct RawTranscription {
    pub segments: Vec<Segment>,
    pub detected_language: Option<String>,

    /// Set when the placeholder transcriber produced this result
    pub mock: bool,
}

/// Submits media to a speech-to-text provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe with segment-level timestamps; `language` is a hint, `None` auto-detects
    async fn transcribe(&self, media: MediaPayload, language: Option<String>) -> CoreResult<RawTranscription>;

    /// Get the name of this provider
    fn name(&self) -> &'static str;
}

/// `verbose_json` response of the OpenAI-compatible transcription endpoint
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WireSegment>,
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_headers(api_key: &str) -> CoreResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| TranscriptorError::Provider(format!("Invalid authorization header value: {}", e)))?,
    );
    Ok(headers)
}

/// Client for `POST {base}/audio/transcriptions`
pub struct WhisperTranscriber {
    client: Client,
    base_url: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        connect_timeout: std::time::Duration,
        timeout: std::time::Duration,
    ) -> CoreResult<Self> {
        let client = Client::builder()
            .default_headers(build_headers(api_key)?)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptorError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, media: MediaPayload, language: Option<String>) -> CoreResult<RawTranscription> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        tracing::info!(
            "Submitting {} ({}, {} bytes) to {}",
            media.file_name,
            media.media_type,
            media.bytes.len(),
            url
        );

        let part = Part::bytes(media.bytes)
            .file_name(media.file_name)
            .mime_str(media.media_type.as_str())
            .map_err(|e| TranscriptorError::Provider(format!("Failed to create audio part: {}", e)))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if let Some(language) = language {
            form = form.text("language", language);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| provider_error("Transcription", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptorError::Provider(error_message("Transcription", status, &body)));
        }

        let body: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| provider_error("Transcription", e))?;

        let segments = body
            .segments
            .into_iter()
            .map(|s| Segment {
                start: s.start,
                end: s.end.max(s.start),
                text: s.text.trim().to_string(),
            })
            .collect::<Vec<_>>();

        tracing::debug!("Received {} segments (language: {:?})", segments.len(), body.language);

        Ok(RawTranscription {
            segments,
            detected_language: body.language,
            mock: false,
        })
    }

    fn name(&self) -> &'static str {
        "OpenAI-compatible"
    }
}

/// Placeholder used when no provider credential is configured
///
/// Results are always flagged `mock` so they can't pass for a real transcript.
pub struct PlaceholderTranscriber;

impl PlaceholderTranscriber {
    pub const TEXT: &'static str =
        "This is a mock transcript paragraph. Configure a transcription API key to transcribe real audio.";

    pub fn segments() -> Vec<Segment> {
        vec![
            Segment {
                start: 0.0,
                end: 4.2,
                text: Self::TEXT.to_string(),
            },
            Segment {
                start: 4.2,
                end: 8.9,
                text: format!("{} Second segment.", Self::TEXT),
            },
        ]
    }
}

#[async_trait]
impl Transcriber for PlaceholderTranscriber {
    async fn transcribe(&self, media: MediaPayload, _language: Option<String>) -> CoreResult<RawTranscription> {
        tracing::warn!(
            "No transcription API key configured; returning a mock transcript for {}",
            media.file_name
        );

        Ok(RawTranscription {
            segments: Self::segments(),
            detected_language: Some("en".to_string()),
            mock: true,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub(crate) fn provider_error(what: &str, err: reqwest::Error) -> TranscriptorError {
    if err.is_timeout() {
        TranscriptorError::Timeout(format!("{} provider did not respond in time", what))
    } else {
        TranscriptorError::Provider(format!("{} request failed: {}", what, err))
    }
}

/// Prefer the provider's own error message when the body carries one
pub(crate) fn error_message(what: &str, status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if !body.trim().is_empty() => format!("{} failed with status {}: {}", what, status, body.trim()),
        Err(_) => format!("{} failed with status {}", what, status),
    }
}
