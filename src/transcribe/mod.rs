use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::extractors::local::LocalFileExtractor;
use crate::extractors::{self, MediaResolutionPipeline};
use crate::media::{self, MediaFetcher, MediaPayload};
use crate::output::formatters;
use crate::{utils, CoreResult, TranscriptorError};

pub mod client;
pub mod processor;
pub mod translate;

pub use client::{PlaceholderTranscriber, RawTranscription, Transcriber, WhisperTranscriber};
pub use processor::ParagraphSegmenter;
pub use translate::{ChatCompletionClient, CompletionProvider, TranslationStage};

/// Source language value asking the provider to detect the language
pub const AUTO_DETECT: &str = "auto";

/// Target language value meaning "keep the transcript in its spoken language"
pub const NO_TRANSLATION: &str = "original";

/// Atomic time-stamped unit of speech returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    pub text: String,
}

/// One or more consecutive segments merged into a readable block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Where the media for a request comes from
#[derive(Debug, Clone)]
pub enum MediaInput {
    /// A page or media URL to resolve
    Url(String),

    /// Bytes uploaded with the request
    Upload {
        bytes: Vec<u8>,
        file_name: Option<String>,
        content_type: Option<String>,
    },

    /// A file on the local disk
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub input: Option<MediaInput>,
    pub source_language: String,
    pub target_language: String,
}

impl TranscriptionRequest {
    pub fn new(input: Option<MediaInput>) -> Self {
        Self {
            input,
            source_language: AUTO_DETECT.to_string(),
            target_language: NO_TRANSLATION.to_string(),
        }
    }

    /// Set the source language; blank values keep auto-detection
    pub fn source_language(mut self, language: Option<String>) -> Self {
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            self.source_language = language.trim().to_string();
        }
        self
    }

    /// Set the target language; blank values keep the original language
    pub fn target_language(mut self, language: Option<String>) -> Self {
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            self.target_language = language.trim().to_string();
        }
        self
    }

    fn language_hint(&self) -> Option<String> {
        (self.source_language != AUTO_DETECT).then(|| self.source_language.clone())
    }
}

/// Where a transcript's media came from, for titles and persistence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaOrigin {
    pub url: Option<String>,
    pub file_name: Option<String>,
}

/// Transcription result as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    pub paragraphs: Vec<Paragraph>,
    pub srt: String,
    pub summary: String,
    pub source_language: String,
    pub target_language: String,

    /// True when the placeholder transcriber stood in for a real provider
    pub mock: bool,

    #[serde(skip)]
    pub origin: MediaOrigin,
}

impl TranscriptionResult {
    /// End of the last paragraph, in seconds
    pub fn duration(&self) -> f64 {
        self.paragraphs.last().map(|p| p.end).unwrap_or(0.0)
    }
}

/// Concatenate the first two paragraphs as a stand-in summary
pub fn summarize(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .take(2)
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Main transcription pipeline
pub struct TranscriptionPipeline {
    resolver: MediaResolutionPipeline,
    fetcher: MediaFetcher,
    local: LocalFileExtractor,
    transcriber: Arc<dyn Transcriber>,
    segmenter: ParagraphSegmenter,
    translator: TranslationStage,
}

impl TranscriptionPipeline {
    /// Create a new transcription pipeline
    pub fn new(config: &Config) -> crate::Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.fetch_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let (transcriber, translator): (Arc<dyn Transcriber>, TranslationStage) = match config.api_key() {
            Some(api_key) => {
                let transcriber = WhisperTranscriber::new(
                    api_key,
                    &config.providers.transcription_base_url,
                    &config.providers.transcription_model,
                    config.connect_timeout(),
                    config.provider_timeout(),
                )?;

                let completion_http = Client::builder()
                    .connect_timeout(config.connect_timeout())
                    .timeout(config.provider_timeout())
                    .build()
                    .context("Failed to build completion HTTP client")?;
                let completion = ChatCompletionClient::new(
                    completion_http,
                    &config.providers.completion_base_url,
                    api_key,
                    &config.providers.completion_model,
                );

                (Arc::new(transcriber), TranslationStage::new(Some(Arc::new(completion))))
            }
            None => {
                tracing::warn!("No provider API key configured; transcripts will be mock placeholders");
                (Arc::new(PlaceholderTranscriber), TranslationStage::new(None))
            }
        };

        Ok(Self {
            resolver: MediaResolutionPipeline::from_config(config, http.clone()),
            fetcher: MediaFetcher::new(http, config.app.max_media_bytes),
            local: LocalFileExtractor::new(config.app.max_media_bytes),
            transcriber,
            segmenter: ParagraphSegmenter::new(config.app.paragraph_seconds),
            translator,
        })
    }

    /// Assemble a pipeline from explicit parts
    pub fn with_components(
        resolver: MediaResolutionPipeline,
        fetcher: MediaFetcher,
        local: LocalFileExtractor,
        transcriber: Arc<dyn Transcriber>,
        segmenter: ParagraphSegmenter,
        translator: TranslationStage,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            local,
            transcriber,
            segmenter,
            translator,
        }
    }

    pub fn resolver(&self) -> &MediaResolutionPipeline {
        &self.resolver
    }

    pub fn transcriber_name(&self) -> &'static str {
        self.transcriber.name()
    }

    /// Run the whole pipeline for one request
    pub async fn run(&self, request: TranscriptionRequest) -> CoreResult<TranscriptionResult> {
        let input = request.input.clone().ok_or(TranscriptorError::MissingInput)?;

        let (payload, origin) = self.load_media(input).await?;
        tracing::info!("Transcribing {} as {} with {}", payload.file_name, payload.media_type, self.transcriber.name());

        let raw = self
            .transcriber
            .transcribe(payload, request.language_hint())
            .await?;

        let paragraphs = self.segmenter.segment(&raw.segments);
        tracing::debug!("Merged {} segments into {} paragraphs", raw.segments.len(), paragraphs.len());

        let paragraphs = self
            .translator
            .translate(paragraphs, &request.target_language)
            .await?;

        let source_language = if request.source_language == AUTO_DETECT {
            raw.detected_language.unwrap_or_else(|| AUTO_DETECT.to_string())
        } else {
            request.source_language.clone()
        };

        Ok(TranscriptionResult {
            srt: formatters::to_srt(&paragraphs),
            summary: summarize(&paragraphs),
            paragraphs,
            source_language,
            target_language: request.target_language,
            mock: raw.mock,
            origin,
        })
    }

    /// Turn any input into provider-ready bytes
    async fn load_media(&self, input: MediaInput) -> CoreResult<(MediaPayload, MediaOrigin)> {
        match input {
            MediaInput::Url(url) => {
                let parsed = extractors::validate_url(&url)?;
                let resolved = self.resolver.resolve_or_err(parsed.as_str()).await?;
                let fetched = self.fetcher.fetch(&resolved, &url).await?;
                let media_type = media::require_supported(&resolved.direct_url, fetched.content_type.as_deref())?;

                let payload = MediaPayload {
                    bytes: fetched.bytes,
                    file_name: utils::file_name_from_url(&resolved.direct_url),
                    media_type,
                };
                let origin = MediaOrigin {
                    url: Some(url),
                    file_name: None,
                };
                Ok((payload, origin))
            }
            MediaInput::Upload {
                bytes,
                file_name,
                content_type,
            } => {
                let payload = self.local.from_upload(bytes, file_name, content_type.as_deref())?;
                let origin = MediaOrigin {
                    url: None,
                    file_name: Some(payload.file_name.clone()),
                };
                Ok((payload, origin))
            }
            MediaInput::File(path) => {
                let payload = self.local.load(&path).await?;
                let origin = MediaOrigin {
                    url: None,
                    file_name: Some(payload.file_name.clone()),
                };
                Ok((payload, origin))
            }
        }
    }
}
