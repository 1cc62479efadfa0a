//! Sayso Transcriber - resolve media links, transcribe them into timed paragraphs and export subtitles
//!
//! This library turns an arbitrary user-supplied URL or uploaded file into fetchable media,
//! submits it to an OpenAI-compatible transcription provider, merges the returned segments into
//! readable paragraphs, optionally translates them and renders SRT subtitles.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod media;
pub mod output;
pub mod server;
pub mod storage;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{MediaResolutionPipeline, ResolutionStrategy, ResolvedMedia};
pub use media::MediaType;
pub use transcribe::{Paragraph, Segment, TranscriptionPipeline, TranscriptionRequest, TranscriptionResult};

/// Result type used at the binary and configuration edges
pub type Result<T> = anyhow::Result<T>;

/// Result type used by the transcription core
pub type CoreResult<T> = std::result::Result<T, TranscriptorError>;

/// Error types specific to the transcriptor
#[derive(thiserror::Error, Debug)]
pub enum TranscriptorError {
    #[error("Could not resolve media URL: {url}")]
    ResolutionExhausted { url: String },

    #[error("Unsupported media type: {content_type}. URL: {url}")]
    UnsupportedMediaType { content_type: String, url: String },

    #[error("Failed to fetch media: HTTP {status}")]
    UpstreamFetchFailed { status: u16, url: String },

    #[error("Provider request failed: {0}")]
    Provider(String),

    #[error("Missing input: provide a file upload or a url")]
    MissingInput,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Media is {size} bytes, larger than the {limit} byte limit")]
    MediaTooLarge { size: u64, limit: u64 },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transcript storage failed: {0}")]
    Storage(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}
