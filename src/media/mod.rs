use futures_util::StreamExt;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::extractors::ResolvedMedia;
use crate::utils;
use crate::{CoreResult, TranscriptorError};

/// Media types the transcription provider accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    AudioFlac,
    AudioM4a,
    AudioMp3,
    AudioMpeg,
    AudioMpga,
    AudioOgg,
    AudioOga,
    AudioWav,
    AudioWebm,
    VideoMp4,
    VideoMpeg,
    VideoWebm,
}

impl MediaType {
    pub const ALL: [MediaType; 12] = [
        MediaType::AudioFlac,
        MediaType::AudioM4a,
        MediaType::AudioMp3,
        MediaType::AudioMpeg,
        MediaType::AudioMpga,
        MediaType::AudioOgg,
        MediaType::AudioOga,
        MediaType::AudioWav,
        MediaType::AudioWebm,
        MediaType::VideoMp4,
        MediaType::VideoMpeg,
        MediaType::VideoWebm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::AudioFlac => "audio/flac",
            MediaType::AudioM4a => "audio/m4a",
            MediaType::AudioMp3 => "audio/mp3",
            MediaType::AudioMpeg => "audio/mpeg",
            MediaType::AudioMpga => "audio/mpga",
            MediaType::AudioOgg => "audio/ogg",
            MediaType::AudioOga => "audio/oga",
            MediaType::AudioWav => "audio/wav",
            MediaType::AudioWebm => "audio/webm",
            MediaType::VideoMp4 => "video/mp4",
            MediaType::VideoMpeg => "video/mpeg",
            MediaType::VideoWebm => "video/webm",
        }
    }

    /// Exact, case-sensitive lookup in the allow-list
    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|media_type| media_type.as_str() == mime)
    }

    /// Guess from a lower-cased file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mp4" => Some(MediaType::VideoMp4),
            "mp3" => Some(MediaType::AudioMp3),
            "wav" => Some(MediaType::AudioWav),
            "m4a" => Some(MediaType::AudioM4a),
            "webm" => Some(MediaType::VideoWebm),
            "ogg" => Some(MediaType::AudioOgg),
            "oga" => Some(MediaType::AudioOga),
            "mpeg" => Some(MediaType::VideoMpeg),
            "mpga" => Some(MediaType::AudioMpga),
            "flac" => Some(MediaType::AudioFlac),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a supported media type, trusting the declared content type before the URL extension
pub fn classify(url: &str, content_type: Option<&str>) -> Option<MediaType> {
    content_type
        .and_then(MediaType::from_mime)
        .or_else(|| guess_from_url(url))
}

/// Guess a media type from the URL path's file extension
pub fn guess_from_url(url: &str) -> Option<MediaType> {
    let parsed = Url::parse(url).ok()?;
    utils::url_path_extension(&parsed).and_then(|ext| MediaType::from_extension(&ext))
}

/// Classify or fail with an error naming both the declared type and the resolved URL
pub fn require_supported(url: &str, content_type: Option<&str>) -> CoreResult<MediaType> {
    classify(url, content_type).ok_or_else(|| TranscriptorError::UnsupportedMediaType {
        content_type: content_type.unwrap_or("application/octet-stream").to_string(),
        url: url.to_string(),
    })
}

/// Media bytes ready for the transcription provider
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub media_type: MediaType,
}

/// Raw body and declared content type of a fetched media URL
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Downloads resolved media with browser-like headers and a size cap
pub struct MediaFetcher {
    client: Client,
    max_bytes: u64,
}

impl MediaFetcher {
    pub fn new(client: Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    /// Fetch the resolved URL; `referer` is the URL the user originally supplied
    pub async fn fetch(&self, resolved: &ResolvedMedia, referer: &str) -> CoreResult<FetchedMedia> {
        tracing::info!("Fetching media from: {}", resolved.direct_url);

        let response = self
            .client
            .get(&resolved.direct_url)
            .header(USER_AGENT, utils::BROWSER_USER_AGENT)
            .header(ACCEPT_LANGUAGE, utils::ACCEPT_LANGUAGE)
            .header(REFERER, referer)
            .send()
            .await
            .map_err(|e| fetch_error(e, &resolved.direct_url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptorError::UpstreamFetchFailed {
                status: status.as_u16(),
                url: resolved.direct_url.clone(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(TranscriptorError::MediaTooLarge { size: length, limit: self.max_bytes });
            }
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_error(e, &resolved.direct_url))?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_bytes {
                return Err(TranscriptorError::MediaTooLarge {
                    size: bytes.len() as u64,
                    limit: self.max_bytes,
                });
            }
        }

        tracing::debug!("Fetched {}", utils::format_file_size(bytes.len() as u64));

        Ok(FetchedMedia {
            bytes,
            // a type reported by the resolver wins over the response header
            content_type: resolved.content_type.clone().or(header_type),
        })
    }
}

fn fetch_error(err: reqwest::Error, url: &str) -> TranscriptorError {
    if err.is_timeout() {
        TranscriptorError::Timeout(format!("fetching media from {}", url))
    } else {
        TranscriptorError::UpstreamFetchFailed {
            status: err.status().map(|s| s.as_u16()).unwrap_or(502),
            url: url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_accepted_verbatim() {
        for media_type in MediaType::ALL {
            assert_eq!(MediaType::from_mime(media_type.as_str()), Some(media_type));
        }
    }

    #[test]
    fn test_rejects_outside_allow_list() {
        for mime in [
            "audio/MP3",
            "Video/mp4",
            "video/mp4; codecs=avc1",
            "audio/aac",
            "application/octet-stream",
            "text/html",
            "",
        ] {
            assert_eq!(MediaType::from_mime(mime), None, "{mime} should be rejected");
        }
    }

    #[test]
    fn test_declared_type_is_preferred() {
        let media_type = classify("https://cdn.example.com/a.mp3", Some("video/webm"));
        assert_eq!(media_type, Some(MediaType::VideoWebm));
    }

    #[test]
    fn test_falls_back_to_extension() {
        let media_type = classify("https://cdn.example.com/a.MP3?sig=abc", Some("application/octet-stream"));
        assert_eq!(media_type, Some(MediaType::AudioMp3));

        assert_eq!(classify("https://cdn.example.com/a.oga", None), Some(MediaType::AudioOga));
    }

    #[test]
    fn test_unclassifiable_names_both_type_and_url() {
        let err = require_supported("https://cdn.example.com/page", Some("text/html")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("text/html"));
        assert!(message.contains("https://cdn.example.com/page"));
    }
}
