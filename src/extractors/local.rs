use std::path::Path;
use tokio::fs;

use crate::media::{MediaPayload, MediaType};
use crate::{CoreResult, TranscriptorError};

/// Turns local files and uploaded bytes into provider-ready payloads
pub struct LocalFileExtractor {
    max_bytes: u64,
}

impl LocalFileExtractor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Check if input is a local file path rather than a URL
    pub fn is_local_file(input: &str) -> bool {
        // Anything with a scheme is a URL, supported or not
        if input.contains("://") {
            return false;
        }

        let path = Path::new(input);
        if path.exists() {
            return true;
        }

        // Looks like a path: has an extension or separators
        let has_extension = path.extension().is_some();
        let has_path_separators = input.contains('/') || input.contains('\\');

        has_extension || has_path_separators
    }

    /// Check if the file exists and is accessible
    async fn validate_file(&self, path: &Path) -> CoreResult<u64> {
        let metadata = fs::metadata(path).await.map_err(|e| {
            std::io::Error::new(e.kind(), format!("Cannot access file {}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(TranscriptorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Path is not a file: {}", path.display()),
            )));
        }

        if metadata.len() == 0 {
            return Err(TranscriptorError::MissingInput);
        }

        if metadata.len() > self.max_bytes {
            return Err(TranscriptorError::MediaTooLarge {
                size: metadata.len(),
                limit: self.max_bytes,
            });
        }

        Ok(metadata.len())
    }

    /// Read a local audio/video file
    pub async fn load(&self, path: &Path) -> CoreResult<MediaPayload> {
        self.validate_file(path).await?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();

        let media_type = media_type_for_file(&file_name, None)?;
        tracing::debug!("Loading local file {} as {}", path.display(), media_type);

        let bytes = fs::read(path).await?;

        Ok(MediaPayload {
            bytes,
            file_name,
            media_type,
        })
    }

    /// Wrap uploaded bytes, classifying by declared type then by file name
    pub fn from_upload(
        &self,
        bytes: Vec<u8>,
        file_name: Option<String>,
        declared_type: Option<&str>,
    ) -> CoreResult<MediaPayload> {
        if bytes.is_empty() {
            return Err(TranscriptorError::MissingInput);
        }

        if bytes.len() as u64 > self.max_bytes {
            return Err(TranscriptorError::MediaTooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        let file_name = file_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let media_type = media_type_for_file(&file_name, declared_type)?;

        Ok(MediaPayload {
            bytes,
            file_name,
            media_type,
        })
    }
}

fn media_type_for_file(file_name: &str, declared_type: Option<&str>) -> CoreResult<MediaType> {
    let by_extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| MediaType::from_extension(&ext.to_ascii_lowercase()));

    declared_type
        .and_then(MediaType::from_mime)
        .or(by_extension)
        .ok_or_else(|| TranscriptorError::UnsupportedMediaType {
            content_type: declared_type.unwrap_or("unknown").to_string(),
            url: file_name.to_string(),
        })
}
