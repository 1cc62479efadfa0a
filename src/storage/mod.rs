use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::transcribe::{Paragraph, TranscriptionResult, NO_TRANSLATION};
use crate::{utils, CoreResult, TranscriptorError};

/// A saved transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub source_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    pub paragraphs: Vec<Paragraph>,
    pub summary: String,

    /// Seconds, the end of the last paragraph
    pub duration: f64,

    /// Placeholder text produced without a provider
    #[serde(default)]
    pub mock: bool,
    pub created_at: DateTime<Utc>,
}

/// A transcript before the store assigns its id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranscript {
    pub title: String,
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub source_language: String,
    pub target_language: Option<String>,
    pub paragraphs: Vec<Paragraph>,
    pub summary: String,
    pub duration: f64,
    pub mock: bool,
}

impl NewTranscript {
    pub fn from_result(result: &TranscriptionResult) -> Self {
        let url = result.origin.url.clone();
        let file_name = result.origin.file_name.clone();

        Self {
            title: derive_title(url.as_deref(), file_name.as_deref()),
            url,
            file_name,
            source_language: result.source_language.clone(),
            target_language: (result.target_language != NO_TRANSLATION).then(|| result.target_language.clone()),
            paragraphs: result.paragraphs.clone(),
            summary: result.summary.clone(),
            duration: result.duration(),
            mock: result.mock,
        }
    }
}

/// `<host> video` for links, the file name for uploads, otherwise `Untitled`
pub fn derive_title(url: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(domain) = url.and_then(utils::extract_domain) {
        return format!("{} video", domain);
    }

    match file_name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => "Untitled".to_string(),
    }
}

/// Persistence for finished transcripts
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn save(&self, transcript: NewTranscript) -> CoreResult<Transcript>;

    /// All transcripts, newest first
    async fn list(&self) -> CoreResult<Vec<Transcript>>;

    async fn get(&self, id: &str) -> CoreResult<Option<Transcript>>;

    /// Returns whether a transcript was removed
    async fn delete(&self, id: &str) -> CoreResult<bool>;

    async fn total_minutes(&self) -> CoreResult<f64> {
        let transcripts = self.list().await?;
        Ok(transcripts.iter().map(|t| t.duration / 60.0).sum())
    }
}

/// Anonymous store backed by a single JSON file
pub struct LocalTranscriptStore {
    path: PathBuf,
    capacity: usize,
    lock: Mutex<()>,
}

impl LocalTranscriptStore {
    pub fn new(path: PathBuf, capacity: usize) -> Self {
        Self {
            path,
            capacity: capacity.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> CoreResult<Vec<Transcript>> {
        let content = match fs_err::tokio::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(transcripts) => Ok(transcripts),
            Err(e) => {
                tracing::warn!("Ignoring unreadable transcript store {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    async fn write_all(&self, transcripts: &[Transcript]) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs_err::tokio::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(transcripts)
            .map_err(|e| TranscriptorError::Storage(format!("Failed to serialize transcripts: {}", e)))?;

        // Write beside the store and swap it in
        let tmp = self.path.with_extension("json.tmp");
        fs_err::tokio::write(&tmp, content).await?;
        fs_err::tokio::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for LocalTranscriptStore {
    async fn save(&self, transcript: NewTranscript) -> CoreResult<Transcript> {
        let _guard = self.lock.lock().await;

        let saved = Transcript {
            id: Uuid::new_v4().to_string(),
            title: transcript.title,
            url: transcript.url,
            file_name: transcript.file_name,
            source_language: transcript.source_language,
            target_language: transcript.target_language,
            paragraphs: transcript.paragraphs,
            summary: transcript.summary,
            duration: transcript.duration,
            mock: transcript.mock,
            created_at: Utc::now(),
        };

        let mut transcripts = self.read_all().await?;
        transcripts.insert(0, saved.clone());
        if transcripts.len() > self.capacity {
            let evicted = transcripts.len() - self.capacity;
            transcripts.truncate(self.capacity);
            tracing::debug!("Evicted {} old transcripts", evicted);
        }
        self.write_all(&transcripts).await?;

        tracing::info!("Saved transcript {} ({})", saved.id, saved.title);
        Ok(saved)
    }

    async fn list(&self) -> CoreResult<Vec<Transcript>> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Transcript>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_iter().find(|t| t.id == id))
    }

    async fn delete(&self, id: &str) -> CoreResult<bool> {
        let _guard = self.lock.lock().await;

        let mut transcripts = self.read_all().await?;
        let before = transcripts.len();
        transcripts.retain(|t| t.id != id);

        if transcripts.len() == before {
            return Ok(false);
        }

        self.write_all(&transcripts).await?;
        Ok(true)
    }
}
