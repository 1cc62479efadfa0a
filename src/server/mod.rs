use anyhow::Context;
use axum::{
    async_trait,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::storage::{LocalTranscriptStore, NewTranscript, Transcript, TranscriptStore};
use crate::transcribe::{MediaInput, TranscriptionPipeline, TranscriptionRequest, TranscriptionResult};
use crate::TranscriptorError;

pub mod error;

pub use error::ApiError;

/// Room for multipart boundaries and text fields on top of the media itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
    pub store: Arc<dyn TranscriptStore>,
    pub request_timeout: Duration,
    pub save_transcripts: bool,
    pub body_limit: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let pipeline = TranscriptionPipeline::new(config)?;
        let store = LocalTranscriptStore::new(config.store_path()?, config.app.store_capacity);

        Ok(Self {
            pipeline: Arc::new(pipeline),
            store: Arc::new(store),
            request_timeout: config.request_timeout(),
            save_transcripts: config.app.save_transcripts,
            body_limit: config.app.max_media_bytes as usize + MULTIPART_OVERHEAD,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit;

    Router::new()
        .route("/health", get(health))
        .route("/transcribe", post(transcribe))
        .route("/transcripts", get(list_transcripts))
        .route("/transcripts/:id", get(get_transcript).delete(delete_transcript))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &Config, bind: &str) -> crate::Result<()> {
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind server to {}", bind))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeJson {
    url: Option<String>,
    source_language: Option<String>,
    target_language: Option<String>,
}

/// `POST /transcribe` body, either JSON or `multipart/form-data`
#[derive(Debug)]
pub struct TranscribeBody(pub TranscriptionRequest);

#[async_trait]
impl<S> FromRequest<S> for TranscribeBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            return read_multipart(multipart).await.map(TranscribeBody);
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

        // An absent or malformed body reads as an empty request
        let body: TranscribeJson = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::debug!("Treating unparseable transcribe body as empty: {}", e);
            TranscribeJson::default()
        });

        let input = body
            .url
            .filter(|url| !url.trim().is_empty())
            .map(MediaInput::Url);

        Ok(TranscribeBody(
            TranscriptionRequest::new(input)
                .source_language(body.source_language)
                .target_language(body.target_language),
        ))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<TranscriptionRequest, ApiError> {
    let mut input = None;
    let mut url = None;
    let mut source_language = None;
    let mut target_language = None;

    let field_error = |e: axum::extract::multipart::MultipartError| ApiError::new(e.status(), e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(field_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(field_error)?;

                input = Some(MediaInput::Upload {
                    bytes: bytes.to_vec(),
                    file_name,
                    content_type,
                });
            }
            "url" => url = Some(field.text().await.map_err(field_error)?),
            "sourceLanguage" => source_language = Some(field.text().await.map_err(field_error)?),
            "targetLanguage" => target_language = Some(field.text().await.map_err(field_error)?),
            other => tracing::debug!("Ignoring multipart field {}", other),
        }
    }

    // An uploaded file wins over a url field
    let input = input.or_else(|| url.filter(|u| !u.trim().is_empty()).map(MediaInput::Url));

    Ok(TranscriptionRequest::new(input)
        .source_language(source_language)
        .target_language(target_language))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeResponse {
    #[serde(flatten)]
    pub result: TranscriptionResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<String>,
}

async fn transcribe(
    State(state): State<AppState>,
    TranscribeBody(request): TranscribeBody,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let result = tokio::time::timeout(state.request_timeout, state.pipeline.run(request))
        .await
        .map_err(|_| {
            TranscriptorError::Timeout(format!(
                "transcription did not finish within {}s",
                state.request_timeout.as_secs()
            ))
        })??;

    let transcript_id = if state.save_transcripts {
        match state.store.save(NewTranscript::from_result(&result)).await {
            Ok(saved) => Some(saved.id),
            Err(e) => {
                tracing::warn!("Transcript was not saved: {}", e);
                None
            }
        }
    } else {
        None
    };

    Ok(Json(TranscribeResponse { result, transcript_id }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptList {
    pub transcripts: Vec<Transcript>,
    pub total_minutes: f64,
}

async fn list_transcripts(State(state): State<AppState>) -> Result<Json<TranscriptList>, ApiError> {
    let transcripts = state.store.list().await?;
    let total_minutes = transcripts.iter().map(|t| t.duration / 60.0).sum();

    Ok(Json(TranscriptList {
        transcripts,
        total_minutes,
    }))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transcript>, ApiError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Transcript"))
}

async fn delete_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Transcript"))
    }
}
