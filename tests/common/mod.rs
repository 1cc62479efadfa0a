#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Multipart, Query},
    http::{header::CONTENT_TYPE, StatusCode, Uri},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;

use sayso_transcriber::config::Config;

/// One in-process server playing page host, reader mirror, extractor service,
/// media CDN and OpenAI-compatible provider
pub struct MockUpstream {
    pub addr: SocketAddr,
    /// `METHOD path` of every request received, in order
    pub requests: Arc<Mutex<Vec<String>>>,
    /// `name=value` of every multipart field sent to the transcription endpoint
    pub transcription_fields: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn transcription_fields(&self) -> Vec<String> {
        self.transcription_fields.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }
}

/// Serve a router on an ephemeral local port
pub async fn serve(listener: TcpListener, app: Router) -> SocketAddr {
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve(listener, app).await
}

fn page_with_video(video_url: &str) -> String {
    format!(
        r#"<html><head><meta property="og:title" content="A reel"><meta property="og:video" content="{}"></head><body></body></html>"#,
        video_url
    )
}

pub async fn mock_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{}", addr);

    let requests = Arc::new(Mutex::new(Vec::new()));
    let transcription_fields = Arc::new(Mutex::new(Vec::new()));

    let clip_url = format!("{}/media/clip.mp4", base);
    let voice_url = format!("{}/media/voice.mp3", base);
    let blob_url = format!("{}/media/blob.bin", base);

    let app = Router::new()
        .route(
            "/media/clip.mp4",
            get(|| async { ([(CONTENT_TYPE, "video/mp4")], vec![0u8; 64]) }),
        )
        .route(
            "/media/voice.mp3",
            get(|| async { ([(CONTENT_TYPE, "audio/mpeg")], vec![1u8; 32]) }),
        )
        .route(
            "/media/blob.bin",
            get(|| async { ([(CONTENT_TYPE, "application/octet-stream")], vec![2u8; 16]) }),
        )
        .route("/media/forbidden.mp4", get(|| async { StatusCode::FORBIDDEN }))
        .route(
            "/reel/abc/",
            get({
                let clip_url = clip_url.clone();
                move || async move { Html(page_with_video(&clip_url)) }
            }),
        )
        .route("/reel/blocked/", get(|| async { StatusCode::FORBIDDEN }))
        .route("/reel/empty/", get(|| async { Html("<html><head></head></html>") }))
        .route(
            "/mirror/*rest",
            get({
                let clip_url = clip_url.clone();
                move |uri: Uri| async move {
                    if uri.path().contains("/reel/blocked/") {
                        Html(page_with_video(&clip_url)).into_response()
                    } else {
                        StatusCode::NOT_FOUND.into_response()
                    }
                }
            }),
        )
        .route(
            "/extract",
            get(move |Query(query): Query<HashMap<String, String>>| {
                let voice_url = voice_url.clone();
                let blob_url = blob_url.clone();
                async move {
                    let target = query.get("url").cloned().unwrap_or_default();
                    if target.contains("/watch/") {
                        Json(serde_json::json!({ "directUrl": voice_url, "contentType": "audio/mpeg" }))
                            .into_response()
                    } else if target.contains("/odd/") {
                        Json(serde_json::json!({ "directUrl": blob_url, "contentType": "application/x-foo" }))
                            .into_response()
                    } else {
                        StatusCode::NOT_FOUND.into_response()
                    }
                }
            }),
        )
        .route(
            "/v1/audio/transcriptions",
            post({
                let fields = transcription_fields.clone();
                move |mut multipart: Multipart| {
                    let fields = fields.clone();
                    async move {
                        while let Ok(Some(field)) = multipart.next_field().await {
                            let name = field.name().unwrap_or_default().to_string();
                            let value = if name == "file" {
                                field.file_name().unwrap_or_default().to_string()
                            } else {
                                field.text().await.unwrap_or_default()
                            };
                            fields.lock().unwrap().push(format!("{}={}", name, value));
                        }

                        Json(serde_json::json!({
                            "task": "transcribe",
                            "language": "english",
                            "duration": 13.5,
                            "text": "Hello there. General news. Bye.",
                            "segments": [
                                { "id": 0, "start": 0.0, "end": 6.0, "text": " Hello there." },
                                { "id": 1, "start": 6.0, "end": 11.0, "text": " General   news." },
                                { "id": 2, "start": 11.0, "end": 13.5, "text": " Bye." }
                            ]
                        }))
                    }
                }
            }),
        )
        .route(
            "/v1/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                let text = body["messages"][1]["content"].as_str().unwrap_or_default().to_string();
                Json(serde_json::json!({
                    "id": "chatcmpl-1",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": format!("ES: {}", text) }
                    }]
                }))
            }),
        )
        .route(
            "/broken/audio/transcriptions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({
                        "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
                    })),
                )
            }),
        )
        .layer(axum::middleware::from_fn({
            let requests = requests.clone();
            move |req: axum::extract::Request, next: axum::middleware::Next| {
                let requests = requests.clone();
                async move {
                    requests
                        .lock()
                        .unwrap()
                        .push(format!("{} {}", req.method(), req.uri().path()));
                    next.run(req).await
                }
            }
        }));

    serve(listener, app).await;

    MockUpstream {
        addr,
        requests,
        transcription_fields,
    }
}

/// Configuration pointing every collaborator at the mock upstream
pub fn test_config(upstream: &MockUpstream, store_dir: &Path) -> Config {
    let mut config = Config::default();

    config.providers.transcription_base_url = upstream.url("/v1");
    config.providers.completion_base_url = upstream.url("/v1");
    config.providers.api_key = Some("sk-test".to_string());

    config.resolver.reader_mirror_base = upstream.url("/mirror");
    config.resolver.platform_hosts = vec!["127.0.0.1".to_string()];
    config.resolver.extractor_url = Some(upstream.url(""));
    config.resolver.subprocess_enabled = false;

    config.timeouts.connect_secs = 2;
    config.timeouts.fetch_secs = 5;
    config.timeouts.provider_secs = 5;
    config.timeouts.request_secs = 20;

    config.app.store_path = Some(store_dir.join("transcripts.json"));
    config.app.max_media_bytes = 1024 * 1024;

    config
}
