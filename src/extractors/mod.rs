use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

pub mod direct;
pub mod instagram;
pub mod local;
pub mod service;
pub mod ytdlp;

use crate::config::Config;
use crate::{CoreResult, TranscriptorError};

/// A URL pointing straight at playable media, produced by one resolution strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMedia {
    /// Direct download URL for the media
    pub direct_url: String,

    /// Content type reported by the resolver, if it knows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ResolvedMedia {
    pub fn new(direct_url: impl Into<String>) -> Self {
        Self {
            direct_url: direct_url.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

/// One way of turning a user-supplied URL into a direct media URL
///
/// Strategies swallow their own network and parsing failures and return `None`,
/// so the pipeline can always move on to the next one.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Try to resolve the URL
    async fn attempt(&self, url: &Url) -> Option<ResolvedMedia>;

    /// Get the name of this strategy
    fn name(&self) -> &'static str;
}

/// Runs resolution strategies in priority order; the first success wins
pub struct MediaResolutionPipeline {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl MediaResolutionPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Create the default strategy chain from configuration
    pub fn from_config(config: &Config, client: Client) -> Self {
        let mut pipeline = Self::new();

        pipeline.register(Box::new(direct::DirectMediaDetector::new()));
        pipeline.register(Box::new(instagram::PlatformExtractor::new(
            client.clone(),
            config.resolver.platform_hosts.clone(),
            config.resolver.reader_mirror_base.clone(),
        )));

        if let Some(service_url) = config.extractor_url() {
            pipeline.register(Box::new(service::ExternalResolverFallback::new(
                client,
                service_url.to_string(),
            )));
        }

        if config.resolver.subprocess_enabled {
            let runner = Arc::new(ytdlp::SystemCommandRunner::new(config.subprocess_timeout()));
            pipeline.register(Box::new(ytdlp::SubprocessResolverFallback::new(
                runner,
                config.resolver.subprocess_binaries.clone(),
            )));
        }

        pipeline
    }

    /// Register a new strategy at the lowest priority
    pub fn register(&mut self, strategy: Box<dyn ResolutionStrategy>) {
        self.strategies.push(strategy);
    }

    /// List registered strategies in priority order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .map(|strategy| strategy.name())
            .collect()
    }

    /// Resolve a user-supplied URL, or `None` when every strategy fails
    pub async fn resolve(&self, input_url: &str) -> Option<ResolvedMedia> {
        let url = match Url::parse(input_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot resolve unparseable URL {}: {}", input_url, e);
                return None;
            }
        };

        for strategy in &self.strategies {
            tracing::debug!("Trying {} for {}", strategy.name(), input_url);

            if let Some(resolved) = strategy.attempt(&url).await {
                tracing::info!("Resolved {} via {}: {}", input_url, strategy.name(), resolved.direct_url);
                return Some(resolved);
            }
        }

        tracing::warn!("All resolution strategies failed for {}", input_url);
        None
    }

    /// Resolve or fail with `ResolutionExhausted`
    pub async fn resolve_or_err(&self, input_url: &str) -> CoreResult<ResolvedMedia> {
        self.resolve(input_url)
            .await
            .ok_or_else(|| TranscriptorError::ResolutionExhausted {
                url: input_url.to_string(),
            })
    }
}

impl Default for MediaResolutionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate and normalize URLs
pub fn validate_url(url: &str) -> CoreResult<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| TranscriptorError::InvalidUrl(url.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TranscriptorError::InvalidUrl(format!(
            "{} (URL must use HTTP or HTTPS protocol)",
            url
        )));
    }

    Ok(parsed)
}
