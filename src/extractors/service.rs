use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{ResolutionStrategy, ResolvedMedia};

/// Response of `GET {service}/extract?url=...`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResponse {
    direct_url: Option<String>,
    content_type: Option<String>,
}

/// Delegates resolution to a separately deployed extraction service
pub struct ExternalResolverFallback {
    client: Client,
    service_url: String,
}

impl ExternalResolverFallback {
    pub fn new(client: Client, service_url: String) -> Self {
        Self {
            client,
            service_url: service_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, url: &Url) -> String {
        format!(
            "{}/extract?url={}",
            self.service_url,
            urlencoding::encode(url.as_str())
        )
    }

    async fn call(&self, url: &Url) -> Result<Option<ResolvedMedia>, reqwest::Error> {
        let response = self.client.get(self.endpoint(url)).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Extractor service returned HTTP {}", response.status());
            return Ok(None);
        }

        let body: ExtractResponse = response.json().await?;
        Ok(body
            .direct_url
            .filter(|direct| !direct.is_empty())
            .map(|direct| {
                ResolvedMedia::new(direct)
                    .with_content_type(body.content_type.filter(|ct| !ct.is_empty()))
            }))
    }
}

#[async_trait]
impl ResolutionStrategy for ExternalResolverFallback {
    async fn attempt(&self, url: &Url) -> Option<ResolvedMedia> {
        match self.call(url).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!("Extractor service error: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "Extractor service"
    }
}
