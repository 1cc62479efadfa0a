use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::sync::OnceLock;
use url::Url;

use super::{ResolutionStrategy, ResolvedMedia};
use crate::utils;

/// Scrapes a social platform page for its embedded video URL
///
/// The page is fetched with browser headers and searched for `og:video`,
/// then `og:video:secure_url`, then a raw `"video_url"` JSON field. When the
/// origin blocks us (or renders client-side) the same path is retried through
/// a reader mirror.
pub struct PlatformExtractor {
    client: Client,
    hosts: Vec<String>,
    mirror_base: String,
}

impl PlatformExtractor {
    pub fn new(client: Client, hosts: Vec<String>, mirror_base: String) -> Self {
        Self {
            client,
            hosts,
            mirror_base: mirror_base.trim_end_matches('/').to_string(),
        }
    }

    /// Check if the URL's host belongs to a supported platform
    pub fn supports_url(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| {
                let host = host.to_ascii_lowercase();
                self.hosts.iter().any(|platform| host.contains(platform.as_str()))
            })
            .unwrap_or(false)
    }

    /// Extract a direct video URL from the page, falling back to reader mirrors
    pub async fn extract(&self, page_url: &Url) -> Option<String> {
        let html = self.fetch_html(page_url.as_str()).await;
        if let Some(direct) = extract_video_url(&html) {
            return Some(direct);
        }

        for mirror in self.mirror_urls(page_url) {
            tracing::debug!("Retrying through reader mirror: {}", mirror);
            let html = self.fetch_html(&mirror).await;
            if let Some(direct) = extract_video_url(&html) {
                return Some(direct);
            }
        }

        None
    }

    /// Alternate routes to the same page through the reader mirror
    pub fn mirror_urls(&self, page_url: &Url) -> Vec<String> {
        let host = page_url.host_str().unwrap_or_default();
        let host = match page_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path = page_url.path();

        vec![
            format!("{}/http://{}{}", self.mirror_base, host, path),
            format!("{}/https://{}{}", self.mirror_base, host, path),
            format!("{}/{}", self.mirror_base, page_url),
        ]
    }

    /// Fetch a page body; any failure yields an empty string
    async fn fetch_html(&self, url: &str) -> String {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, utils::BROWSER_USER_AGENT)
            .header(ACCEPT_LANGUAGE, utils::ACCEPT_LANGUAGE)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_default()
            }
            Ok(response) => {
                tracing::debug!("Page fetch for {} returned HTTP {}", url, response.status());
                String::new()
            }
            Err(e) => {
                tracing::debug!("Page fetch for {} failed: {}", url, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl ResolutionStrategy for PlatformExtractor {
    async fn attempt(&self, url: &Url) -> Option<ResolvedMedia> {
        if !self.supports_url(url) {
            return None;
        }

        self.extract(url).await.map(ResolvedMedia::new)
    }

    fn name(&self) -> &'static str {
        "Platform page"
    }
}

fn meta_regex(property: &str) -> Regex {
    let pattern = format!(
        r#"<meta[^>]+property=["']{}["'][^>]+content=["']([^"']+)["']"#,
        regex::escape(property)
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .expect("meta pattern is valid")
}

fn og_video() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| meta_regex("og:video"))
}

fn og_video_secure() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| meta_regex("og:video:secure_url"))
}

fn json_video_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r#""video_url"\s*:\s*"(https:[^"]+\.mp4)""#)
            .case_insensitive(true)
            .build()
            .expect("video_url pattern is valid")
    })
}

fn capture<'a>(re: &Regex, html: &'a str) -> Option<&'a str> {
    re.captures(html).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

/// Find the embedded video URL in page HTML; first match in priority order wins
pub fn extract_video_url(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }

    let og = capture(og_video(), html).or_else(|| capture(og_video_secure(), html));
    if let Some(og) = og.filter(|value| value.starts_with("http")) {
        return Some(sanitize_url(og));
    }

    capture(json_video_url(), html).map(sanitize_url)
}

/// Undo the escaping pages apply to URLs embedded in markup and script blobs
pub fn sanitize_url(url: &str) -> String {
    url.replace("\\u0026", "&")
        .replace("\\u0025", "%")
        .replace("\\/", "/")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PlatformExtractor {
        PlatformExtractor::new(
            Client::new(),
            vec!["instagram.com".to_string()],
            "https://r.jina.ai/".to_string(),
        )
    }

    #[test]
    fn test_og_video_meta() {
        let html = r#"<head><meta property="og:video" content="https://cdn.example.com/v.mp4?a=1&amp;b=2" /></head>"#;
        assert_eq!(extract_video_url(html).as_deref(), Some("https://cdn.example.com/v.mp4?a=1&b=2"));
    }

    #[test]
    fn test_plain_tag_wins_over_secure_url() {
        let html = r#"
            <meta property="og:video:secure_url" content="https://secure.example.com/s.mp4">
            <meta property="og:video" content="https://plain.example.com/p.mp4">
        "#;
        assert_eq!(extract_video_url(html).as_deref(), Some("https://plain.example.com/p.mp4"));
    }

    #[test]
    fn test_secure_url_used_when_plain_missing() {
        let html = r#"<meta property='og:video:secure_url' content='https://secure.example.com/s.mp4'>"#;
        assert_eq!(extract_video_url(html).as_deref(), Some("https://secure.example.com/s.mp4"));
    }

    #[test]
    fn test_json_blob_with_escaped_ampersands() {
        let html = r#"<script>{"shortcode":"x","video_url":"https:\/\/scontent.example.com\/v\/t50.mp4?efg=abc\u0026oh=123\u0026oe=456.mp4"}</script>"#;
        assert_eq!(
            extract_video_url(html).as_deref(),
            Some("https://scontent.example.com/v/t50.mp4?efg=abc&oh=123&oe=456.mp4")
        );
    }

    #[test]
    fn test_non_http_og_value_falls_through() {
        let html = r#"<meta property="og:video" content="/relative/path.mp4"><script>"video_url": "https://cdn.example.com/x.mp4"</script>"#;
        assert_eq!(extract_video_url(html).as_deref(), Some("https://cdn.example.com/x.mp4"));
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(extract_video_url(""), None);
        assert_eq!(extract_video_url("<html><body>Log in to continue</body></html>"), None);
    }

    #[test]
    fn test_host_matching() {
        let extractor = extractor();
        assert!(extractor.supports_url(&Url::parse("https://www.instagram.com/reel/abc/").unwrap()));
        assert!(extractor.supports_url(&Url::parse("https://INSTAGRAM.com/p/abc").unwrap()));
        assert!(!extractor.supports_url(&Url::parse("https://example.com/reel/abc/").unwrap()));
    }

    #[test]
    fn test_mirror_urls() {
        let extractor = extractor();
        let page = Url::parse("https://www.instagram.com/reel/abc/?igsh=1").unwrap();
        assert_eq!(
            extractor.mirror_urls(&page),
            vec![
                "https://r.jina.ai/http://www.instagram.com/reel/abc/".to_string(),
                "https://r.jina.ai/https://www.instagram.com/reel/abc/".to_string(),
                "https://r.jina.ai/https://www.instagram.com/reel/abc/?igsh=1".to_string(),
            ]
        );
    }
}
