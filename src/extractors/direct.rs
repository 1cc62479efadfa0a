use async_trait::async_trait;
use url::Url;

use super::{ResolutionStrategy, ResolvedMedia};
use crate::utils;

/// Extensions that mark a URL as already pointing at media
const DIRECT_EXTENSIONS: [&str; 4] = ["mp4", "mp3", "wav", "m4a"];

/// Recognizes direct media links by path extension; never touches the network
pub struct DirectMediaDetector;

impl DirectMediaDetector {
    pub fn new() -> Self {
        Self
    }

    /// Check if the URL path ends in a known media extension
    pub fn is_direct_media(&self, url: &Url) -> bool {
        utils::url_path_extension(url)
            .map(|ext| DIRECT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ResolutionStrategy for DirectMediaDetector {
    async fn attempt(&self, url: &Url) -> Option<ResolvedMedia> {
        if self.is_direct_media(url) {
            Some(ResolvedMedia::new(url.as_str()))
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "Direct URL"
    }
}

impl Default for DirectMediaDetector {
    fn default() -> Self {
        Self::new()
    }
}
