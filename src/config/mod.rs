use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the provider credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the external extractor service base URL
pub const EXTRACTOR_URL_ENV: &str = "EXTRACTOR_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcription and completion providers
    pub providers: ProvidersConfig,

    /// Media resolution strategies
    pub resolver: ResolverConfig,

    /// Per-call and per-request deadlines
    pub timeouts: TimeoutConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Base URL of the OpenAI-compatible transcription API
    pub transcription_base_url: String,

    /// Transcription model name
    pub transcription_model: String,

    /// Base URL of the OpenAI-compatible chat completion API
    pub completion_base_url: String,

    /// Model used for paragraph translation
    pub completion_model: String,

    /// Provider credential; `OPENAI_API_KEY` takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// External extractor service (`GET {url}/extract?url=...`); `EXTRACTOR_URL` takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor_url: Option<String>,

    /// Reader mirror used when a platform page is blocked
    pub reader_mirror_base: String,

    /// Hosts handled by the platform page scraper
    pub platform_hosts: Vec<String>,

    /// Allow shelling out to a media resolver binary
    pub subprocess_enabled: bool,

    /// Resolver binaries tried in order
    pub subprocess_binaries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub connect_secs: u64,
    pub fetch_secs: u64,
    pub provider_secs: u64,
    pub subprocess_secs: u64,
    pub request_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind: String,

    /// Largest upload or remote media accepted, in bytes
    pub max_media_bytes: u64,

    /// Paragraph accumulation threshold in seconds
    pub paragraph_seconds: f64,

    /// Location of the anonymous transcript store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Number of transcripts the anonymous store keeps
    pub store_capacity: usize,

    /// Persist every successful transcription
    pub save_transcripts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig {
                transcription_base_url: "https://api.openai.com/v1".to_string(),
                transcription_model: "whisper-1".to_string(),
                completion_base_url: "https://api.openai.com/v1".to_string(),
                completion_model: "gpt-4o-mini".to_string(),
                api_key: None,
            },
            resolver: ResolverConfig {
                extractor_url: None,
                reader_mirror_base: "https://r.jina.ai".to_string(),
                platform_hosts: vec!["instagram.com".to_string()],
                subprocess_enabled: true,
                subprocess_binaries: vec!["yt-dlp".to_string(), "youtube-dl".to_string()],
            },
            timeouts: TimeoutConfig {
                connect_secs: 10,
                fetch_secs: 60,
                provider_secs: 300,
                subprocess_secs: 120,
                request_secs: 900,
            },
            app: AppConfig {
                bind: "127.0.0.1:8787".to_string(),
                max_media_bytes: 25 * 1024 * 1024,
                paragraph_seconds: 10.0,
                store_path: None,
                store_capacity: 50,
                save_transcripts: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let config = Self::load_file().await?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Configuration as stored on disk, without environment overrides
    pub async fn load_file() -> Result<Self> {
        let config_path = Self::config_path()?;

        let config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("sayso-transcriber").join("config.yaml"))
    }

    /// Overlay credentials and service URLs from the process environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.providers.api_key = Some(key);
        }
        if let Ok(url) = std::env::var(EXTRACTOR_URL_ENV) {
            self.resolver.extractor_url = Some(url);
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for base in [
            &self.providers.transcription_base_url,
            &self.providers.completion_base_url,
        ] {
            crate::utils::validate_and_normalize_url(base)
                .with_context(|| format!("Invalid provider base URL: {}", base))?;
        }

        if !(self.app.paragraph_seconds > 0.0) {
            anyhow::bail!("app.paragraph_seconds must be positive");
        }

        if self.app.store_capacity == 0 {
            anyhow::bail!("app.store_capacity must be at least 1");
        }

        Ok(())
    }

    /// Provider credential, if one is set and non-empty
    pub fn api_key(&self) -> Option<&str> {
        self.providers
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// External extractor service, if configured
    pub fn extractor_url(&self) -> Option<&str> {
        self.resolver
            .extractor_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Path of the anonymous transcript store
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.app.store_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .context("Could not determine data directory")?;

        Ok(data_dir.join("sayso-transcriber").join("transcripts.json"))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.connect_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.fetch_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.provider_secs)
    }

    pub fn subprocess_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.subprocess_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Transcription API: {} ({})", self.providers.transcription_base_url, self.providers.transcription_model);
        println!("  Completion API: {} ({})", self.providers.completion_base_url, self.providers.completion_model);
        println!(
            "  API Key: {}",
            if self.api_key().is_some() { "configured" } else { "not set (mock transcripts)" }
        );
        println!("  Extractor Service: {}", self.extractor_url().unwrap_or("not configured"));
        println!("  Reader Mirror: {}", self.resolver.reader_mirror_base);
        println!("  Platform Hosts: {}", self.resolver.platform_hosts.join(", "));
        println!("  Subprocess Resolver: {}", if self.resolver.subprocess_enabled { "enabled" } else { "disabled" });
        println!("  Bind Address: {}", self.app.bind);
        println!("  Paragraph Length: {}s", self.app.paragraph_seconds);
        println!("  Save Transcripts: {}", self.app.save_transcripts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_counts_as_absent() {
        let mut config = Config::default();
        config.providers.api_key = Some("   ".to_string());
        assert_eq!(config.api_key(), None);

        config.providers.api_key = Some("sk-test".to_string());
        assert_eq!(config.api_key(), Some("sk-test"));
    }

    #[test]
    fn test_rejects_bad_paragraph_threshold() {
        let mut config = Config::default();
        config.app.paragraph_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_provider() {
        let mut config = Config::default();
        config.providers.transcription_base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip_keeps_optional_fields_out() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(!yaml.contains("api_key"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.app.store_capacity, 50);
    }
}
