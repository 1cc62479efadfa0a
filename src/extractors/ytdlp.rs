use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use url::Url;

use super::{ResolutionStrategy, ResolvedMedia};
use crate::utils;

/// Captured result of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Host command execution, split into an availability probe and the invocation itself
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Check if the program exists on this host
    async fn is_available(&self, program: &str) -> bool;

    /// Run the program to completion
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs commands with `tokio::process`, killing them after a deadline
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn is_available(&self, program: &str) -> bool {
        tokio::time::timeout(self.timeout, utils::check_command_available(program))
            .await
            .unwrap_or(false)
    }

    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{} did not finish within {:?}", program, self.timeout),
                )
            })??;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Asks a host-installed media resolver (yt-dlp or youtube-dl) for a streaming URL
pub struct SubprocessResolverFallback {
    runner: Arc<dyn CommandRunner>,
    binaries: Vec<String>,

    /// Installed binary, probed once per process
    installed: OnceCell<Option<String>>,
}

impl SubprocessResolverFallback {
    pub fn new(runner: Arc<dyn CommandRunner>, binaries: Vec<String>) -> Self {
        Self {
            runner,
            binaries,
            installed: OnceCell::new(),
        }
    }

    /// Arguments asking for the best combined audio+video stream's direct URL
    fn args(url: &Url) -> Vec<String> {
        vec![
            "-g".to_string(),
            "-f".to_string(),
            "bestaudio*+bestvideo*/best".to_string(),
            "--no-playlist".to_string(),
            url.to_string(),
        ]
    }

    /// Find the first installed resolver binary
    async fn find_binary(&self) -> Option<&str> {
        self.installed
            .get_or_init(|| async {
                for binary in &self.binaries {
                    if self.runner.is_available(binary).await {
                        return Some(binary.clone());
                    }
                }
                None
            })
            .await
            .as_deref()
    }
}

#[async_trait]
impl ResolutionStrategy for SubprocessResolverFallback {
    async fn attempt(&self, url: &Url) -> Option<ResolvedMedia> {
        let Some(binary) = self.find_binary().await else {
            tracing::debug!("No media resolver binary installed, skipping");
            return None;
        };

        let output = match self.runner.run(binary, &Self::args(url)).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("{} could not be run: {}", binary, e);
                return None;
            }
        };

        if !output.success {
            tracing::warn!("{} failed to resolve {}: {}", binary, url, output.stderr.trim());
            return None;
        }

        parse_first_url(&output.stdout).map(ResolvedMedia::new)
    }

    fn name(&self) -> &'static str {
        "Subprocess resolver"
    }
}

/// First non-empty stdout line, if it is an http(s) URL
pub fn parse_first_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| line.starts_with("http"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn page() -> Url {
        Url::parse("https://www.tiktok.com/@user/video/1").unwrap()
    }

    fn binaries() -> Vec<String> {
        vec!["yt-dlp".to_string(), "youtube-dl".to_string()]
    }

    #[tokio::test]
    async fn test_missing_binary_skips_strategy() {
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().returning(|_| false);
        runner.expect_run().never();

        let fallback = SubprocessResolverFallback::new(Arc::new(runner), binaries());
        assert_eq!(fallback.attempt(&page()).await, None);
    }

    #[tokio::test]
    async fn test_first_line_is_used() {
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().with(eq("yt-dlp")).returning(|_| false);
        runner.expect_is_available().with(eq("youtube-dl")).returning(|_| true);
        runner
            .expect_run()
            .withf(|program, args| {
                program == "youtube-dl"
                    && args.first().map(String::as_str) == Some("-g")
                    && args.last().map(String::as_str) == Some("https://www.tiktok.com/@user/video/1")
            })
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    success: true,
                    stdout: "\nhttps://v16.cdn.example.com/audio.m4a\nhttps://v16.cdn.example.com/video.mp4\n".to_string(),
                    stderr: String::new(),
                })
            });

        let fallback = SubprocessResolverFallback::new(Arc::new(runner), binaries());
        let resolved = fallback.attempt(&page()).await.unwrap();
        assert_eq!(resolved.direct_url, "https://v16.cdn.example.com/audio.m4a");
        assert_eq!(resolved.content_type, None);
    }

    #[tokio::test]
    async fn test_binary_probe_runs_once() {
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().with(eq("yt-dlp")).times(1).returning(|_| true);
        runner.expect_run().times(2).returning(|_, _| {
            Ok(CommandOutput {
                success: true,
                stdout: "https://cdn.example.com/a.m4a\n".to_string(),
                stderr: String::new(),
            })
        });

        let fallback = SubprocessResolverFallback::new(Arc::new(runner), binaries());
        assert!(fallback.attempt(&page()).await.is_some());
        assert!(fallback.attempt(&page()).await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_binary_is_unavailable() {
        let runner = SystemCommandRunner::new(Duration::from_millis(200));
        assert!(!runner.is_available("definitely-not-a-real-binary-xyz").await);
    }

    #[tokio::test]
    async fn test_failed_run_is_swallowed() {
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().returning(|_| true);
        runner.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: "ERROR: Unsupported URL".to_string(),
            })
        });

        let fallback = SubprocessResolverFallback::new(Arc::new(runner), binaries());
        assert_eq!(fallback.attempt(&page()).await, None);
    }

    #[tokio::test]
    async fn test_spawn_error_is_swallowed() {
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().returning(|_| true);
        runner
            .expect_run()
            .returning(|_, _| Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "hung")));

        let fallback = SubprocessResolverFallback::new(Arc::new(runner), binaries());
        assert_eq!(fallback.attempt(&page()).await, None);
    }

    #[test]
    fn test_parse_first_url() {
        assert_eq!(parse_first_url("https://a/b.mp4\n"), Some("https://a/b.mp4".to_string()));
        assert_eq!(parse_first_url("WARNING: something\nhttps://a/b.mp4"), None);
        assert_eq!(parse_first_url(""), None);
    }
}
