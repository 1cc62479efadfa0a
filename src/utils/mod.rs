use anyhow::{Context, Result};
use url::Url;

/// Desktop browser User-Agent; platforms routinely block non-browser clients
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Check that a configured base URL is absolute http(s), returning it normalized
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim()).with_context(|| format!("Invalid URL format: {}", url))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => anyhow::bail!("URL must use HTTP or HTTPS protocol, got {}", other),
    }
}

/// Byte count with a binary unit, e.g. `1.5 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    match unit {
        0 => format!("{} B", bytes),
        _ => format!("{:.1} {}", size, UNITS[unit]),
    }
}

/// Clock-style media length: `M:SS`, or `H:MM:SS` past an hour
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Last path segment of a URL, used as the upload file name for the provider
pub fn file_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "remote".to_string())
}

/// Lower-cased extension of the URL's path, ignoring query and fragment
pub fn url_path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check if the current environment has the optional resolver tools
pub async fn check_dependencies(binaries: &[String]) -> Vec<String> {
    let mut found = false;
    for binary in binaries {
        if check_command_available(binary).await {
            found = true;
            break;
        }
    }

    if found {
        Vec::new()
    } else {
        vec![format!(
            "{} - optional, enables resolution of arbitrary platforms",
            binaries.join(" / ")
        )]
    }
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
