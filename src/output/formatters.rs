use anyhow::Result;

use crate::transcribe::{Paragraph, TranscriptionResult};

/// Format seconds as `HH:MM:SS,mmm`, truncating to the millisecond
pub fn format_srt_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };

    let whole = seconds.floor();
    let total = whole as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    let millis = (((seconds - whole) * 1000.0).floor() as u64).min(999);

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Render paragraphs as an SRT document
///
/// Each block is `index`, `start --> end`, the text and a newline; blocks are
/// separated by a blank line. No paragraphs render as an empty string.
pub fn to_srt(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                format_srt_time(p.start),
                format_srt_time(p.end),
                p.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain text, optionally prefixed with each paragraph's start time
pub fn format_as_text(result: &TranscriptionResult, include_timestamps: bool) -> String {
    let body = result
        .paragraphs
        .iter()
        .map(|p| {
            if include_timestamps {
                format!("[{}] {}", format_srt_time(p.start), p.text)
            } else {
                p.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    if result.mock {
        format!("[mock transcript]\n\n{}", body)
    } else {
        body
    }
}

pub fn format_as_json(result: &TranscriptionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Summary followed by one timed bullet per paragraph
pub fn format_as_markdown(result: &TranscriptionResult) -> String {
    let bullets = result
        .paragraphs
        .iter()
        .map(|p| format!("- [{} → {}] {}", format_srt_time(p.start), format_srt_time(p.end), p.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!("# Summary\n\n{}\n\n## Transcript\n\n{}", result.summary, bullets)
}
