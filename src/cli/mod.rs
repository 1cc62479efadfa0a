use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sayso",
    about = "Sayso Transcriber - turn video links and uploads into timed transcripts and subtitles",
    version,
    long_about = "Resolves social-media pages and direct media links into fetchable media, transcribes them with an OpenAI-compatible provider, merges segments into paragraphs, optionally translates them and exports SRT subtitles. Also serves the same pipeline over HTTP."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (defaults to the configured bind address)
        #[arg(short, long, value_name = "ADDR", env = "SAYSO_BIND")]
        bind: Option<String>,
    },

    /// Transcribe a URL or a local audio/video file
    Transcribe {
        /// Page URL, direct media URL or local file path
        #[arg(value_name = "URL_OR_FILE")]
        input: String,

        /// Spoken language hint ("auto" to detect)
        #[arg(short, long, value_name = "LANG", default_value = "auto")]
        source_language: String,

        /// Language to translate paragraphs into ("original" keeps the spoken language)
        #[arg(short, long, value_name = "LANG", default_value = "original")]
        target_language: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include paragraph start times in text output
        #[arg(long)]
        timestamps: bool,

        /// Keep the transcript in the local history
        #[arg(long)]
        save: bool,
    },

    /// Resolve a page URL to its direct media URL without transcribing
    Resolve {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// List or delete saved transcripts
    History {
        /// Delete the transcript with this id
        #[arg(short, long, value_name = "ID")]
        delete: Option<String>,
    },

    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List resolution strategies and supported platforms
    Platforms,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Plain text paragraphs
    Text,
    /// Full result as JSON
    Json,
    /// SRT subtitle format
    Srt,
    /// Summary and timed bullets
    Markdown,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}
