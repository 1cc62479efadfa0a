use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sayso_transcriber::cli::{Cli, Commands};
use sayso_transcriber::config::Config;
use sayso_transcriber::extractors::local::LocalFileExtractor;
use sayso_transcriber::storage::{LocalTranscriptStore, NewTranscript, TranscriptStore};
use sayso_transcriber::transcribe::{MediaInput, TranscriptionPipeline, TranscriptionRequest};
use sayso_transcriber::{output, server, utils};

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose { "sayso=debug" } else { "sayso=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn spinner(quiet: bool, message: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    Some(progress)
}

fn media_input(input: &str) -> Option<MediaInput> {
    let input = input.trim();
    if input.is_empty() {
        None
    } else if LocalFileExtractor::is_local_file(input) {
        Some(MediaInput::File(PathBuf::from(input)))
    } else {
        Some(MediaInput::Url(input.to_string()))
    }
}

async fn warn_missing_dependencies(config: &Config) {
    if !config.resolver.subprocess_enabled {
        return;
    }

    let missing = utils::check_dependencies(&config.resolver.subprocess_binaries).await;
    if !missing.is_empty() {
        eprintln!("{}", style("⚠️  Dependency check warnings:").yellow());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - the other resolution strategies still work)");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = Config::load().await?;

    match cli.command {
        Commands::Serve { bind } => {
            warn_missing_dependencies(&config).await;
            let bind = bind.unwrap_or_else(|| config.app.bind.clone());
            server::serve(&config, &bind).await?;
        }
        Commands::Transcribe {
            input,
            source_language,
            target_language,
            format,
            output: output_path,
            timestamps,
            save,
        } => {
            let pipeline = TranscriptionPipeline::new(&config)?;

            tracing::info!("Starting transcription for: {}", input);
            let request = TranscriptionRequest::new(media_input(&input))
                .source_language(Some(source_language))
                .target_language(Some(target_language));

            let progress = spinner(cli.quiet, "Resolving and transcribing...");
            let outcome = pipeline.run(request).await;
            if let Some(progress) = progress {
                progress.finish_and_clear();
            }
            let result = outcome?;

            if result.mock {
                eprintln!(
                    "{}",
                    style("No API key configured: this is a mock transcript, not your audio.").yellow()
                );
            }

            match output_path {
                Some(path) => {
                    output::save_to_file(&result, &path, &format, timestamps).await?;
                    println!("Transcription saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format, timestamps)?;
                }
            }

            if save {
                let store = LocalTranscriptStore::new(config.store_path()?, config.app.store_capacity);
                let saved = store.save(NewTranscript::from_result(&result)).await?;
                eprintln!("Saved transcript {}", style(&saved.id).cyan());
            }
        }
        Commands::Resolve { url } => {
            let pipeline = TranscriptionPipeline::new(&config)?;
            let parsed = sayso_transcriber::extractors::validate_url(&url)?;

            let resolved = pipeline.resolver().resolve_or_err(parsed.as_str()).await?;
            println!("{}", resolved.direct_url);
            if let Some(content_type) = resolved.content_type {
                println!("Content-Type: {}", content_type);
            }
        }
        Commands::History { delete } => {
            let store = LocalTranscriptStore::new(config.store_path()?, config.app.store_capacity);

            match delete {
                Some(id) => {
                    if store.delete(&id).await? {
                        println!("Deleted transcript {}", id);
                    } else {
                        anyhow::bail!("No transcript with id {}", id);
                    }
                }
                None => {
                    let transcripts = store.list().await?;
                    if transcripts.is_empty() {
                        println!("No saved transcripts.");
                    }
                    for transcript in &transcripts {
                        println!(
                            "{}  {}  {}  {}{}",
                            style(&transcript.id).dim(),
                            transcript.created_at.format("%Y-%m-%d %H:%M"),
                            style(utils::format_duration(transcript.duration)).cyan(),
                            style(&transcript.title).bold(),
                            if transcript.mock { style("  [mock]").yellow().to_string() } else { String::new() }
                        );
                    }
                    println!("Total: {:.1} minutes transcribed", store.total_minutes().await?);
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                // Environment credentials stay out of the written file
                Config::load_file().await?.save().await?;
                println!("Configuration written. Run `sayso config --show` to review it.");
            }
        }
        Commands::Platforms => {
            let pipeline = TranscriptionPipeline::new(&config)?;

            println!("Resolution strategies (tried in order):");
            for name in pipeline.resolver().strategy_names() {
                println!("  • {}", name);
            }
            println!();
            println!("Supported platforms:");
            for host in &config.resolver.platform_hosts {
                println!("  • {} (page scraping with reader mirror fallback)", host);
            }
            println!("  • Direct media URLs (.mp4, .mp3, .wav, .m4a)");
            println!("  • Local audio/video files (mp3, mp4, m4a, wav, webm, ogg, flac, mpeg)");
            println!("  • Anything else the external extractor or yt-dlp can resolve");
            println!();
            println!("Transcriber: {}", pipeline.transcriber_name());

            warn_missing_dependencies(&config).await;
        }
    }

    Ok(())
}
