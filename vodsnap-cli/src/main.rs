mod cli;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use url::Url;
use vodsnap_engine::{DownloadOptions, Downloader, EngineConfig, ParsedManifest};

use crate::cli::{Args, Commands, OutputFormat};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("application error: {e}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let downloader = Downloader::new(EngineConfig::default())?;

    match args.command {
        Commands::Probe { url, output } => {
            let manifest = downloader.parse_manifest(&url).await?;
            print_manifest(&url, &manifest, output)?;
        }

        Commands::Download {
            url,
            output,
            concurrency,
        } => {
            let path = match output {
                Some(path) => path,
                None => default_output_path(&url)?,
            };

            let bar = ProgressBar::new(100);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.yellow} [{bar:30.yellow/white}] {percent}% {msg}")
                .unwrap()
                .progress_chars("=> ");
            bar.set_style(style);

            let progress_bar = bar.clone();
            let mut options = DownloadOptions::new(&path).with_progress(Box::new(
                move |phase, percent, detail| {
                    progress_bar.set_position(percent.round() as u64);
                    progress_bar.set_message(format!("{phase}: {detail}"));
                },
            ));
            options.concurrency = concurrency;

            let summary = downloader.download(&url, options).await?;
            bar.finish_with_message("done");
            println!(
                "Saved {} segments ({} bytes) to {}",
                summary.segment_count,
                summary.byte_len,
                summary.path.display()
            );
        }
    }

    Ok(())
}

fn print_manifest(url: &str, manifest: &ParsedManifest, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(manifest)?);
        }
        OutputFormat::Pretty => {
            println!("Manifest: {url}");
            println!("  segments:  {}", manifest.segments.len());
            if manifest.total_duration > 0.0 {
                println!("  duration:  {:.1}s", manifest.total_duration);
            }
            match &manifest.audio_playlist_url {
                Some(audio) => println!("  audio:     separate rendition at {audio}"),
                None if manifest.has_audio_track => println!("  audio:     inline"),
                None => {}
            }
            match &manifest.video_playlist_url {
                Some(video) => println!("  video:     separate rendition at {video}"),
                None if manifest.has_video_track => println!("  video:     inline"),
                None => {}
            }
            if manifest.segments.is_empty() && manifest.has_separated_renditions() {
                println!("  note:      master playlist; download resolves renditions first");
            }
        }
    }
    Ok(())
}

/// Derives an output filename from the manifest URL's last path segment,
/// e.g. `https://cdn.example/live/index.m3u8` -> `index.ts`.
fn default_output_path(manifest_url: &str) -> Result<PathBuf> {
    let url = Url::parse(manifest_url).context("invalid manifest URL")?;
    let stem = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|name| name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name))
        .filter(|stem| !stem.is_empty())
        .unwrap_or("stream");
    Ok(PathBuf::from(format!("{stem}.ts")))
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
    Ok(())
}
