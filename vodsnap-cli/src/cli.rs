use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "vodsnap",
    about = "Probe and download HLS streams into a single file",
    version
)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch a manifest and print what it contains without downloading
    Probe {
        /// Manifest URL (.m3u8)
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Download every segment of a stream and assemble one output file
    Download {
        /// Manifest URL (.m3u8)
        url: String,

        /// Output path; derived from the manifest URL when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent segment downloads
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}
