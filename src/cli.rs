//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mediagrab_core::{DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM};

/// Find and download media from supported hosts.
///
/// Queries a Reddit or RedGifs URL (a post, a user, a subreddit, ...) for
/// media and downloads everything found.
#[derive(Parser, Debug)]
#[command(name = "mediagrab")]
#[command(author, version, about)]
pub struct Args {
    /// URL to query
    pub url: String,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum number of media to find (0 finds nothing)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Only keep media with these extensions (comma-separated, e.g. jpg,mp4)
    #[arg(short = 'e', long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Resolve media of unknown type by querying the linked host
    #[arg(short = 'd', long)]
    pub deep: bool,

    /// Directory to download into
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'p', long, default_value_t = DEFAULT_PARALLELISM as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub parallel: u8,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Print found media as JSON lines instead of downloading
    #[arg(short = 'l', long)]
    pub list: bool,
}
