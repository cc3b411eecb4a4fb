//! CLI entry point for mediagrab.

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use mediagrab_core::{Event, Grabber, GrabberConfig, QueryOptions};
use tracing::{debug, info, warn};

mod cli;
mod output;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = GrabberConfig {
        max_retries: u32::from(args.max_retries),
        ..GrabberConfig::default()
    };
    let grabber = Grabber::new(config)
        .context("Failed to initialize")?
        .with_event_handler(log_event);

    let mut options = QueryOptions::new()
        .with_extensions(&args.extensions)
        .with_deep(args.deep);
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }

    let (response, handle) = grabber.query(&args.url, options)?;

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            interrupt.cancel();
        }
    });

    let spinner = progress::query_spinner(!args.quiet && !args.list);
    let query_result = response
        .track(|_, total| spinner.set_message(format!("Found {total} media...")))
        .await;
    spinner.finish_and_clear();

    let media = response.media();
    if let Err(error) = &query_result {
        warn!(%error, found = media.len(), "Query did not finish");
    }
    info!(found = media.len(), "Query finished");

    if args.list {
        let mut stdout = io::stdout().lock();
        for item in &media {
            serde_json::to_writer(&mut stdout, item)?;
            writeln!(stdout)?;
        }
        query_result?;
        return Ok(());
    }

    if media.is_empty() {
        query_result?;
        if !args.quiet {
            eprintln!("No media found");
        }
        return Ok(());
    }

    let requests = output::plan_downloads(&media, &args.output_dir);
    let (mut outcomes, batch) = grabber.download_batch(requests, usize::from(args.parallel))?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            batch.cancel_all();
        }
    });

    let bars = progress::download_bars(!args.quiet);
    let mut followers = Vec::new();
    while let Some(outcome) = outcomes.recv().await {
        let bars = bars.clone();
        followers.push(tokio::spawn(async move { progress::follow(&bars, &outcome).await }));
    }

    let mut failed = 0_usize;
    for follower in followers {
        if !follower.await.unwrap_or(false) {
            failed += 1;
        }
    }
    let completed = media.len() - failed;
    info!(completed, failed, "Download complete");
    if !args.quiet {
        eprintln!("Downloaded {completed} of {} files", media.len());
    }

    query_result?;
    if failed > 0 {
        bail!("{failed} download(s) failed");
    }
    Ok(())
}

fn log_event(event: &Event) {
    match event {
        Event::ExtractorFound { name } => info!(extractor = %name, "Extractor found"),
        Event::SourceFound { kind, name } => info!(kind = %kind, name = %name, "Source found"),
        Event::MediaQueried { amount } => debug!(amount, "Media queried"),
        Event::QueryCompleted { total } => info!(total, "Query completed"),
    }
}
