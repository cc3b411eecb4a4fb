//! Progress UI for queries and downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use mediagrab_core::{DownloadOutcome, TransferSnapshot};

const BAR_TEMPLATE: &str = "{msg:30} [{bar:30}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg}";

/// Spinner shown while a query collects media.
pub(crate) fn query_spinner(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_message("Querying media...");
    spinner
}

/// Container for one bar per download.
pub(crate) fn download_bars(enabled: bool) -> MultiProgress {
    if enabled {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }
}

/// Follows `outcome` on a new bar until it finishes.
///
/// Returns true if the download succeeded.
pub(crate) async fn follow(bars: &MultiProgress, outcome: &DownloadOutcome) -> bool {
    let bar = bars.add(ProgressBar::new(0));
    bar.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE)
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(
        outcome
            .path()
            .file_name()
            .map_or_else(|| outcome.url().to_string(), |name| name.to_string_lossy().into_owned()),
    );

    let result = outcome.track(|snapshot| update(&bar, &snapshot)).await;
    match &result {
        Ok(()) => bar.finish(),
        Err(error) if error.is_canceled() => bar.abandon_with_message("canceled"),
        Err(error) => bar.abandon_with_message(format!("failed: {error}")),
    }
    result.is_ok()
}

fn update(bar: &ProgressBar, snapshot: &TransferSnapshot) {
    if let Ok(total) = u64::try_from(snapshot.total_size) {
        bar.set_length(total);
    }
    bar.set_position(snapshot.bytes_transferred);
}
