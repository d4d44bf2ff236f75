use anyhow::{Context, Result};
use sanitize_filename::sanitize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::api::config::ApiConfig;
use crate::api::models::{CompareRequest, CompareResponse};
use crate::capture::{BrowserHandle, CaptureLimits, CaptureRequest, PageCapturer};
use crate::compare::{ComparisonOutcome, ComparisonSession};
use crate::history::HistoryStore;
use crate::settings::VrtSettings;
use crate::utils::url_to_snake_case;

/// Captures both pages and compares them
///
/// Each side gets its own page in `browser`. A failed full-page capture falls
/// back to a viewport capture inside [`PageCapturer`], so only a failure of
/// both strategies aborts the comparison. `limits` caps both the captures and
/// the normalized comparison canvas.
#[instrument(skip(browser, settings, capture, limits))]
pub async fn run_comparison(
    browser: &BrowserHandle,
    settings: &VrtSettings,
    capture: &CaptureRequest,
    limits: &CaptureLimits,
    before_url: &str,
    after_url: &str,
) -> Result<ComparisonOutcome> {
    let capturer = PageCapturer::with_limits(settings, capture, *limits);
    let mut session = ComparisonSession::new(settings).with_limits(*limits);

    info!("Capturing before page: {}", before_url);
    let mut before = browser.target(before_url);
    match session.capture_before(&capturer, &mut before).await {
        Ok(capture) => debug!("Before capture taken, {} bytes", capture.image_bytes.len()),
        Err(e) => {
            error!("Failed to capture before page {}: {}", before_url, e);
            return Err(e).context(format!("Failed to capture {}", before_url));
        }
    }

    info!("Capturing after page: {}", after_url);
    let mut after = browser.target(after_url);
    match session.capture_after(&capturer, &mut after).await {
        Ok(capture) => debug!("After capture taken, {} bytes", capture.image_bytes.len()),
        Err(e) => {
            error!("Failed to capture after page {}: {}", after_url, e);
            return Err(e).context(format!("Failed to capture {}", after_url));
        }
    }

    debug!("Comparing captures on a blocking thread");
    let outcome = tokio::task::spawn_blocking(move || session.compare())
        .await
        .context("Comparison task failed")?
        .context("Failed to compare captures")?;
    Ok(outcome)
}

/// Writes the diff image of `outcome` into `output_dir`
pub fn save_diff(outcome: &ComparisonOutcome, output_dir: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).with_context(|| format!("Failed to create output directory {}", output_dir))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let base_name = format!(
        "{}_vs_{}",
        url_to_snake_case(&outcome.result.before_url),
        url_to_snake_case(&outcome.result.after_url)
    );
    let file_path = Path::new(output_dir).join(format!("{}_{}.png", sanitize(base_name), timestamp));

    debug!("Saving diff image to {}", file_path.display());
    match fs::write(&file_path, &outcome.result.diff_image_bytes) {
        Ok(_) => trace!("Diff image written successfully"),
        Err(e) => {
            error!("Failed to write diff image to {}: {}", file_path.display(), e);
            return Err(e).context(format!("Failed to write diff image to {}", file_path.display()));
        }
    }
    info!("Diff image saved to {}", file_path.display());
    Ok(file_path)
}

/// Processes a comparison request end to end
///
/// Captures both sides, compares them, records the outcome in history and
/// saves the diff image. Failing to save the image is logged but does not
/// fail the request.
#[instrument(skip(config, browser, history), fields(before = %request.before_url, after = %request.after_url))]
pub async fn process_request(
    request: CompareRequest,
    config: &ApiConfig,
    browser: Arc<BrowserHandle>,
    history: Arc<Mutex<HistoryStore>>,
) -> Result<CompareResponse> {
    info!("Processing comparison of {} and {}", request.before_url, request.after_url);

    let outcome = run_comparison(
        &browser,
        &config.settings,
        &request.capture_request(),
        &config.limits,
        &request.before_url,
        &request.after_url,
    )
    .await?;

    let saved_diff = match save_diff(&outcome, &config.output_dir) {
        Ok(path) => Some(path.to_string_lossy().into_owned()),
        Err(e) => {
            warn!("Continuing without saved diff image: {:#}", e);
            None
        }
    };

    let history_id = history.lock().await.record_outcome(&outcome);
    debug!("Recorded comparison as history entry {}", history_id);

    info!(
        "Comparison finished: {}% of pixels differ",
        outcome.result.diff_percentage
    );
    Ok(CompareResponse::new(outcome, history_id, saved_diff))
}
