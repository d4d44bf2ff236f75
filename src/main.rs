use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sanitize_filename::sanitize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use quick_vrt::api::config::{ApiConfig, QUEUE_SIZE, WORKER_COUNT};
use quick_vrt::api::processor::{run_comparison, save_diff};
use quick_vrt::api::start_server;
use quick_vrt::capture::config::{HEIGHT_CAP, SOURCE_DIMENSION_CAP, WIDTH_CAP};
use quick_vrt::capture::{BrowserHandle, CaptureLimits, CaptureRequest, CaptureResult};
use quick_vrt::compare::ComparisonResult;
use quick_vrt::settings::VrtSettings;
use quick_vrt::utils::logger::init_logger;
use quick_vrt::utils::url_to_snake_case;

#[derive(Debug, Parser)]
#[command(name = "quick_vrt", version, about = "Capture two pages and diff them pixel by pixel")]
struct Cli {
    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Settings file (TOML/JSON); QUICK_VRT_* variables override it
    #[arg(long)]
    settings: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// DevTools websocket URL of a running browser to use instead of launching one
    #[arg(long)]
    debugger_url: Option<String>,

    /// Widest emulated viewport and comparison canvas, in pixels
    #[arg(long, default_value_t = WIDTH_CAP)]
    max_width: u32,

    /// Tallest emulated viewport and comparison canvas, in pixels
    #[arg(long, default_value_t = HEIGHT_CAP)]
    max_height: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP comparison service
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "comparisons")]
        output_dir: String,
        /// Seconds a single comparison request may take
        #[arg(long, default_value_t = 120)]
        timeout: u64,
        #[arg(long, default_value_t = WORKER_COUNT)]
        workers: usize,
        #[arg(long, default_value_t = QUEUE_SIZE)]
        queue_size: usize,
        /// Persist comparison history to this JSON file
        #[arg(long)]
        history_file: Option<String>,
    },
    /// Compare two pages once and write the results to disk
    Compare {
        before: String,
        after: String,
        /// Emulated viewport width; the page's own width when omitted
        #[arg(long)]
        width: Option<u32>,
        /// Capture only the visible viewport
        #[arg(long)]
        viewport_only: bool,
        #[arg(long, default_value = "comparisons")]
        output_dir: String,
    },
}

/// Summary written next to the diff image by `compare`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareSummary<'a> {
    result: &'a ComparisonResult,
    before: &'a CaptureResult,
    after: &'a CaptureResult,
    diff_image: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logger(&cli.log_dir) {
        eprintln!("Failed to initialize logger: {:#}", e);
    }

    let settings = VrtSettings::load(cli.settings.as_deref())?;
    info!("Loaded settings: {:?}", settings);

    let limits = CaptureLimits {
        max_width: cli.max_width.max(1),
        max_height: cli.max_height.max(1),
        max_source_dimension: SOURCE_DIMENSION_CAP,
    };

    match cli.command {
        Command::Serve {
            host,
            port,
            output_dir,
            timeout,
            workers,
            queue_size,
            history_file,
        } => {
            let config = ApiConfig {
                output_dir,
                headless: !cli.headed,
                debugger_url: cli.debugger_url,
                request_timeout: Duration::from_secs(timeout),
                workers,
                queue_size,
                history_file,
                settings,
                limits,
                ..ApiConfig::default()
            };
            start_server(&host, port, Some(config)).await
        }
        Command::Compare {
            before,
            after,
            width,
            viewport_only,
            output_dir,
        } => {
            let defaults = ApiConfig::default();
            let browser = match &cli.debugger_url {
                Some(url) => BrowserHandle::connect(url).await?,
                None => {
                    BrowserHandle::launch(!cli.headed, (defaults.viewport_width, defaults.viewport_height)).await?
                }
            };

            let request = CaptureRequest {
                full_page: !viewport_only,
                viewport_width: width,
            };
            let outcome = run_comparison(&browser, &settings, &request, &limits, &before, &after).await;

            if let Err(e) = browser.close().await {
                warn!("Error closing browser: {:#}", e);
            }
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Comparison failed: {:#}", e);
                    return Err(e);
                }
            };

            let diff_path = save_diff(&outcome, &output_dir)?;
            let summary = CompareSummary {
                result: &outcome.result,
                before: &outcome.before,
                after: &outcome.after,
                diff_image: diff_path.to_string_lossy().into_owned(),
            };
            let summary_name = sanitize(format!(
                "{}_vs_{}.json",
                url_to_snake_case(&before),
                url_to_snake_case(&after)
            ));
            let summary_path = Path::new(&output_dir).join(summary_name);
            fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
                .with_context(|| format!("Failed to write summary to {}", summary_path.display()))?;

            info!("Summary written to {}", summary_path.display());
            println!(
                "{} of {} pixels differ ({}%)\ndiff: {}\nsummary: {}",
                outcome.result.diff_pixel_count,
                outcome.result.total_pixels,
                outcome.result.diff_percentage,
                diff_path.display(),
                summary_path.display()
            );
            Ok(())
        }
    }
}
