pub mod config;
pub mod handlers;
pub mod models;
pub mod processor;
pub mod workers;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::api::config::ApiConfig;
use crate::api::handlers::{compare_handler, health_check, history_handler, StartedAt};
use crate::api::models::CompareJob;
use crate::api::workers::start_workers;
use crate::capture::BrowserHandle;
use crate::history::HistoryStore;

/// Starts the API server with the specified configuration
///
/// Launches (or connects to) the browser, loads history, sets up the worker
/// pool and serves until the server stops.
///
/// # Arguments
/// * `host` - Host address to bind to (e.g., "127.0.0.1")
/// * `port` - Port to listen on
/// * `config` - Optional API configuration (uses defaults if None)
#[instrument(skip(config))]
pub async fn start_server(host: &str, port: u16, config: Option<ApiConfig>) -> Result<()> {
    info!("Starting comparison API server on {}:{}", host, port);

    let config = config.unwrap_or_else(|| {
        debug!("Using default API configuration");
        ApiConfig::default()
    });

    debug!(
        "Initializing browser with window {}x{}, headless: {}",
        config.viewport_width, config.viewport_height, config.headless
    );
    let browser = match &config.debugger_url {
        Some(url) => BrowserHandle::connect(url).await,
        None => BrowserHandle::launch(config.headless, (config.viewport_width, config.viewport_height)).await,
    };
    let browser = match browser {
        Ok(browser) => Arc::new(browser),
        Err(e) => {
            error!("Failed to initialize browser: {:#}", e);
            return Err(e);
        }
    };

    let history = match &config.history_file {
        Some(path) => HistoryStore::open(path).context("Failed to open history")?,
        None => HistoryStore::in_memory(),
    };
    let history = Arc::new(Mutex::new(history));

    debug!("Creating job queue with capacity: {}", config.queue_size);
    let (job_tx, job_rx) = mpsc::channel::<CompareJob>(config.queue_size.max(1));
    let workers = start_workers(job_rx, browser.clone(), history.clone(), config.clone());

    let shutdown_grace = config.request_timeout;
    let job_tx_data = web::Data::new(job_tx);
    let config_data = web::Data::new(config);
    let history_data = web::Data::new(history);
    let started_data = web::Data::new(StartedAt(Instant::now()));

    info!("Starting HTTP server at {}:{}", host, port);
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(job_tx_data.clone())
            .app_data(history_data.clone())
            .app_data(started_data.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .service(web::resource("/compare").route(web::post().to(compare_handler)))
            .service(web::resource("/history").route(web::get().to(history_handler)))
            .service(web::resource("/health").route(web::get().to(health_check)))
    })
    .bind((host, port))
    .map_err(|e| {
        error!("Failed to bind to {}:{}: {}", host, port, e);
        e
    })?
    .run()
    .await;

    // The server owned the last queue sender, so workers drain and exit
    info!("Server shutting down, cleaning up resources");
    for worker in workers {
        let abort = worker.abort_handle();
        match timeout(shutdown_grace, worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Worker ended abnormally: {}", e),
            Err(_) => {
                warn!("Worker still busy after {:?}, aborting", shutdown_grace);
                abort.abort();
            }
        }
    }
    match Arc::try_unwrap(browser) {
        Ok(browser) => match browser.close().await {
            Ok(_) => debug!("Successfully closed browser"),
            Err(e) => warn!("Error closing browser: {}", e),
        },
        Err(_) => warn!("Browser still in use at shutdown"),
    }

    if let Err(e) = server_result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
