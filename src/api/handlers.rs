use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::api::config::ApiConfig;
use crate::api::models::{CompareJob, CompareRequest, ErrorResponse, HealthStatus};
use crate::history::HistoryStore;

/// Time the server started, for uptime reporting
#[derive(Debug, Clone, Copy)]
pub struct StartedAt(pub Instant);

fn validate_url(label: &str, url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("Invalid {} URL: must start with http:// or https://", label))
    }
}

/// HTTP handler for comparison requests
///
/// Validates the request, submits it to the worker queue, and awaits the result
/// with a timeout.
///
/// # Arguments
/// * `request` - JSON request with the before and after URLs
/// * `config` - API configuration
/// * `job_tx` - Job queue sender
///
/// # Returns
/// * HTTP response with the comparison or error information
#[instrument(skip(config, job_tx))]
pub async fn compare_handler(
    request: web::Json<CompareRequest>,
    config: web::Data<ApiConfig>,
    job_tx: web::Data<mpsc::Sender<CompareJob>>,
) -> impl Responder {
    info!("Received comparison request: {} vs {}", request.before_url, request.after_url);

    if let Err(message) = validate_url("before", &request.before_url)
        .and_then(|_| validate_url("after", &request.after_url))
    {
        warn!("Rejected request: {}", message);
        return HttpResponse::BadRequest().json(ErrorResponse::new(message));
    }

    let max_attempts = 3;
    let retry_delay = Duration::from_millis(100);
    let mut attempts = 0;
    let request = request.into_inner();

    loop {
        let (response_tx, response_rx) = oneshot::channel();
        let job = CompareJob {
            request: request.clone(),
            response_tx,
        };

        match job_tx.try_send(job) {
            Ok(_) => {
                debug!("Job enqueued after {} attempt(s)", attempts + 1);
                debug!("Waiting for result with timeout: {:?}", config.request_timeout);
                return match timeout(config.request_timeout, response_rx).await {
                    Ok(Ok(Ok(response))) => {
                        info!("Comparison request completed successfully");
                        HttpResponse::Ok().json(response)
                    }
                    Ok(Ok(Err(e))) => {
                        error!("Comparison request failed: {}", e);
                        HttpResponse::InternalServerError().json(ErrorResponse::new(e))
                    }
                    Ok(Err(_)) => {
                        error!("Worker channel closed unexpectedly");
                        HttpResponse::InternalServerError().json(ErrorResponse::new("Worker dropped."))
                    }
                    Err(_) => {
                        error!("Request timed out after {:?}", config.request_timeout);
                        HttpResponse::RequestTimeout().json(ErrorResponse::new("Request timed out."))
                    }
                };
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                attempts += 1;
                if attempts >= max_attempts {
                    warn!("Queue full after {} attempts, rejecting request", max_attempts);
                    return HttpResponse::TooManyRequests().json(ErrorResponse::new(format!(
                        "Server is busy, try again later. Queue has been full for {:?}",
                        retry_delay * attempts
                    )));
                }
                warn!("Queue full, retrying (attempt {}/{})", attempts, max_attempts);
                sleep(retry_delay).await;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Worker queue has been closed!");
                return HttpResponse::ServiceUnavailable()
                    .json(ErrorResponse::new("Service is shutting down or unavailable."));
            }
        }
    }
}

/// Lists recent comparisons, newest first
#[instrument(skip(history))]
pub async fn history_handler(history: web::Data<Arc<Mutex<HistoryStore>>>) -> impl Responder {
    let history = history.lock().await;
    let items: Vec<_> = history.items().cloned().collect();
    debug!("Returning {} history entries", items.len());
    HttpResponse::Ok().json(items)
}

/// Health check endpoint for monitoring service status
///
/// Degraded while the job queue is full; unhealthy once it has closed.
#[instrument(skip_all)]
pub async fn health_check(
    job_tx: web::Data<mpsc::Sender<CompareJob>>,
    history: web::Data<Arc<Mutex<HistoryStore>>>,
    started: web::Data<StartedAt>,
) -> impl Responder {
    debug!("Processing health check request");

    let capacity = job_tx.capacity();
    let status = if job_tx.is_closed() {
        warn!("Health check: job queue closed");
        "unhealthy"
    } else if capacity == 0 {
        "degraded"
    } else {
        "healthy"
    };
    let history_entries = history.lock().await.len();

    info!("Health check: status={}, queue capacity={}", status, capacity);
    HttpResponse::Ok().json(HealthStatus {
        status: status.to_string(),
        queue_capacity: capacity,
        history_entries,
        uptime: started.0.elapsed().as_secs(),
    })
}
