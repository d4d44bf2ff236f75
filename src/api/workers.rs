use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::api::config::ApiConfig;
use crate::api::models::CompareJob;
use crate::api::processor::process_request;
use crate::capture::BrowserHandle;
use crate::history::HistoryStore;

/// Starts worker tasks to process jobs from the queue
///
/// Each worker pulls jobs from the shared queue and runs them to completion
/// before taking the next one. Workers exit once every sender is dropped.
///
/// # Arguments
/// * `job_rx` - Job receiver channel
/// * `browser` - Shared browser the captures run in
/// * `history` - Shared comparison history
/// * `config` - API configuration
pub fn start_workers(
    job_rx: mpsc::Receiver<CompareJob>,
    browser: Arc<BrowserHandle>,
    history: Arc<Mutex<HistoryStore>>,
    config: ApiConfig,
) -> Vec<JoinHandle<()>> {
    let job_rx = Arc::new(Mutex::new(job_rx));
    let count = config.workers.max(1);

    info!("Spawning {} workers", count);
    (0..count)
        .map(|worker_id| {
            let browser = browser.clone();
            let history = history.clone();
            let job_rx = job_rx.clone();
            let config = config.clone();

            tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                loop {
                    trace!("Worker {} waiting for job", worker_id);
                    let job_opt = { job_rx.lock().await.recv().await };

                    match job_opt {
                        Some(job) => {
                            debug!(
                                "Worker {} processing {} vs {}",
                                worker_id, job.request.before_url, job.request.after_url
                            );
                            let result =
                                process_request(job.request, &config, browser.clone(), history.clone()).await;

                            match &result {
                                Ok(_) => debug!("Worker {} completed job successfully", worker_id),
                                Err(e) => warn!("Worker {} job failed: {:#}", worker_id, e),
                            }

                            if job.response_tx.send(result.map_err(|e| format!("{:#}", e))).is_err() {
                                warn!("Worker {} failed to send response - receiver dropped", worker_id);
                            }
                        }
                        None => {
                            info!("Worker {} shutting down - channel closed", worker_id);
                            break;
                        }
                    }
                }
            })
        })
        .collect()
}
