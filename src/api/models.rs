use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::capture::{CaptureRequest, CaptureResult};
use crate::compare::{ComparisonOutcome, ComparisonResult};

/// Request to compare two pages
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    /// URL captured as the "before" side
    pub before_url: String,

    /// URL captured as the "after" side
    pub after_url: String,

    /// Emulated viewport width; the page's own width when absent
    #[serde(default)]
    pub viewport_width: Option<u32>,

    /// Capture the whole page rather than the visible viewport
    #[serde(default = "default_full_page")]
    pub full_page: bool,
}

fn default_full_page() -> bool {
    true
}

impl CompareRequest {
    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            full_page: self.full_page,
            viewport_width: self.viewport_width.filter(|w| *w > 0),
        }
    }
}

/// Internal job structure for comparison tasks
#[derive(Debug)]
pub struct CompareJob {
    /// The comparison request
    pub request: CompareRequest,

    /// Sender for the response channel
    pub response_tx: oneshot::Sender<Result<CompareResponse, String>>,
}

/// Response for a comparison request
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    /// Overall request status
    pub status: String,

    /// Statistics of the comparison
    pub result: ComparisonResult,

    /// Metadata of the "before" capture
    pub before: CaptureResult,

    /// Metadata of the "after" capture
    pub after: CaptureResult,

    /// Diff image as a data URL
    pub diff_image: String,

    /// Source captures as data URLs
    pub before_image: String,
    pub after_image: String,

    /// History entry recorded for this comparison
    pub history_id: Uuid,

    /// Path of the diff image written to disk, if saving succeeded
    pub saved_diff: Option<String>,
}

impl CompareResponse {
    pub fn new(outcome: ComparisonOutcome, history_id: Uuid, saved_diff: Option<String>) -> Self {
        Self {
            status: "success".to_string(),
            diff_image: outcome.result.diff_image_data_url(),
            before_image: outcome.before.data_url(),
            after_image: outcome.after.data_url(),
            result: outcome.result,
            before: outcome.before,
            after: outcome.after,
            history_id,
            saved_diff,
        }
    }
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Status indicator: healthy, degraded, or unhealthy
    pub status: String,

    /// Free slots in the job queue
    pub queue_capacity: usize,

    /// Comparisons currently held in history
    pub history_entries: usize,

    /// Server uptime in seconds
    pub uptime: u64,
}

/// Error response for API endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Status indicator: error
    pub status: String,

    /// Error message details
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
