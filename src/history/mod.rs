use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compare::ComparisonOutcome;

/// Number of comparisons kept; older entries are evicted first
pub const HISTORY_LIMIT: usize = 20;

/// One completed comparison as remembered by the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub before_url: String,
    pub after_url: String,
    pub diff_percentage: String,
    pub diff_pixels: u64,
    /// Images as `data:` URLs
    pub before_image: String,
    pub after_image: String,
    pub diff_image: String,
}

impl From<&ComparisonOutcome> for HistoryItem {
    fn from(outcome: &ComparisonOutcome) -> Self {
        let result = &outcome.result;
        Self {
            id: Uuid::new_v4(),
            timestamp: DateTime::from_timestamp_millis(result.produced_at_millis).unwrap_or_else(Utc::now),
            before_url: result.before_url.clone(),
            after_url: result.after_url.clone(),
            diff_percentage: result.diff_percentage.clone(),
            diff_pixels: result.diff_pixel_count,
            before_image: outcome.before.data_url(),
            after_image: outcome.after.data_url(),
            diff_image: result.diff_image_data_url(),
        }
    }
}

/// Newest-first list of recent comparisons, optionally mirrored to a JSON file
#[derive(Debug)]
pub struct HistoryStore {
    items: VecDeque<HistoryItem>,
    limit: usize,
    path: Option<PathBuf>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl HistoryStore {
    pub fn in_memory() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(limit),
            limit,
            path: None,
        }
    }

    /// Opens a store backed by `path`, loading its entries if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self::in_memory();

        if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read history file {}", path.display()))?;
            let items: Vec<HistoryItem> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse history file {}", path.display()))?;
            debug!("Loaded {} history entries from {}", items.len(), path.display());
            store.items = items.into_iter().take(store.limit).collect();
        }

        store.path = Some(path);
        Ok(store)
    }

    /// Adds a comparison at the front, evicting the oldest beyond the limit
    pub fn record(&mut self, item: HistoryItem) {
        info!("Recording comparison {} in history", item.id);
        self.items.push_front(item);
        while self.items.len() > self.limit {
            if let Some(evicted) = self.items.pop_back() {
                debug!("Evicted history entry {}", evicted.id);
            }
        }
        if let Err(e) = self.persist() {
            warn!("Failed to persist history: {:#}", e);
        }
    }

    pub fn record_outcome(&mut self, outcome: &ComparisonOutcome) -> Uuid {
        let item = HistoryItem::from(outcome);
        let id = item.id;
        self.record(item);
        id
    }

    pub fn items(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        if let Err(e) = self.persist() {
            warn!("Failed to persist history: {:#}", e);
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        write_json(path, &self.items)
    }
}

fn write_json(path: &Path, items: &VecDeque<HistoryItem>) -> Result<()> {
    let json = serde_json::to_string(items)?;
    fs::write(path, json).with_context(|| format!("Failed to write history file {}", path.display()))?;
    Ok(())
}
