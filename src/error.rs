//! Error types for Readtrace

use thiserror::Error;

/// Errors that can occur while building, persisting or replaying reading analytics.
///
/// Most of these never reach the host: recording operations log and skip, and
/// persistence failures are swallowed by [`crate::store::SnapshotStore`].
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Outline destination could not be resolved: {0}")]
    DestinationUnresolved(String),

    #[error("Text extraction failed for page {page}: {reason}")]
    TextExtraction { page: u32, reason: String },

    #[error("Snapshot store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Snapshot store quota exceeded: needed {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("Invalid session event log: {0}")]
    InvalidEventLog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
