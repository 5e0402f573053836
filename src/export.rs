//! One-shot analytics report
//!
//! The tracker snapshot enriched with static document metadata and an export
//! timestamp.

use crate::index::SectionIndex;
use crate::store::SNAPSHOT_KEY_PREFIX;
use crate::types::{SectionId, TrackerSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A section as listed in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub id: SectionId,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
    pub level: u32,
    pub dynamic: bool,
    pub completed: bool,
}

/// Static document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub total_pages: u32,
    pub sections: Vec<SectionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    #[serde(flatten)]
    pub snapshot: TrackerSnapshot,
    pub document: DocumentInfo,
    pub exported_at: DateTime<Utc>,
}

impl ExportReport {
    pub fn new(
        snapshot: TrackerSnapshot,
        index: &SectionIndex,
        document_id: &str,
        exported_at: DateTime<Utc>,
    ) -> Self {
        let sections = index
            .iter()
            .map(|s| SectionInfo {
                id: s.id.clone(),
                title: s.title.clone(),
                start_page: s.start_page,
                end_page: s.end_page,
                level: s.level,
                dynamic: s.is_dynamic(),
                completed: snapshot.section(&s.id).is_some_and(|stat| stat.completed),
            })
            .collect();

        Self {
            document: DocumentInfo {
                id: document_id.to_string(),
                total_pages: index.total_pages(),
                sections,
            },
            snapshot,
            exported_at,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn filename(&self) -> String {
        export_filename(&self.document.id, self.exported_at)
    }
}

/// `reading_analytics_{fingerprint}_{YYYY-MM-DD}.json`
pub fn export_filename(fingerprint: &str, date: DateTime<Utc>) -> String {
    format!(
        "{}{}_{}.json",
        SNAPSHOT_KEY_PREFIX,
        fingerprint,
        date.format("%Y-%m-%d")
    )
}

/// Format a duration as `HH:MM:SS` / `MM:SS`, or compactly as `1h 5m` / `12m` / `40s`
pub fn format_duration(ms: i64, compact: bool) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if compact {
        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            format!("{}s", seconds)
        }
    } else if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
