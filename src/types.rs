//! Core data types
//!
//! Sections, per-page and per-section statistics, navigation and selection logs,
//! detection candidates and the serializable tracker snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Stable, document-unique section identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a section came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// From the document outline, or synthesized when there is none
    Configured,
    /// Created at runtime from a detected heading
    Dynamic,
}

/// A logical, page-bounded region of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
    pub level: u32,
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Section>,
}

impl Section {
    /// Create a configured leaf section
    pub fn configured(
        id: impl Into<String>,
        title: impl Into<String>,
        start_page: u32,
        end_page: u32,
        level: u32,
    ) -> Self {
        Self {
            id: SectionId::new(id),
            title: title.into(),
            start_page,
            end_page,
            level,
            kind: SectionKind::Configured,
            children: Vec::new(),
        }
    }

    /// Create a single-page dynamic section anchored at `page`
    pub fn dynamic(id: impl Into<String>, title: impl Into<String>, page: u32) -> Self {
        Self {
            id: SectionId::new(id),
            title: title.into(),
            start_page: page,
            end_page: page,
            level: 2,
            kind: SectionKind::Dynamic,
            children: Vec::new(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == SectionKind::Dynamic
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start_page..=self.end_page.max(self.start_page)
    }

    pub fn contains_page(&self, page: u32) -> bool {
        self.pages().contains(&page)
    }

    /// Copy without children, as stored in the flat index
    pub fn without_children(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// Reading statistics for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStat {
    pub page_number: u32,
    pub time_spent_ms: i64,
    pub visit_count: u32,
    pub completed: bool,
    pub last_visited_at: Option<DateTime<Utc>>,
}

impl PageStat {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            time_spent_ms: 0,
            visit_count: 0,
            completed: false,
            last_visited_at: None,
        }
    }
}

/// Reading statistics for one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionStat {
    pub section_id: SectionId,
    pub time_spent_ms: i64,
    pub visit_count: u32,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Pages covered by the section
    pub page_ids: Vec<u32>,
}

impl SectionStat {
    pub fn for_section(section: &Section) -> Self {
        Self {
            section_id: section.id.clone(),
            time_spent_ms: 0,
            visit_count: 0,
            completed: false,
            started_at: None,
            ended_at: None,
            page_ids: section.pages().collect(),
        }
    }
}

/// How the viewer moved between two pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    Initial,
    Forward,
    Backward,
    Jump,
    Same,
}

/// One entry in the append-only navigation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub from_page: Option<u32>,
    pub to_page: u32,
    pub timestamp: DateTime<Utc>,
    pub kind: NavigationKind,
}

/// A captured user text selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSelectionEvent {
    pub id: String,
    pub text: String,
    pub page: u32,
    pub section_title: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Length of `text` in characters
    pub length: usize,
}

/// Which signal produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    PageMapping,
    TitlePattern,
    KeywordOverlap,
    HeadingSimilarity,
    DynamicSynthesis,
}

/// A ranked proposal for the section the viewer is in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionCandidate {
    pub section: Section,
    /// Always within [0, 1]
    pub confidence: f64,
    pub method: DetectionMethod,
}

/// Aggregate metrics computed by [`crate::tracker::ReadingTracker::analytics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub session_time_ms: i64,
    pub active_time_ms: i64,
    pub pages_completed: u32,
    pub sections_completed: u32,
    pub text_selections: u32,
    pub page_changes: u32,
    pub forward_moves: u32,
    pub backward_moves: u32,
    pub jump_moves: u32,
    /// forward / (forward + backward + jump), 0 when nothing moved
    pub linear_reading_ratio: f64,
    /// Completed pages as a percentage of the document
    pub progress_percentage: f64,
    pub words_read: u64,
    /// Words per active minute, clamped to the configured ceiling
    pub reading_speed_wpm: f64,
    /// Active time accrued in the current section visit
    pub current_section_time_ms: i64,
    pub is_active: bool,
    pub total_pages: u32,
    pub current_page: Option<u32>,
    pub current_section: Option<SectionId>,
}

/// Serializable projection of the tracker state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub session_started_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
    pub summary: AnalyticsSummary,
    pub pages: Vec<PageStat>,
    pub sections: Vec<SectionStat>,
    pub navigation: Vec<NavigationEvent>,
    pub selections: Vec<TextSelectionEvent>,
    /// Sections synthesized at runtime, so a resumed session can re-register them
    #[serde(default)]
    pub dynamic_sections: Vec<Section>,
}

impl TrackerSnapshot {
    pub fn page(&self, page: u32) -> Option<&PageStat> {
        self.pages.iter().find(|p| p.page_number == page)
    }

    pub fn section(&self, id: &SectionId) -> Option<&SectionStat> {
        self.sections.iter().find(|s| &s.section_id == id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_kind_serialization() {
        let json = serde_json::to_string(&NavigationKind::Backward).unwrap();
        assert_eq!(json, "\"backward\"");

        let parsed: NavigationKind = serde_json::from_str("\"jump\"").unwrap();
        assert_eq!(parsed, NavigationKind::Jump);
    }

    #[test]
    fn test_section_id_is_transparent() {
        let section = Section::configured("section_1_0", "Intro", 1, 5, 1);
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["id"], "section_1_0");
        assert_eq!(json["kind"], "configured");
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_dynamic_section_shape() {
        let section = Section::dynamic("dynamic_section_4_results", "Results", 4);
        assert!(section.is_dynamic());
        assert_eq!(section.level, 2);
        assert_eq!(section.pages(), 4..=4);
        assert_eq!(SectionStat::for_section(&section).page_ids, vec![4]);
    }

    #[test]
    fn test_contains_page() {
        let section = Section::configured("s", "Methods", 6, 12, 1);
        assert!(section.contains_page(6));
        assert!(section.contains_page(12));
        assert!(!section.contains_page(13));
        assert!(!section.contains_page(5));
    }
}
