//! Tunable thresholds for tracking, structuring and detection
//!
//! Every constant the engine relies on lives here so hosts can adjust them
//! without touching behavior. Missing fields fall back to the defaults below.

use crate::error::AnalyticsError;
use serde::{Deserialize, Serialize};

/// Inactivity window before the tracker goes idle (30 seconds)
pub const DEFAULT_INACTIVITY_WINDOW_MS: i64 = 30_000;

/// Period of the "was there recent activity" check (5 seconds)
pub const DEFAULT_ACTIVITY_CHECK_INTERVAL_MS: i64 = 5_000;

/// Maximum time attributed by a single accrual step (5 minutes)
pub const DEFAULT_ACCRUAL_CAP_MS: i64 = 300_000;

/// Dwell time after which a page counts as read (3 seconds)
pub const DEFAULT_PAGE_COMPLETION_MS: i64 = 3_000;

/// Fraction of pages that must be read for a section to count as read
pub const DEFAULT_SECTION_COMPLETION_RATIO: f64 = 0.8;

/// Words per page assumed when no page text has been extracted
pub const DEFAULT_WORDS_PER_PAGE: u32 = 275;

/// Reading-time accounting for [`crate::tracker::ReadingTracker`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub inactivity_window_ms: i64,
    pub activity_check_interval_ms: i64,
    pub accrual_cap_ms: i64,
    pub page_completion_ms: i64,
    pub section_completion_ratio: f64,
    /// Section changes closer together than this are ignored
    pub section_debounce_ms: i64,
    pub selection_capacity: usize,
    /// Selections shorter than this (in characters) are rejected
    pub min_selection_chars: usize,
    pub default_words_per_page: u32,
    pub max_reading_speed_wpm: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            inactivity_window_ms: DEFAULT_INACTIVITY_WINDOW_MS,
            activity_check_interval_ms: DEFAULT_ACTIVITY_CHECK_INTERVAL_MS,
            accrual_cap_ms: DEFAULT_ACCRUAL_CAP_MS,
            page_completion_ms: DEFAULT_PAGE_COMPLETION_MS,
            section_completion_ratio: DEFAULT_SECTION_COMPLETION_RATIO,
            section_debounce_ms: 1_000,
            selection_capacity: 100,
            min_selection_chars: 3,
            default_words_per_page: DEFAULT_WORDS_PER_PAGE,
            max_reading_speed_wpm: 1_000.0,
        }
    }
}

/// Line grouping and heading heuristics for [`crate::text::structure_page`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Tokens whose Y positions differ by less than this share a line
    pub line_tolerance: f64,
    /// A line is a heading candidate when its tallest token exceeds this
    pub heading_min_height: f64,
    /// ...and its text is shorter than this many characters
    pub heading_max_chars: usize,
    /// Pages extracted eagerly when a session opens
    pub prefetch_pages: u32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 2.0,
            heading_min_height: 12.0,
            heading_max_chars: 100,
            prefetch_pages: 10,
        }
    }
}

/// Scorer confidences and acceptance thresholds for [`crate::detection::SectionDetector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Shared arbitration threshold; below it the fallback scorers run
    pub min_confidence: f64,
    pub page_mapping_confidence: f64,
    pub pattern_match_confidence: f64,
    pub keyword_weight: f64,
    /// Multiplier when a text match agrees with the page's primary section
    pub agreement_boost: f64,
    pub heading_similarity_threshold: f64,
    pub heading_similarity_weight: f64,
    pub dynamic_confidence: f64,
    /// Minimum confidence a caller needs before applying a selection-driven change
    pub selection_accept: f64,
    pub viewport_accept: f64,
    pub hover_accept: f64,
    /// Font size above which a visible element counts as a large heading
    pub large_font: f64,
    /// Element text shorter than this counts towards heading-likeness
    pub short_heading_chars: usize,
    /// Dynamic synthesis requires either a tall heading or one shorter than this
    pub dynamic_max_chars: usize,
    /// How far below the hover position a heading may sit and still apply
    pub hover_slack: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            page_mapping_confidence: 0.85,
            pattern_match_confidence: 0.9,
            keyword_weight: 0.7,
            agreement_boost: 1.2,
            heading_similarity_threshold: 0.6,
            heading_similarity_weight: 0.8,
            dynamic_confidence: 0.6,
            selection_accept: 0.5,
            viewport_accept: 0.5,
            hover_accept: 0.4,
            large_font: 14.0,
            short_heading_chars: 80,
            dynamic_max_chars: 60,
            hover_slack: 30.0,
        }
    }
}

/// Session-level timers, throttles and feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_save: bool,
    pub auto_save_interval_ms: i64,
    pub activity_feed_capacity: usize,
    pub hover_throttle_ms: i64,
    pub viewport_throttle_ms: i64,
    pub activity_throttle_ms: i64,
    pub enable_text_extraction: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_save_interval_ms: 30_000,
            activity_feed_capacity: 20,
            hover_throttle_ms: 300,
            viewport_throttle_ms: 500,
            activity_throttle_ms: 100,
            enable_text_extraction: true,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub tracker: TrackerConfig,
    pub text: TextConfig,
    pub detector: DetectorConfig,
    pub session: SessionConfig,
}

impl AnalyticsConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self, AnalyticsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall timers or break the [0, 1] confidence scale
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let t = &self.tracker;
        if t.inactivity_window_ms <= 0
            || t.activity_check_interval_ms <= 0
            || t.accrual_cap_ms <= 0
            || self.session.auto_save_interval_ms <= 0
        {
            return Err(AnalyticsError::InvalidConfig(
                "intervals and caps must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&t.section_completion_ratio) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "section_completion_ratio {} outside [0, 1]",
                t.section_completion_ratio
            )));
        }
        if t.selection_capacity == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "selection_capacity must be at least 1".to_string(),
            ));
        }

        let d = &self.detector;
        let unit = [
            ("min_confidence", d.min_confidence),
            ("page_mapping_confidence", d.page_mapping_confidence),
            ("pattern_match_confidence", d.pattern_match_confidence),
            ("keyword_weight", d.keyword_weight),
            ("heading_similarity_threshold", d.heading_similarity_threshold),
            ("heading_similarity_weight", d.heading_similarity_weight),
            ("dynamic_confidence", d.dynamic_confidence),
            ("selection_accept", d.selection_accept),
            ("viewport_accept", d.viewport_accept),
            ("hover_accept", d.hover_accept),
        ];
        if let Some((name, value)) = unit.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "{} {} outside [0, 1]",
                name, value
            )));
        }
        Ok(())
    }
}
