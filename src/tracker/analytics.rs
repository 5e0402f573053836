//! Aggregate metric computations
//!
//! Pure functions over tracker tables, kept apart from the state machine so
//! each formula can be tested in isolation.

use crate::detection::similarity::word_count;
use crate::types::TextSelectionEvent;
use chrono::{DateTime, Utc};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Milliseconds between `anchor` and `now`, never negative, at most `cap_ms`
pub fn accrue(anchor: DateTime<Utc>, now: DateTime<Utc>, cap_ms: i64) -> i64 {
    (now - anchor).num_milliseconds().clamp(0, cap_ms.max(0))
}

/// forward / (forward + backward + jump); 0 when nothing moved
pub fn linear_reading_ratio(forward: u32, backward: u32, jump: u32) -> f64 {
    let moves = forward + backward + jump;
    if moves == 0 {
        return 0.0;
    }
    f64::from(forward) / f64::from(moves)
}

/// Words per active minute, rounded and clamped to `[0, ceiling]`
pub fn reading_speed(words: u64, active_ms: i64, ceiling: f64) -> f64 {
    if active_ms <= 0 {
        return 0.0;
    }
    let minutes = active_ms as f64 / MS_PER_MINUTE;
    (words as f64 / minutes).round().clamp(0.0, ceiling)
}

pub fn words_from_selections<'a>(
    selections: impl IntoIterator<Item = &'a TextSelectionEvent>,
) -> u64 {
    selections
        .into_iter()
        .map(|s| word_count(&s.text) as u64)
        .sum()
}

/// Words read: the larger of captured selection words and the completed-page estimate
pub fn words_read(selection_words: u64, completed_pages: u32, words_per_page: u32) -> u64 {
    selection_words.max(u64::from(completed_pages) * u64::from(words_per_page))
}

/// Completed pages as a percentage of the document
pub fn progress_percentage(completed_pages: u32, total_pages: u32) -> f64 {
    if total_pages == 0 {
        return 0.0;
    }
    f64::from(completed_pages) * 100.0 / f64::from(total_pages)
}

/// A section is complete once `ratio` of its pages are
pub fn section_completed(completed_pages: usize, section_pages: usize, ratio: f64) -> bool {
    if section_pages == 0 {
        return false;
    }
    completed_pages as f64 / section_pages as f64 >= ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_accrual_is_capped() {
        let anchor = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(accrue(anchor, anchor + Duration::seconds(10), 300_000), 10_000);
        assert_eq!(accrue(anchor, anchor + Duration::minutes(10), 300_000), 300_000);
        assert_eq!(accrue(anchor, anchor - Duration::seconds(5), 300_000), 0);
    }

    #[test]
    fn test_linear_ratio() {
        assert_eq!(linear_reading_ratio(0, 0, 0), 0.0);
        assert_eq!(linear_reading_ratio(3, 1, 0), 0.75);
        assert_eq!(linear_reading_ratio(1, 0, 1), 0.5);
    }

    #[test]
    fn test_reading_speed_is_clamped() {
        assert_eq!(reading_speed(100_000, 60_000, 1_000.0), 1_000.0);
        assert_eq!(reading_speed(550, 120_000, 1_000.0), 275.0);
        assert_eq!(reading_speed(500, 0, 1_000.0), 0.0);
    }

    #[test]
    fn test_words_read_takes_larger_estimate() {
        assert_eq!(words_read(40, 2, 275), 550);
        assert_eq!(words_read(900, 2, 275), 900);
        assert_eq!(words_read(0, 0, 275), 0);
    }

    #[test]
    fn test_progress() {
        assert_eq!(progress_percentage(5, 20), 25.0);
        assert_eq!(progress_percentage(0, 0), 0.0);
    }

    #[test]
    fn test_section_completion_boundary() {
        // exactly 80%
        assert!(section_completed(4, 5, 0.8));
        assert!(section_completed(6, 7, 0.8));
        assert!(!section_completed(5, 7, 0.8));
        assert!(!section_completed(0, 0, 0.8));
    }
}
