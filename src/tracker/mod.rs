//! Reading tracker
//!
//! The stateful core. An Active/Idle machine decides whether elapsed time
//! counts; while Active, time since the last accrual point is attributed to
//! the current page and section, capped per step. Every accrual moves the
//! anchor to `now`, so reading analytics twice never counts an interval twice.
//!
//! Recording operations never fail. Out-of-range pages and unknown section ids
//! are logged and skipped, and the operation reports `false`.

pub mod activity;
pub mod analytics;
pub mod navigation;

use crate::config::TrackerConfig;
use crate::index::SectionIndex;
use crate::types::{
    AnalyticsSummary, NavigationEvent, PageStat, Section, SectionId, SectionStat,
    TextSelectionEvent, TrackerSnapshot,
};
use activity::{ActivityMonitor, ActivityState};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};
use navigation::{classify, NavigationCounts};
use std::collections::VecDeque;
use uuid::Uuid;

/// Per-document reading state
#[derive(Debug, Clone)]
pub struct ReadingTracker {
    config: TrackerConfig,
    total_pages: u32,
    session_started_at: DateTime<Utc>,
    activity: ActivityMonitor,

    /// Indexed by page number - 1
    pages: Vec<PageStat>,
    sections: IndexMap<SectionId, SectionStat>,
    dynamic_sections: Vec<Section>,
    navigation: Vec<NavigationEvent>,
    selections: VecDeque<TextSelectionEvent>,

    current_page: Option<u32>,
    current_section: Option<SectionId>,
    page_anchor: Option<DateTime<Utc>>,
    section_anchor: Option<DateTime<Utc>>,
    current_section_time_ms: i64,
    last_section_change: Option<DateTime<Utc>>,
    words_per_page: u32,
}

impl ReadingTracker {
    /// Create a tracker covering every page and every section of `index`
    pub fn new(index: &SectionIndex, config: TrackerConfig, now: DateTime<Utc>) -> Self {
        let total_pages = index.total_pages();
        let words_per_page = config.default_words_per_page;
        let activity = ActivityMonitor::new(config.inactivity_window_ms, now);

        let mut tracker = Self {
            config,
            total_pages,
            session_started_at: now,
            activity,
            pages: Vec::new(),
            sections: IndexMap::new(),
            dynamic_sections: Vec::new(),
            navigation: Vec::new(),
            selections: VecDeque::new(),
            current_page: None,
            current_section: None,
            page_anchor: None,
            section_anchor: None,
            current_section_time_ms: 0,
            last_section_change: None,
            words_per_page,
        };
        tracker.reset_tables();
        for section in index.iter() {
            tracker.register_section(section);
        }

        debug!(
            "Tracker initialized: {} pages, {} sections",
            total_pages,
            tracker.sections.len()
        );
        tracker
    }

    fn reset_tables(&mut self) {
        self.pages = (1..=self.total_pages).map(PageStat::new).collect();
        for stat in self.sections.values_mut() {
            stat.time_spent_ms = 0;
            stat.visit_count = 0;
            stat.completed = false;
            stat.started_at = None;
            stat.ended_at = None;
        }
        self.navigation.clear();
        self.selections.clear();
    }

    /// Add a section to the stat table. Returns false if it is already tracked.
    pub fn register_section(&mut self, section: &Section) -> bool {
        if self.sections.contains_key(&section.id) {
            return false;
        }
        self.sections
            .insert(section.id.clone(), SectionStat::for_section(section));
        if section.is_dynamic() {
            self.dynamic_sections.push(section.without_children());
        }
        true
    }

    fn contains_page(&self, page: u32) -> bool {
        (1..=self.total_pages).contains(&page)
    }

    fn page_mut(&mut self, page: u32) -> Option<&mut PageStat> {
        page.checked_sub(1).and_then(|i| self.pages.get_mut(i as usize))
    }

    /// Attribute time since the anchors to the current page and section
    fn flush(&mut self, now: DateTime<Utc>) {
        if !self.activity.is_active() {
            return;
        }
        let cap = self.config.accrual_cap_ms;
        let completion = self.config.page_completion_ms;

        if let (Some(page), Some(anchor)) = (self.current_page, self.page_anchor) {
            let elapsed = analytics::accrue(anchor, now, cap);
            if let Some(stat) = self.page_mut(page) {
                stat.time_spent_ms += elapsed;
                if stat.time_spent_ms >= completion {
                    stat.completed = true;
                }
            }
            self.page_anchor = Some(now.max(anchor));
        }

        if let (Some(id), Some(anchor)) = (&self.current_section, self.section_anchor) {
            let elapsed = analytics::accrue(anchor, now, cap);
            if let Some(stat) = self.sections.get_mut(id) {
                stat.time_spent_ms += elapsed;
            }
            self.current_section_time_ms += elapsed;
            self.section_anchor = Some(now.max(anchor));
        }
    }

    /// Move the anchors to `now` without attributing anything
    fn reanchor(&mut self, now: DateTime<Utc>) {
        self.page_anchor = self.current_page.map(|_| now);
        self.section_anchor = self.current_section.as_ref().map(|_| now);
    }

    fn refresh_section_completion(&mut self, id: &SectionId) {
        let ratio = self.config.section_completion_ratio;
        let Some(stat) = self.sections.get(id) else {
            return;
        };
        let done = stat
            .page_ids
            .iter()
            .filter(|&&p| {
                p.checked_sub(1)
                    .and_then(|i| self.pages.get(i as usize))
                    .is_some_and(|s| s.completed)
            })
            .count();
        let completed = analytics::section_completed(done, stat.page_ids.len(), ratio);
        if let Some(stat) = self.sections.get_mut(id) {
            stat.completed = completed;
        }
    }

    /// Record a move from `from` (None for the first page shown) to `to`.
    ///
    /// Accrued time goes to the page the tracker was on; `to` gets a visit.
    pub fn record_page_change(&mut self, from: Option<u32>, to: u32, now: DateTime<Utc>) -> bool {
        if !self.contains_page(to) {
            warn!("Ignoring page change to {}: outside 1..={}", to, self.total_pages);
            return false;
        }
        if let Some(from) = from.filter(|p| !self.contains_page(*p)) {
            warn!("Ignoring page change from {}: outside 1..={}", from, self.total_pages);
            return false;
        }
        if from.is_some() && from != self.current_page {
            debug!(
                "Page change from {:?} while tracking {:?}",
                from, self.current_page
            );
        }

        self.flush(now);

        if let Some(stat) = self.page_mut(to) {
            stat.visit_count += 1;
            stat.last_visited_at = Some(now);
        }
        let kind = classify(from, to);
        self.navigation.push(NavigationEvent {
            from_page: from,
            to_page: to,
            timestamp: now,
            kind,
        });
        debug!("Navigation {:?} -> {} ({:?})", from, to, kind);

        self.current_page = Some(to);
        self.page_anchor = Some(now);
        true
    }

    /// Record entering section `to`.
    ///
    /// Changes closer than the debounce interval to the previous one are
    /// ignored, as is re-entering the current section. The section being left
    /// has its completion recomputed.
    pub fn record_section_change(
        &mut self,
        from: Option<&SectionId>,
        to: &SectionId,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.sections.contains_key(to) {
            warn!("Ignoring change to unknown section {}", to);
            return false;
        }
        if let Some(from) = from.filter(|id| !self.sections.contains_key(*id)) {
            warn!("Ignoring change from unknown section {}", from);
            return false;
        }
        if self.current_section.as_ref() == Some(to) {
            return false;
        }
        if let Some(last) = self.last_section_change {
            if now - last < Duration::milliseconds(self.config.section_debounce_ms) {
                debug!("Section change to {} debounced", to);
                return false;
            }
        }

        self.flush(now);

        if let Some(leaving) = self.current_section.take() {
            self.refresh_section_completion(&leaving);
            if let Some(stat) = self.sections.get_mut(&leaving) {
                stat.ended_at = Some(now);
            }
        }
        if let Some(stat) = self.sections.get_mut(to) {
            stat.visit_count += 1;
            stat.started_at = Some(now);
        }
        debug!("Section {:?} -> {}", from.map(SectionId::as_str), to);

        self.current_section = Some(to.clone());
        self.section_anchor = Some(now);
        self.current_section_time_ms = 0;
        self.last_section_change = Some(now);
        true
    }

    /// Append a selection to the bounded log, evicting the oldest when full
    pub fn record_text_selection(
        &mut self,
        text: &str,
        page: u32,
        section_title: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let text = text.trim();
        let length = text.chars().count();
        if length < self.config.min_selection_chars {
            debug!("Ignoring selection of {} chars", length);
            return false;
        }
        if !self.contains_page(page) {
            warn!("Ignoring selection on page {}: outside 1..={}", page, self.total_pages);
            return false;
        }

        self.selections.push_back(TextSelectionEvent {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            page,
            section_title: section_title.map(str::to_string),
            timestamp: now,
            length,
        });
        while self.selections.len() > self.config.selection_capacity {
            self.selections.pop_front();
        }
        true
    }

    /// An activity signal. Waking from Idle restarts accrual at `now`, so idle
    /// time is never counted. Returns true if the tracker woke up.
    pub fn record_activity(&mut self, now: DateTime<Utc>) -> bool {
        let woke = self.activity.signal(now);
        if woke {
            self.reanchor(now);
            debug!("Tracker active");
        }
        woke
    }

    /// Periodic check: accrue, then go Idle if the inactivity window has passed.
    /// Returns true if the tracker just went idle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        self.flush(now);
        let idle = self.activity.check(now);
        if idle {
            debug!("Tracker idle");
        }
        idle
    }

    /// Flush open accrual up to `now` and compute the snapshot.
    ///
    /// Navigation state is untouched; calling this repeatedly with the same
    /// `now` returns identical times.
    pub fn analytics(&mut self, now: DateTime<Utc>) -> TrackerSnapshot {
        self.flush(now);

        let counts = NavigationCounts::from_events(&self.navigation);
        let active_time_ms: i64 = self.pages.iter().map(|p| p.time_spent_ms).sum();
        let pages_completed = self.pages.iter().filter(|p| p.completed).count() as u32;
        let sections_completed = self.sections.values().filter(|s| s.completed).count() as u32;
        let words_read = analytics::words_read(
            analytics::words_from_selections(&self.selections),
            pages_completed,
            self.words_per_page,
        );

        let summary = AnalyticsSummary {
            session_time_ms: (now - self.session_started_at).num_milliseconds().max(0),
            active_time_ms,
            pages_completed,
            sections_completed,
            text_selections: self.selections.len() as u32,
            page_changes: counts.page_changes(),
            forward_moves: counts.forward,
            backward_moves: counts.backward,
            jump_moves: counts.jump,
            linear_reading_ratio: analytics::linear_reading_ratio(
                counts.forward,
                counts.backward,
                counts.jump,
            ),
            progress_percentage: analytics::progress_percentage(pages_completed, self.total_pages),
            words_read,
            reading_speed_wpm: analytics::reading_speed(
                words_read,
                active_time_ms,
                self.config.max_reading_speed_wpm,
            ),
            current_section_time_ms: self.current_section_time_ms,
            is_active: self.activity.is_active(),
            total_pages: self.total_pages,
            current_page: self.current_page,
            current_section: self.current_section.clone(),
        };

        TrackerSnapshot {
            session_started_at: self.session_started_at,
            captured_at: now,
            summary,
            pages: self.pages.clone(),
            sections: self.sections.values().cloned().collect(),
            navigation: self.navigation.clone(),
            selections: self.selections.iter().cloned().collect(),
            dynamic_sections: self.dynamic_sections.clone(),
        }
    }

    /// Clear every statistic and log. Pages and sections stay known, and the
    /// current position is kept so accrual continues from `now`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.reset_tables();
        self.session_started_at = now;
        self.activity = ActivityMonitor::new(self.config.inactivity_window_ms, now);
        self.current_section_time_ms = 0;
        self.last_section_change = None;
        self.reanchor(now);
        info!("Reading analytics reset");
    }

    /// Load tables and logs from a previous session's snapshot.
    ///
    /// Dynamic sections in the snapshot are registered first. Rows for pages or
    /// sections this document does not have are dropped.
    pub fn restore(&mut self, snapshot: &TrackerSnapshot) {
        for section in &snapshot.dynamic_sections {
            self.register_section(section);
        }

        let mut pages = 0;
        for stat in &snapshot.pages {
            if let Some(slot) = self.page_mut(stat.page_number) {
                *slot = stat.clone();
                pages += 1;
            }
        }
        let mut sections = 0;
        for stat in &snapshot.sections {
            if let Some(slot) = self.sections.get_mut(&stat.section_id) {
                *slot = stat.clone();
                sections += 1;
            }
        }

        self.navigation = snapshot.navigation.clone();
        let skip = snapshot
            .selections
            .len()
            .saturating_sub(self.config.selection_capacity);
        self.selections = snapshot.selections.iter().skip(skip).cloned().collect();
        self.session_started_at = snapshot.session_started_at;

        info!(
            "Restored {} page and {} section stats from {}",
            pages, sections, snapshot.captured_at
        );
    }

    /// Words-per-page used for the completed-page estimate
    pub fn set_average_words_per_page(&mut self, words: u32) {
        self.words_per_page = words;
    }

    pub fn page_stat(&self, page: u32) -> Option<&PageStat> {
        page.checked_sub(1).and_then(|i| self.pages.get(i as usize))
    }

    pub fn section_stat(&self, id: &SectionId) -> Option<&SectionStat> {
        self.sections.get(id)
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn current_section(&self) -> Option<&SectionId> {
        self.current_section.as_ref()
    }

    pub fn activity_state(&self) -> ActivityState {
        self.activity.state()
    }

    pub fn is_active(&self) -> bool {
        self.activity.is_active()
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn navigation(&self) -> &[NavigationEvent] {
        &self.navigation
    }

    /// Selections, oldest first
    pub fn selections(&self) -> impl Iterator<Item = &TextSelectionEvent> {
        self.selections.iter()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
