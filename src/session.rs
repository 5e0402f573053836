//! Per-document reading session
//!
//! [`ReadingSession`] is the context object a host constructs once per viewed
//! document. It owns the section index, detector, text cache, tracker, timers
//! and optional snapshot store, and turns raw host signals (page changes,
//! activity, selections, hover, viewport) into tracker operations.
//!
//! The session is driven entirely by the host: every call takes `now`, and
//! [`ReadingSession::tick`] must be polled for the idle check and auto-save.

use crate::config::AnalyticsConfig;
use crate::detection::{HeadingHint, SectionDetector};
use crate::error::AnalyticsError;
use crate::export::ExportReport;
use crate::geometry::{primary_visible_page, GeometryProvider, VisiblePage};
use crate::index::SectionIndex;
use crate::store::SnapshotStore;
use crate::text::{structure_page, PageTextProvider, TextCache, TextToken};
use crate::tracker::activity::{PeriodicTimer, Throttle};
use crate::tracker::ReadingTracker;
use crate::types::{DetectionCandidate, Section, SectionId, TrackerSnapshot};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Characters of a selection shown in the activity feed
const SELECTION_PREVIEW_CHARS: usize = 50;

/// What caused a section change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionTrigger {
    PageChange,
    TextSelection,
    Fragment,
    Hover,
    Viewport,
}

/// One line of the human-readable activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// What a [`ReadingSession::tick`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub went_idle: bool,
    pub saved: bool,
}

/// Reading analytics for one open document.
///
/// Routes host signals through the detector into the tracker, polls the idle
/// check and auto-save timers, and keeps a short activity feed. Construct one
/// per document with [`ReadingSession::new`], optionally resuming with
/// [`ReadingSession::with_store`].
pub struct ReadingSession {
    fingerprint: String,
    config: AnalyticsConfig,
    index: SectionIndex,
    detector: SectionDetector,
    texts: TextCache,
    text_provider: Option<Box<dyn PageTextProvider>>,
    tracker: ReadingTracker,
    store: Option<SnapshotStore>,

    activity_timer: PeriodicTimer,
    autosave_timer: PeriodicTimer,
    activity_throttle: Throttle,
    hover_throttle: Throttle,
    viewport_throttle: Throttle,
    /// Set when a page change landed on a page shared by several sections
    viewport_pending: bool,

    feed: VecDeque<ActivityEntry>,
}

impl ReadingSession {
    /// Start a session over `index`. Timers start immediately.
    pub fn new(
        fingerprint: impl Into<String>,
        index: SectionIndex,
        config: AnalyticsConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, AnalyticsError> {
        config.validate()?;

        let tracker = ReadingTracker::new(&index, config.tracker.clone(), now);
        let mut activity_timer = PeriodicTimer::new(config.tracker.activity_check_interval_ms);
        activity_timer.start(now);
        let mut autosave_timer = PeriodicTimer::new(config.session.auto_save_interval_ms);
        if config.session.auto_save {
            autosave_timer.start(now);
        }

        let mut session = Self {
            fingerprint: fingerprint.into(),
            detector: SectionDetector::new(config.detector.clone()),
            texts: TextCache::new(config.text.clone()),
            text_provider: None,
            tracker,
            store: None,
            activity_throttle: Throttle::new(config.session.activity_throttle_ms),
            hover_throttle: Throttle::new(config.session.hover_throttle_ms),
            viewport_throttle: Throttle::new(config.session.viewport_throttle_ms),
            viewport_pending: false,
            feed: VecDeque::new(),
            activity_timer,
            autosave_timer,
            index,
            config,
        };

        info!(
            "Reading session started for {} ({} pages, {} sections)",
            session.fingerprint,
            session.index.total_pages(),
            session.index.len()
        );
        session.add_activity("Session started", now);
        Ok(session)
    }

    /// Attach a snapshot store and resume from the record saved for this
    /// document, if there is one
    pub fn with_store(mut self, store: SnapshotStore, now: DateTime<Utc>) -> Self {
        if let Some(snapshot) = store.load(&self.fingerprint) {
            for section in &snapshot.dynamic_sections {
                self.index.add_dynamic(section.clone());
            }
            self.tracker.restore(&snapshot);
            self.add_activity("Resumed previous session", now);
        }
        self.store = Some(store);
        self
    }

    /// Attach a page text provider and pre-extract the first pages
    pub fn with_text_provider(mut self, provider: impl PageTextProvider + 'static) -> Self {
        self.text_provider = Some(Box::new(provider));
        let prefetch = self.config.text.prefetch_pages.min(self.index.total_pages());
        for page in 1..=prefetch {
            self.extract_text(page);
        }
        self
    }

    /// Structure and cache text the host already has for `page`
    pub fn load_page_text(&mut self, page: u32, tokens: &[TextToken]) {
        self.texts.insert(structure_page(page, tokens, &self.config.text));
        if let Some(words) = self.texts.average_words_per_page() {
            self.tracker.set_average_words_per_page(words);
        }
    }

    fn extract_text(&mut self, page: u32) {
        if !self.config.session.enable_text_extraction {
            return;
        }
        if let Some(provider) = &self.text_provider {
            self.texts.ensure(page, provider.as_ref());
        }
        if let Some(words) = self.texts.average_words_per_page() {
            self.tracker.set_average_words_per_page(words);
        }
    }

    fn add_activity(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.feed.push_front(ActivityEntry {
            at: now,
            message: message.into(),
        });
        self.feed.truncate(self.config.session.activity_feed_capacity);
    }

    /// A generic activity signal (pointer, scroll, key), throttled
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        if self.activity_throttle.allow(now) {
            self.tracker.record_activity(now);
        }
    }

    /// The viewer moved to `page`.
    ///
    /// A page covered by one section enters it directly. A shared page leaves
    /// the section unchanged until the next viewport update, which bypasses
    /// the viewport throttle, or a text signal decides.
    pub fn handle_page_change(&mut self, page: u32, now: DateTime<Utc>) -> bool {
        let from = self.tracker.current_page();
        if from == Some(page) {
            return false;
        }
        self.tracker.record_activity(now);
        if !self.tracker.record_page_change(from, page, now) {
            return false;
        }
        self.add_activity(format!("Moved to page {}", page), now);
        self.extract_text(page);

        let only = match self.index.sections_on_page(page).as_slice() {
            [only] => Some(only.id.clone()),
            sections => {
                self.viewport_pending = sections.len() > 1;
                None
            }
        };
        if let Some(id) = only {
            self.viewport_pending = false;
            self.update_current_section(&id, SectionTrigger::PageChange, now);
        }
        true
    }

    /// Enter `id` if it is not already the current section
    pub fn update_current_section(
        &mut self,
        id: &SectionId,
        trigger: SectionTrigger,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(section) = self.index.get(id).cloned() else {
            debug!("Unknown section {} from {:?}", id, trigger);
            return false;
        };
        let previous = self.tracker.current_section().cloned();
        if previous.as_ref() == Some(id) {
            return false;
        }
        self.tracker.register_section(&section);
        if !self.tracker.record_section_change(previous.as_ref(), id, now) {
            return false;
        }
        debug!("Section updated: {} ({:?})", section.title, trigger);
        self.add_activity(format!("Entered section: {}", section.title), now);
        true
    }

    fn apply(&mut self, candidate: &DetectionCandidate, trigger: SectionTrigger, now: DateTime<Utc>) {
        if candidate.section.is_dynamic() {
            self.tracker.register_section(&candidate.section);
        }
        self.update_current_section(&candidate.section.id, trigger, now);
    }

    /// The user selected `text` on `page` (the current page when `None`)
    pub fn handle_selection(&mut self, text: &str, page: Option<u32>, now: DateTime<Utc>) -> bool {
        let Some(page) = page.or(self.tracker.current_page()) else {
            debug!("Selection with no known page");
            return false;
        };
        self.tracker.record_activity(now);

        let detected = self
            .detector
            .detect(&mut self.index, self.texts.get(page), text, page, None);
        if let Some(candidate) =
            detected.filter(|c| c.confidence > self.config.detector.selection_accept)
        {
            self.apply(&candidate, SectionTrigger::TextSelection, now);
        }

        let title = self.current_section().map(|s| s.title.clone());
        if !self
            .tracker
            .record_text_selection(text, page, title.as_deref(), now)
        {
            return false;
        }

        let text = text.trim();
        let preview = if text.chars().count() > SELECTION_PREVIEW_CHARS {
            format!(
                "{}...",
                text.chars().take(SELECTION_PREVIEW_CHARS).collect::<String>()
            )
        } else {
            text.to_string()
        };
        self.add_activity(format!("Selected text: \"{}\"", preview), now);
        true
    }

    /// Detect from a text fragment observed on `page` and apply the result
    /// when it clears the selection threshold
    pub fn handle_fragment(
        &mut self,
        text: &str,
        page: u32,
        hint: Option<&HeadingHint>,
        now: DateTime<Utc>,
    ) -> Option<DetectionCandidate> {
        self.extract_text(page);
        let candidate = self
            .detector
            .detect(&mut self.index, self.texts.get(page), text, page, hint)?;
        if candidate.section.is_dynamic() {
            self.tracker.register_section(&candidate.section);
        }
        if candidate.confidence >= self.config.detector.selection_accept {
            self.apply(&candidate, SectionTrigger::Fragment, now);
        }
        Some(candidate)
    }

    /// The pointer rests on `text` at height `y` of `page`. Throttled.
    pub fn handle_hover(
        &mut self,
        page: u32,
        text: &str,
        y: f64,
        now: DateTime<Utc>,
    ) -> Option<DetectionCandidate> {
        if !self.hover_throttle.allow(now) {
            return None;
        }
        self.tracker.record_activity(now);
        self.extract_text(page);

        let candidate = self.detector.detect_from_hover(
            &mut self.index,
            self.texts.get(page),
            page,
            text,
            y,
        )?;
        self.apply(&candidate, SectionTrigger::Hover, now);
        Some(candidate)
    }

    /// The visible pages changed. Throttled, unless a page change is waiting
    /// for viewport disambiguation.
    ///
    /// Returns the detected candidate; entering it is still subject to the
    /// section debounce.
    pub fn handle_viewport(
        &mut self,
        visible: &[VisiblePage],
        geometry: &dyn GeometryProvider,
        now: DateTime<Utc>,
    ) -> Option<DetectionCandidate> {
        if !self.viewport_pending && !self.viewport_throttle.allow(now) {
            return None;
        }
        self.viewport_pending = false;
        self.tracker.record_activity(now);

        let primary = primary_visible_page(visible)?;
        if self.tracker.current_page() != Some(primary.page) {
            self.handle_page_change(primary.page, now);
            self.viewport_pending = false;
        }
        self.extract_text(primary.page);

        let candidate = self.detector.detect_from_viewport(
            &mut self.index,
            &self.texts,
            visible,
            geometry,
        )?;
        self.apply(&candidate, SectionTrigger::Viewport, now);
        Some(candidate)
    }

    /// Poll the idle check and auto-save timers
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.activity_timer.poll(now) {
            outcome.went_idle = self.tracker.tick(now);
        }
        if self.autosave_timer.poll(now) {
            outcome.saved = self.persist(now);
        }
        outcome
    }

    pub fn analytics(&mut self, now: DateTime<Utc>) -> TrackerSnapshot {
        self.tracker.analytics(now)
    }

    /// Save the current snapshot. False without a store or on store failure.
    pub fn persist(&mut self, now: DateTime<Utc>) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        let snapshot = self.tracker.analytics(now);
        store.save(&self.fingerprint, &snapshot)
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.tracker.reset(now);
        self.add_activity("Analytics reset", now);
    }

    pub fn export(&mut self, now: DateTime<Utc>) -> ExportReport {
        let snapshot = self.tracker.analytics(now);
        ExportReport::new(snapshot, &self.index, &self.fingerprint, now)
    }

    /// Tear down: stop timers and drop cached page text. The snapshot is only
    /// written when `flush` is set. Returns whether it was saved.
    pub fn close(&mut self, now: DateTime<Utc>, flush: bool) -> bool {
        self.activity_timer.cancel();
        self.autosave_timer.cancel();
        self.texts.clear();
        let saved = flush && self.persist(now);
        info!("Reading session closed for {}", self.fingerprint);
        saved
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn index(&self) -> &SectionIndex {
        &self.index
    }

    pub fn tracker(&self) -> &ReadingTracker {
        &self.tracker
    }

    pub fn text_cache(&self) -> &TextCache {
        &self.texts
    }

    pub fn store(&self) -> Option<&SnapshotStore> {
        self.store.as_ref()
    }

    pub fn current_section(&self) -> Option<&Section> {
        self.tracker
            .current_section()
            .and_then(|id| self.index.get(id))
    }

    /// Newest first
    pub fn activity_feed(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.feed.iter()
    }

    pub fn timers_running(&self) -> bool {
        self.activity_timer.is_running() || self.autosave_timer.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;
    use crate::outline::{normalize_outline, NamedDestinations, OutlineNode};
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::types::{DetectionMethod, NavigationKind};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn paper() -> SectionIndex {
        let mut destinations = NamedDestinations::new();
        destinations.insert("intro", 1);
        destinations.insert("methods", 6);
        destinations.insert("results", 13);
        let outline = vec![
            OutlineNode::new("Introduction", "intro"),
            OutlineNode::new("Materials and Methods", "methods"),
            OutlineNode::new("Results", "results"),
        ];
        SectionIndex::new(normalize_outline(&outline, 20, &destinations), 20)
    }

    fn session() -> ReadingSession {
        ReadingSession::new("paper", paper(), AnalyticsConfig::default(), at(0)).unwrap()
    }

    /// Page 8 carries a subheading; every other page is body text
    struct PaperText;

    impl PageTextProvider for PaperText {
        fn page_tokens(&self, page: u32) -> Result<Vec<TextToken>, AnalyticsError> {
            let mut tokens = Vec::new();
            if page == 8 {
                tokens.push(TextToken::new("Sample Preparation", 72.0, 100.0, 16.0));
            }
            tokens.push(TextToken::new("lorem ipsum dolor sit amet", 72.0, 140.0, 10.0));
            Ok(tokens)
        }
    }

    struct Screen {
        text: Option<String>,
    }

    impl GeometryProvider for Screen {
        fn visible_pages(&self) -> Vec<VisiblePage> {
            Vec::new()
        }

        fn text_in_region(&self, _page: u32, _region: Option<Region>) -> Option<String> {
            self.text.clone()
        }

        fn page_number_from_position(&self, _x: f64, _y: f64) -> Option<u32> {
            None
        }
    }

    #[test]
    fn test_end_to_end_reading() {
        let mut session = session();
        let ends: Vec<u32> = session.index().iter().map(|s| s.end_page).collect();
        assert_eq!(ends, vec![5, 12, 20]);

        let intro: SectionId = "section_1_0".into();
        assert!(session.handle_page_change(1, at(0)));
        assert_eq!(session.current_section().unwrap().id, intro);

        for (step, page) in [2, 3, 6].into_iter().enumerate() {
            session.record_activity(at(10 * step as i64 + 5));
            assert!(session.handle_page_change(page, at(10 * (step as i64 + 1))));
        }
        assert_eq!(session.tracker().section_stat(&intro).unwrap().time_spent_ms, 30_000);
        assert_eq!(session.current_section().unwrap().title, "Materials and Methods");

        assert!(session.handle_page_change(5, at(40)));
        assert!(!session.handle_page_change(5, at(41)));

        let snapshot = session.analytics(at(50));
        assert_eq!(snapshot.page(3).unwrap().visit_count, 1);
        let backward: Vec<(Option<u32>, u32)> = snapshot
            .navigation
            .iter()
            .filter(|e| e.kind == NavigationKind::Backward)
            .map(|e| (e.from_page, e.to_page))
            .collect();
        assert_eq!(backward, vec![(Some(6), 5)]);

        let feed: Vec<&str> = session.activity_feed().map(|e| e.message.as_str()).take(2).collect();
        assert_eq!(feed, vec!["Entered section: Introduction", "Moved to page 5"]);
    }

    #[test]
    fn test_selection_detects_section_and_logs() {
        let mut session = session();
        session.handle_page_change(5, at(0));

        // a title match on page 6 beats the current section
        assert!(session.handle_selection("Materials and Methods", Some(6), at(2)));
        assert_eq!(session.current_section().unwrap().id.as_str(), "section_1_1");

        let selection = session.tracker().selections().last().unwrap().clone();
        assert_eq!(selection.section_title.as_deref(), Some("Materials and Methods"));
        assert_eq!(selection.page, 6);
        assert_eq!(
            session.activity_feed().next().unwrap().message,
            "Selected text: \"Materials and Methods\""
        );

        assert!(!session.handle_selection("ok", None, at(3)));
        assert_eq!(session.tracker().selections().count(), 1);
    }

    #[test]
    fn test_long_selection_preview_is_truncated() {
        let mut session = session();
        session.handle_page_change(2, at(0));
        let text = "word ".repeat(20);
        assert!(session.handle_selection(&text, None, at(1)));

        let message = &session.activity_feed().next().unwrap().message;
        assert!(message.ends_with("...\""));
        assert_eq!(message.chars().count(), "Selected text: \"".len() + 50 + 4);
    }

    #[test]
    fn test_hover_creates_dynamic_section() {
        let mut session = session().with_text_provider(PaperText);
        assert_eq!(session.text_cache().len(), 10);
        session.handle_page_change(8, at(0));

        let candidate = session.handle_hover(8, "lorem ipsum", 150.0, at(2)).unwrap();
        assert_eq!(candidate.method, DetectionMethod::DynamicSynthesis);
        let id = candidate.section.id.clone();
        assert_eq!(id.as_str(), "dynamic_section_8_sample_preparation");
        assert_eq!(session.current_section().unwrap().id, id);
        assert!(session.tracker().section_stat(&id).is_some());

        // throttled
        assert!(session.handle_hover(8, "lorem ipsum", 150.0, at(2)).is_none());

        let snapshot = session.analytics(at(10));
        assert_eq!(snapshot.dynamic_sections.len(), 1);
        assert_eq!(snapshot.section(&id).unwrap().time_spent_ms, 8_000);
    }

    #[test]
    fn test_viewport_follows_most_visible_page() {
        let mut session = session();
        session.handle_page_change(1, at(0));

        let visible = [
            VisiblePage {
                page: 1,
                visibility_ratio: 0.2,
            },
            VisiblePage {
                page: 7,
                visibility_ratio: 0.8,
            },
        ];
        let candidate = session
            .handle_viewport(&visible, &Screen { text: None }, at(5))
            .unwrap();
        assert_eq!(candidate.section.id.as_str(), "section_1_1");
        assert_eq!(session.tracker().current_page(), Some(7));

        // within the throttle window
        assert!(session
            .handle_viewport(&visible, &Screen { text: None }, at(5) + Duration::milliseconds(100))
            .is_none());
    }

    fn paper_with_tooling() -> SectionIndex {
        SectionIndex::new(
            vec![
                Section::configured("intro", "Introduction", 1, 5, 1),
                Section::configured("methods", "Materials and Methods", 6, 12, 1),
                Section::configured("tools", "Tooling Overview", 12, 12, 2),
                Section::configured("results", "Results", 13, 20, 1),
            ],
            20,
        )
    }

    #[test]
    fn test_viewport_decides_shared_page() {
        let mut session =
            ReadingSession::new("paper", paper_with_tooling(), AnalyticsConfig::default(), at(0))
                .unwrap();
        session.handle_page_change(13, at(0));
        assert_eq!(session.current_section().unwrap().id.as_str(), "results");

        let screen = Screen {
            text: Some("2.4 Tooling Overview  We used three tools".to_string()),
        };
        let candidate = session
            .handle_viewport(
                &[VisiblePage {
                    page: 12,
                    visibility_ratio: 1.0,
                }],
                &screen,
                at(10),
            )
            .unwrap();
        assert_eq!(candidate.section.id.as_str(), "tools");
        assert_eq!(session.tracker().current_page(), Some(12));
        assert_eq!(session.current_section().unwrap().id.as_str(), "tools");
        assert_eq!(
            session
                .tracker()
                .section_stat(&"results".into())
                .unwrap()
                .time_spent_ms,
            10_000
        );
    }

    #[test]
    fn test_page_change_to_shared_page_waits_for_viewport() {
        let mut session =
            ReadingSession::new("paper", paper_with_tooling(), AnalyticsConfig::default(), at(0))
                .unwrap();
        session.handle_page_change(11, at(0));
        let screen = Screen {
            text: Some("2.4 Tooling Overview  We used three tools".to_string()),
        };
        let page = |page| {
            [VisiblePage {
                page,
                visibility_ratio: 1.0,
            }]
        };
        assert!(session.handle_viewport(&page(11), &screen, at(10)).is_some());

        let soon = at(10) + Duration::milliseconds(100);
        assert!(session.handle_page_change(12, soon));
        assert_eq!(session.current_section().unwrap().id.as_str(), "methods");

        // inside the throttle window, but the shared page is still undecided
        let candidate = session
            .handle_viewport(&page(12), &screen, soon + Duration::milliseconds(100))
            .unwrap();
        assert_eq!(candidate.section.id.as_str(), "tools");
        assert_eq!(session.current_section().unwrap().id.as_str(), "tools");

        // decided, so the throttle applies again
        assert!(session
            .handle_viewport(&page(12), &screen, soon + Duration::milliseconds(200))
            .is_none());
    }

    #[test]
    fn test_idle_tick_and_autosave() {
        let mut session = session().with_store(SnapshotStore::new(MemoryStore::new()), at(0));
        session.handle_page_change(3, at(0));

        assert_eq!(session.tick(at(4)), TickOutcome::default());
        assert!(!session.tick(at(25)).went_idle);
        let outcome = session.tick(at(30));
        assert!(outcome.went_idle);
        assert!(outcome.saved);
        assert!(!session.tracker().is_active());

        // idle time is not attributed
        session.record_activity(at(200));
        let snapshot = session.analytics(at(210));
        assert_eq!(snapshot.page(3).unwrap().time_spent_ms, 40_000);
    }

    #[test]
    fn test_resume_from_store() {
        let mut session = session().with_text_provider(PaperText);
        let mut memory = MemoryStore::new();
        session.handle_page_change(8, at(0));
        session.handle_hover(8, "lorem ipsum", 150.0, at(1));
        session.handle_selection("ipsum dolor sit", None, at(2));
        let snapshot = session.analytics(at(20));
        memory
            .set(&SnapshotStore::key("paper"), &snapshot.to_json().unwrap())
            .unwrap();

        let resumed = ReadingSession::new("paper", paper(), AnalyticsConfig::default(), at(100))
            .unwrap()
            .with_store(SnapshotStore::new(memory), at(100));
        assert_eq!(resumed.index().len(), 4);
        assert_eq!(resumed.tracker().page_stat(8).unwrap().time_spent_ms, 20_000);
        assert_eq!(resumed.tracker().selections().count(), 1);
        assert_eq!(
            resumed.activity_feed().next().unwrap().message,
            "Resumed previous session"
        );
    }

    #[test]
    fn test_close_stops_timers_and_flushes_on_request() {
        let mut session = session()
            .with_text_provider(PaperText)
            .with_store(SnapshotStore::new(MemoryStore::new()), at(0));
        session.handle_page_change(2, at(0));

        assert!(session.timers_running());
        assert!(session.close(at(10), true));
        assert!(!session.timers_running());
        assert!(session.text_cache().is_empty());
        assert_eq!(session.tick(at(60)), TickOutcome::default());

        let saved = session.store().unwrap().load("paper").unwrap();
        assert_eq!(saved.page(2).unwrap().time_spent_ms, 10_000);

        let mut quiet = self::session();
        assert!(!quiet.close(at(10), true));
    }

    #[test]
    fn test_reset_and_export() {
        let mut session = session();
        session.handle_page_change(1, at(0));
        session.handle_page_change(2, at(5));
        session.reset(at(6));

        let report = session.export(at(8));
        assert_eq!(report.document.id, "paper");
        assert_eq!(report.document.sections.len(), 3);
        assert_eq!(report.snapshot.summary.active_time_ms, 2_000);
        assert_eq!(session.activity_feed().next().unwrap().message, "Analytics reset");
    }

    #[test]
    fn test_feed_is_bounded() {
        let mut session = session();
        for i in 0..30 {
            session.handle_page_change(1 + (i % 2), at(i as i64 * 2));
        }
        assert_eq!(session.activity_feed().count(), 20);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = AnalyticsConfig::default();
        config.detector.min_confidence = 2.0;
        assert!(matches!(
            ReadingSession::new("x", paper(), config, at(0)),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }
}
