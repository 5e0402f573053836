//! Session event log
//!
//! A recorded stream of host signals, one JSON object per event, tagged by
//! `type` and stamped with `at`. Replaying a log through a [`ReadingSession`]
//! reproduces the analytics the live session would have produced.
//!
//! ```text
//! {"type": "page_change", "at": "2024-03-09T10:00:00Z", "page": 1}
//! {"type": "selection", "at": "2024-03-09T10:00:12Z", "text": "Materials and Methods"}
//! {"type": "tick", "at": "2024-03-09T10:00:40Z"}
//! ```

use crate::detection::HeadingHint;
use crate::error::AnalyticsError;
use crate::geometry::{GeometryProvider, Region, VisiblePage};
use crate::session::ReadingSession;
use crate::text::TextToken;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// One recorded host signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    PageChange {
        at: DateTime<Utc>,
        page: u32,
    },
    Activity {
        at: DateTime<Utc>,
    },
    Selection {
        at: DateTime<Utc>,
        text: String,
        /// Current page when absent
        #[serde(default)]
        page: Option<u32>,
    },
    Fragment {
        at: DateTime<Utc>,
        text: String,
        page: u32,
        #[serde(default)]
        font_size: Option<f64>,
        #[serde(default)]
        bold: bool,
    },
    Hover {
        at: DateTime<Utc>,
        page: u32,
        text: String,
        y: f64,
    },
    Viewport {
        at: DateTime<Utc>,
        visible: Vec<VisiblePage>,
        /// Visible text of the most visible page
        #[serde(default)]
        text: Option<String>,
    },
    /// Positioned text for a page, as a text provider would deliver it
    PageText {
        at: DateTime<Utc>,
        page: u32,
        tokens: Vec<TextToken>,
    },
    Tick {
        at: DateTime<Utc>,
    },
    Reset {
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::PageChange { at, .. }
            | SessionEvent::Activity { at }
            | SessionEvent::Selection { at, .. }
            | SessionEvent::Fragment { at, .. }
            | SessionEvent::Hover { at, .. }
            | SessionEvent::Viewport { at, .. }
            | SessionEvent::PageText { at, .. }
            | SessionEvent::Tick { at }
            | SessionEvent::Reset { at } => *at,
        }
    }
}

/// Parse a JSON array or newline-delimited JSON event log.
///
/// Events must be in chronological order.
pub fn parse_event_log(input: &str) -> Result<Vec<SessionEvent>, AnalyticsError> {
    let trimmed = input.trim_start();
    let events: Vec<SessionEvent> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|e| AnalyticsError::InvalidEventLog(e.to_string()))?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line.trim())
                    .map_err(|e| AnalyticsError::InvalidEventLog(format!("line {}: {}", n + 1, e)))
            })
            .collect::<Result<_, _>>()?
    };

    if let Some(i) = events.windows(2).position(|w| w[1].at() < w[0].at()) {
        return Err(AnalyticsError::InvalidEventLog(format!(
            "event {} at {} precedes the event before it",
            i + 2,
            events[i + 1].at()
        )));
    }
    Ok(events)
}

/// Geometry reconstructed from a recorded viewport event
struct RecordedViewport<'a> {
    visible: &'a [VisiblePage],
    text: Option<&'a str>,
}

impl GeometryProvider for RecordedViewport<'_> {
    fn visible_pages(&self) -> Vec<VisiblePage> {
        self.visible.to_vec()
    }

    fn text_in_region(&self, _page: u32, _region: Option<Region>) -> Option<String> {
        self.text.map(str::to_string)
    }

    fn page_number_from_position(&self, _x: f64, _y: f64) -> Option<u32> {
        None
    }
}

/// Feed one event to the session. Timers are polled at the event's time first,
/// as a host event loop would have done.
pub fn apply_event(session: &mut ReadingSession, event: &SessionEvent) {
    let at = event.at();
    session.tick(at);

    match event {
        SessionEvent::PageChange { page, .. } => {
            session.handle_page_change(*page, at);
        }
        SessionEvent::Activity { .. } => session.record_activity(at),
        SessionEvent::Selection { text, page, .. } => {
            session.handle_selection(text, *page, at);
        }
        SessionEvent::Fragment {
            text,
            page,
            font_size,
            bold,
            ..
        } => {
            let hint = font_size.map(|font_size| HeadingHint {
                font_size,
                bold: *bold,
            });
            session.handle_fragment(text, *page, hint.as_ref(), at);
        }
        SessionEvent::Hover { page, text, y, .. } => {
            session.handle_hover(*page, text, *y, at);
        }
        SessionEvent::Viewport { visible, text, .. } => {
            let geometry = RecordedViewport {
                visible,
                text: text.as_deref(),
            };
            session.handle_viewport(visible, &geometry, at);
        }
        SessionEvent::PageText { page, tokens, .. } => session.load_page_text(*page, tokens),
        SessionEvent::Tick { .. } => {}
        SessionEvent::Reset { .. } => session.reset(at),
    }
}

/// Replay `events` in order. Returns the time of the last event.
pub fn replay(session: &mut ReadingSession, events: &[SessionEvent]) -> Option<DateTime<Utc>> {
    for event in events {
        apply_event(session, event);
    }
    debug!("Replayed {} events", events.len());
    events.last().map(SessionEvent::at)
}
