//! Navigation classification

use crate::types::{NavigationEvent, NavigationKind};

/// Classify a move by the sign and magnitude of the page delta
pub fn classify(from: Option<u32>, to: u32) -> NavigationKind {
    let Some(from) = from else {
        return NavigationKind::Initial;
    };
    match i64::from(to) - i64::from(from) {
        0 => NavigationKind::Same,
        1 => NavigationKind::Forward,
        -1 => NavigationKind::Backward,
        _ => NavigationKind::Jump,
    }
}

/// Per-kind tallies of a navigation log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationCounts {
    pub initial: u32,
    pub forward: u32,
    pub backward: u32,
    pub jump: u32,
    pub same: u32,
}

impl NavigationCounts {
    pub fn from_events(events: &[NavigationEvent]) -> Self {
        events.iter().fold(Self::default(), |mut counts, event| {
            match event.kind {
                NavigationKind::Initial => counts.initial += 1,
                NavigationKind::Forward => counts.forward += 1,
                NavigationKind::Backward => counts.backward += 1,
                NavigationKind::Jump => counts.jump += 1,
                NavigationKind::Same => counts.same += 1,
            }
            counts
        })
    }

    /// Moves after the first page was shown
    pub fn page_changes(&self) -> u32 {
        self.forward + self.backward + self.jump + self.same
    }
}
