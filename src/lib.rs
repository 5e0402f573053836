//! Readtrace - Reading analytics and section detection for paginated documents
//!
//! Readtrace follows a viewer through a paginated document: it builds a section
//! hierarchy from the document outline, attributes reading time to pages and
//! sections under an active/idle attention model, decides which section the
//! viewer is in from several imperfect signals, and derives aggregate reading
//! metrics.
//!
//! Data flows one way: outline → section index → detector ⇄ tracker → snapshot.
//!
//! ## Modules
//!
//! - **Structure**: [`outline`], [`index`] and [`text`] turn outlines and page text into sections and headings
//! - **Detection**: [`detection`] ranks candidate sections for a fragment, a viewport or a hover
//! - **Tracking**: [`tracker`] accrues time and computes [`types::TrackerSnapshot`]s
//! - **Session**: [`session`] wires everything together per document, with [`store`] and [`export`]

pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod geometry;
pub mod index;
pub mod outline;
pub mod replay;
pub mod session;
pub mod store;
pub mod text;
pub mod tracker;
pub mod types;

pub use config::AnalyticsConfig;
pub use detection::{HeadingHint, SectionDetector};
pub use error::AnalyticsError;
pub use export::{export_filename, format_duration, ExportReport};
pub use geometry::{GeometryProvider, VisiblePage};
pub use index::SectionIndex;
pub use outline::{normalize_outline, DestinationResolver, NamedDestinations, OutlineNode};
pub use replay::{parse_event_log, replay, SessionEvent};
pub use session::ReadingSession;
pub use store::{FileStore, KeyValueStore, MemoryStore, SnapshotStore};
pub use text::{PageTextProvider, TextToken};
pub use tracker::ReadingTracker;
pub use types::{Section, SectionId, TrackerSnapshot};

/// Crate version, reported by the CLI
pub const READTRACE_VERSION: &str = env!("CARGO_PKG_VERSION");
