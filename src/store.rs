//! Snapshot persistence
//!
//! The tracker snapshot is persisted as one JSON record per document
//! fingerprint in a host-supplied key-value store. Persistence is best effort:
//! [`SnapshotStore::load`] and [`SnapshotStore::save`] log failures and carry on,
//! since the in-memory tracker stays authoritative for the session.

use crate::error::AnalyticsError;
use crate::types::TrackerSnapshot;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key prefix for persisted snapshots
pub const SNAPSHOT_KEY_PREFIX: &str = "reading_analytics_";

/// A string key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, AnalyticsError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), AnalyticsError>;
    fn remove(&mut self, key: &str) -> Result<(), AnalyticsError>;
}

/// In-memory store with an optional byte quota over all values
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AnalyticsError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), AnalyticsError> {
        if let Some(quota) = self.quota {
            let used: usize = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let available = quota.saturating_sub(used);
            if value.len() > available {
                return Err(AnalyticsError::QuotaExceeded {
                    needed: value.len(),
                    available,
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), AnalyticsError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`; characters outside `[A-Za-z0-9_-]` become `_`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AnalyticsError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), AnalyticsError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AnalyticsError::StoreUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;
        // write then rename, so a torn write never replaces the previous record
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), AnalyticsError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Tracker snapshots keyed by document fingerprint
pub struct SnapshotStore {
    store: Box<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn key(fingerprint: &str) -> String {
        format!("{}{}", SNAPSHOT_KEY_PREFIX, fingerprint)
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn try_load(&self, fingerprint: &str) -> Result<Option<TrackerSnapshot>, AnalyticsError> {
        match self.store.get(&Self::key(fingerprint))? {
            Some(json) => Ok(Some(TrackerSnapshot::from_json(&json)?)),
            None => Ok(None),
        }
    }

    pub fn try_save(
        &mut self,
        fingerprint: &str,
        snapshot: &TrackerSnapshot,
    ) -> Result<(), AnalyticsError> {
        let json = snapshot.to_json()?;
        self.store.set(&Self::key(fingerprint), &json)
    }

    /// The stored snapshot, or None when absent or unreadable
    pub fn load(&self, fingerprint: &str) -> Option<TrackerSnapshot> {
        match self.try_load(fingerprint) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Could not load reading analytics for {}: {}", fingerprint, e);
                None
            }
        }
    }

    /// Persist `snapshot`. Returns false, after logging, if the store refused it.
    pub fn save(&mut self, fingerprint: &str, snapshot: &TrackerSnapshot) -> bool {
        match self.try_save(fingerprint, snapshot) {
            Ok(()) => {
                debug!("Saved reading analytics for {}", fingerprint);
                true
            }
            Err(e) => {
                error!("Failed to save reading analytics for {}: {}", fingerprint, e);
                false
            }
        }
    }

    pub fn remove(&mut self, fingerprint: &str) -> bool {
        match self.store.remove(&Self::key(fingerprint)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not remove reading analytics for {}: {}", fingerprint, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::index::SectionIndex;
    use crate::outline::default_sections;
    use crate::tracker::ReadingTracker;
    use chrono::{TimeZone, Utc};

    fn snapshot() -> TrackerSnapshot {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let index = SectionIndex::new(default_sections(12), 12);
        let mut tracker = ReadingTracker::new(&index, TrackerConfig::default(), start);
        tracker.record_page_change(None, 3, start);
        tracker.analytics(start + chrono::Duration::seconds(8))
    }

    #[test]
    fn test_round_trip_through_memory_store() {
        let mut store = SnapshotStore::new(MemoryStore::new());
        assert!(store.load("doc-1").is_none());

        let snapshot = snapshot();
        assert!(store.save("doc-1", &snapshot));
        assert!(store
            .store()
            .get("reading_analytics_doc-1")
            .unwrap()
            .is_some());
        assert_eq!(store.load("doc-1"), Some(snapshot));
        assert!(store.load("doc-2").is_none());

        assert!(store.remove("doc-1"));
        assert!(store.load("doc-1").is_none());
    }

    #[test]
    fn test_quota_failure_is_swallowed() {
        let mut store = SnapshotStore::new(MemoryStore::with_quota(64));
        assert!(!store.save("doc", &snapshot()));
        assert!(matches!(
            store.try_save("doc", &snapshot()),
            Err(AnalyticsError::QuotaExceeded { available: 64, .. })
        ));
        assert!(store.load("doc").is_none());
    }

    #[test]
    fn test_corrupt_record_loads_as_none() {
        let mut memory = MemoryStore::new();
        memory.set(&SnapshotStore::key("doc"), "{not json").unwrap();
        let store = SnapshotStore::new(memory);

        assert!(store.load("doc").is_none());
        assert!(matches!(store.try_load("doc"), Err(AnalyticsError::Json(_))));
    }

    #[test]
    fn test_memory_quota_counts_replaced_value_once() {
        let mut memory = MemoryStore::with_quota(10);
        memory.set("a", "12345678").unwrap();
        memory.set("a", "1234567890").unwrap();
        assert!(memory.set("b", "1").is_err());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_file_store() {
        let dir = std::env::temp_dir().join(format!("readtrace-store-{}", uuid::Uuid::new_v4()));
        let mut files = FileStore::new(&dir);

        assert_eq!(files.get("missing").unwrap(), None);
        assert_eq!(files.path_for("a/b c").file_name().unwrap(), "a_b_c.json");

        files.set("reading_analytics_x", "{}").unwrap();
        assert_eq!(files.get("reading_analytics_x").unwrap().as_deref(), Some("{}"));

        // a leftover staging file from an interrupted write is ignored and replaced
        let staging = files.path_for("reading_analytics_x").with_extension("json.tmp");
        fs::write(&staging, "{\"torn").unwrap();
        assert_eq!(files.get("reading_analytics_x").unwrap().as_deref(), Some("{}"));
        files.set("reading_analytics_x", "{\"v\":2}").unwrap();
        assert_eq!(
            files.get("reading_analytics_x").unwrap().as_deref(),
            Some("{\"v\":2}")
        );
        assert!(!staging.exists());

        let mut store = SnapshotStore::new(files.clone());
        let snapshot = snapshot();
        assert!(store.save("report", &snapshot));
        assert_eq!(store.load("report"), Some(snapshot));

        files.remove("reading_analytics_x").unwrap();
        files.remove("reading_analytics_x").unwrap();
        assert_eq!(files.get("reading_analytics_x").unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }
}
