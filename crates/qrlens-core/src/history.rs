//! Scan history with consecutive-duplicate suppression.
//!
//! History is most-recent-first and insertion order is the only order.
//! Every mutation is flushed to the storage collaborator immediately.

use crate::error::StorageError;
use crate::types::{PayloadKind, ScanResult};
use std::sync::{Arc, Mutex};

/// Storage collaborator for history.
pub trait HistoryStorage {
    /// Load stored history. `Ok(None)` when nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<ScanResult>>, StorageError>;

    /// Replace stored history.
    fn save(&self, history: &[ScanResult]) -> Result<(), StorageError>;
}

/// In-memory storage. Clones share the same backing data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Option<Vec<ScanResult>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds `history`.
    pub fn with_history(history: Vec<ScanResult>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(history))),
        }
    }

    /// Snapshot of the saved data.
    pub fn saved(&self) -> Option<Vec<ScanResult>> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }
}

impl HistoryStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<ScanResult>>, StorageError> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| StorageError::Other("history storage lock poisoned".to_string()))
    }

    fn save(&self, history: &[ScanResult]) -> Result<(), StorageError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StorageError::Other("history storage lock poisoned".to_string()))?;
        *guard = Some(history.to_vec());
        Ok(())
    }
}

/// What `record` did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Prepended as the new head.
    Inserted,
    /// Same content as the current head; not inserted.
    RepeatOfHead,
}

/// Per-kind counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub urls: usize,
    pub emails: usize,
    pub phones: usize,
    pub texts: usize,
}

/// Ordered scan history backed by a storage collaborator.
pub struct HistoryStore<S: HistoryStorage> {
    entries: Vec<ScanResult>,
    storage: S,
}

impl<S: HistoryStorage> HistoryStore<S> {
    /// Load history once from storage.
    ///
    /// Missing or corrupt data degrades to an empty history.
    pub fn load(storage: S) -> Self {
        let mut entries = match storage.load() {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Discarding unreadable scan history: {}", e);
                Vec::new()
            }
        };

        let before = entries.len();
        entries.dedup_by(|a, b| a.content == b.content);
        if entries.len() != before {
            tracing::debug!(
                "Collapsed {} consecutive duplicate history entries",
                before - entries.len()
            );
        }

        tracing::info!("Loaded {} history entries", entries.len());
        Self { entries, storage }
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> &[ScanResult] {
        &self.entries
    }

    /// Most recent entry.
    pub fn head(&self) -> Option<&ScanResult> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by id.
    pub fn find(&self, id: &str) -> Option<&ScanResult> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// True when `content` equals the current head.
    pub fn repeats_head(&self, content: &str) -> bool {
        self.head().is_some_and(|h| h.content == content)
    }

    /// Prepend a result unless it repeats the current head.
    pub fn record(&mut self, result: ScanResult) -> RecordOutcome {
        if self.repeats_head(&result.content) {
            return RecordOutcome::RepeatOfHead;
        }
        self.entries.insert(0, result);
        self.flush_logged();
        RecordOutcome::Inserted
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.flush_logged();
        tracing::info!("Scan history cleared");
    }

    /// Write the current entries to storage.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.storage.save(&self.entries)
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to persist scan history: {}", e);
        }
    }

    /// Count entries per payload kind.
    pub fn stats(&self) -> HistoryStats {
        self.entries
            .iter()
            .fold(HistoryStats::default(), |mut stats, entry| {
                stats.total += 1;
                match entry.kind {
                    PayloadKind::Url => stats.urls += 1,
                    PayloadKind::Email => stats.emails += 1,
                    PayloadKind::Phone => stats.phones += 1,
                    PayloadKind::Text => stats.texts += 1,
                }
                stats
            })
    }

    /// Borrow the storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::classify::classify;
    use chrono::Utc;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_never_two_consecutive_equal(seq in prop::collection::vec("[abc]", 0..60)) {
            let mut store = HistoryStore::load(MemoryStorage::new());
            for content in &seq {
                store.record(ScanResult::new(content.clone(), classify(content), Utc::now()));
            }
            for pair in store.entries().windows(2) {
                prop_assert_ne!(&pair[0].content, &pair[1].content);
            }
            if let Some(last) = seq.last() {
                prop_assert_eq!(&store.head().unwrap().content, last);
            }
        }
    }
}
