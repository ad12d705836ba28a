//! In-process [`SignalStore`] used by tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::signal::{Brief, ProcessingStatus, Signal, SourceRecord};
use crate::store::{FailureState, SignalFilter, SignalStore, SourceOutcome, StoreError};
use crate::window::Window;

#[derive(Default)]
struct Inner {
    signals: HashMap<String, Signal>,
    /// Source records with their ingestion sequence number.
    sources: HashMap<String, (u64, SourceRecord)>,
    next_seq: u64,
    briefs: Vec<Brief>,
}

/// Mutex-guarded maps. Each operation takes the lock once, so every upsert
/// is atomic per id.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of distinct signal ids held.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store is offline.
    pub fn signal_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.signals.len())
    }

    /// Current state of one source record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store is offline.
    pub fn source(&self, id: &str) -> Result<Option<SourceRecord>, StoreError> {
        Ok(self.lock()?.sources.get(id).map(|(_, r)| r.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl SignalStore for MemoryStore {
    async fn upsert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let stale = inner
            .signals
            .get(&signal.id)
            .is_some_and(|existing| existing.timestamp > signal.timestamp);
        if stale {
            tracing::debug!(id = %signal.id, "stale signal write ignored");
        } else {
            inner.signals.insert(signal.id.clone(), signal.clone());
        }
        Ok(())
    }

    async fn query_signals(
        &self,
        window: &Window,
        filter: &SignalFilter,
    ) -> Result<Vec<Signal>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Signal> = inner
            .signals
            .values()
            .filter(|s| window.contains(s.timestamp) && filter.matches(s))
            .cloned()
            .collect();
        drop(inner);

        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn upsert_source(&self, record: &SourceRecord) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if let Some((_, existing)) = inner.sources.get_mut(&record.id) {
            existing.caption.clone_from(&record.caption);
            existing.view_count = record.view_count;
            existing.share_count = record.share_count;
            existing.like_count = record.like_count;
            existing.thumbnail_url.clone_from(&record.thumbnail_url);
            existing.created_at = record.created_at;
        } else {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let mut fresh = record.clone();
            fresh.status = ProcessingStatus::Pending;
            fresh.attempts = 0;
            fresh.last_error = None;
            inner.sources.insert(record.id.clone(), (seq, fresh));
        }
        Ok(())
    }

    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<SourceRecord>, StoreError> {
        let inner = self.lock()?;
        let mut pending: Vec<&(u64, SourceRecord)> = inner
            .sources
            .values()
            .filter(|(_, r)| r.status == ProcessingStatus::Pending)
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);
        Ok(pending
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn mark_processed(&self, id: &str, outcome: SourceOutcome) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let (_, record) = inner
            .sources
            .get_mut(id)
            .ok_or_else(|| StoreError::SourceNotFound(id.to_string()))?;
        record.status = outcome.status();
        record.last_error = None;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_attempts: i32,
    ) -> Result<FailureState, StoreError> {
        let mut inner = self.lock()?;
        let (_, record) = inner
            .sources
            .get_mut(id)
            .ok_or_else(|| StoreError::SourceNotFound(id.to_string()))?;
        record.attempts += 1;
        record.last_error = Some(error.to_string());
        if record.attempts >= max_attempts {
            record.status = ProcessingStatus::Failed;
            Ok(FailureState::GaveUp {
                attempts: record.attempts,
            })
        } else {
            Ok(FailureState::Retrying {
                attempts: record.attempts,
            })
        }
    }

    async fn insert_brief(&self, brief: &Brief) -> Result<(), StoreError> {
        self.lock()?.briefs.push(brief.clone());
        Ok(())
    }

    async fn latest_brief(&self) -> Result<Option<Brief>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .briefs
            .iter()
            .max_by_key(|b| b.generated_at)
            .cloned())
    }

    async fn source_status_counts(&self) -> Result<HashMap<ProcessingStatus, i64>, StoreError> {
        let inner = self.lock()?;
        let mut counts = HashMap::new();
        for (_, record) in inner.sources.values() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
