//! Persistence contract for signals, source records and briefs.
//!
//! Aggregation never talks to a store directly; callers query a window and
//! hand the materialised signals to the pure functions. A failed query is a
//! [`StoreError`], an empty window is an empty `Vec`, and the two are never
//! conflated.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;

use crate::signal::{Brief, ProcessingStatus, Signal, SourceRecord};
use crate::taxonomy::{Archetype, Topic};
use crate::window::Window;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("source record not found: {0}")]
    SourceNotFound(String),
    #[error("corrupt stored record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Optional narrowing of a window query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalFilter {
    pub topic: Option<Topic>,
    pub archetype: Option<Archetype>,
    pub limit: Option<usize>,
}

impl SignalFilter {
    #[must_use]
    pub fn matches(&self, signal: &Signal) -> bool {
        self.topic.is_none_or(|t| signal.topic == t)
            && self.archetype.is_none_or(|a| signal.archetype == a)
    }
}

/// Terminal outcome for a source record that was handled successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// A signal with the record's id was written.
    Processed,
    /// Nothing worth classifying; explicitly skipped with no signal.
    Skipped,
}

impl SourceOutcome {
    #[must_use]
    pub fn status(self) -> ProcessingStatus {
        match self {
            SourceOutcome::Processed => ProcessingStatus::Processed,
            SourceOutcome::Skipped => ProcessingStatus::Skipped,
        }
    }
}

/// State of a source record after a failed attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureState {
    /// Still pending; will be retried on the next batch.
    Retrying { attempts: i32 },
    /// Reached the attempt limit and will not be retried.
    GaveUp { attempts: i32 },
}

/// Append-only store of classified signals plus ingestion bookkeeping.
///
/// Implementations must make [`SignalStore::upsert_signal`] atomic per id and
/// resolve concurrent writers to the same id by timestamp (last write wins).
pub trait SignalStore: Send + Sync {
    /// Insert a signal, or replace the existing row with the same id.
    fn upsert_signal(&self, signal: &Signal)
        -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Signals with `window.start <= timestamp < window.end`, newest first.
    fn query_signals(
        &self,
        window: &Window,
        filter: &SignalFilter,
    ) -> impl Future<Output = Result<Vec<Signal>, StoreError>> + Send;

    /// Insert a source record or refresh its metadata. Processing state of an
    /// existing record is preserved.
    fn upsert_source(
        &self,
        record: &SourceRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Pending source records, oldest ingested first.
    fn list_unprocessed(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SourceRecord>, StoreError>> + Send;

    fn mark_processed(
        &self,
        id: &str,
        outcome: SourceOutcome,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Count one failed attempt. At `max_attempts` the record is marked
    /// failed permanently.
    fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_attempts: i32,
    ) -> impl Future<Output = Result<FailureState, StoreError>> + Send;

    fn insert_brief(&self, brief: &Brief) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn latest_brief(&self) -> impl Future<Output = Result<Option<Brief>, StoreError>> + Send;

    fn source_status_counts(
        &self,
    ) -> impl Future<Output = Result<HashMap<ProcessingStatus, i64>, StoreError>> + Send;
}
