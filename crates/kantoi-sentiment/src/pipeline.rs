//! Scoring and brief orchestration.
//!
//! This is the only part of the crate that performs I/O: it reads pending
//! source records, asks the oracle to classify them, writes signals, and
//! produces briefs. All arithmetic is delegated to the pure modules.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use kantoi_core::{
    AppConfig, Brief, FailureState, SignalFilter, SignalStore, SourceOutcome, SourceRecord,
    StoreError, Window, WindowPreset,
};
use serde::Serialize;

use crate::aggregate::{compare, window_metrics, MetricDeltas, WindowMetrics};
use crate::brief::{
    assemble_brief, build_context, build_prompt, repair_reply, select_evidence, BriefWindows,
    DEFAULT_EVIDENCE_SIZE,
};
use crate::error::SentimentError;
use crate::oracle::{classification_prompt, TextOracle, BRIEF_TEMPERATURE, CLASSIFY_TEMPERATURE};
use crate::scorer::{ImpactScorer, ScoredSignal};
use crate::validator::RawClassification;

/// Captions with fewer non-whitespace characters than this are skipped.
pub const MIN_CAPTION_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum pending records taken per batch.
    pub limit: usize,
    /// Concurrent oracle requests.
    pub max_concurrent: usize,
    /// Attempts before a record is marked failed.
    pub max_attempts: i32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            max_concurrent: 4,
            max_attempts: 3,
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            limit: config.classify_batch_size,
            max_concurrent: config.classify_max_concurrent,
            max_attempts: config.classify_max_attempts,
        }
    }
}

/// Counts for one scoring batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub listed: usize,
    pub scored: usize,
    pub skipped: usize,
    /// Failed this time, will be retried.
    pub retrying: usize,
    /// Reached the attempt limit.
    pub failed: usize,
    /// Label fallbacks taken across all scored records.
    pub fallbacks: usize,
}

/// Result of classifying one source record, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Scored(ScoredSignal),
    /// Caption too short to classify; no signal.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordResult {
    Scored { fallbacks: usize },
    Skipped,
    Retrying,
    Failed,
}

fn caption_is_classifiable(caption: &str) -> bool {
    caption.chars().filter(|c| !c.is_whitespace()).count() >= MIN_CAPTION_CHARS
}

/// Classify and score one record without touching the store.
///
/// # Errors
///
/// Returns the oracle's error, or [`SentimentError::MalformedOracleOutput`]
/// if its reply is not a JSON object.
pub async fn classify_record<O: TextOracle>(
    oracle: &O,
    scorer: &ImpactScorer,
    record: &SourceRecord,
    now: DateTime<Utc>,
) -> Result<RecordOutcome, SentimentError> {
    if !caption_is_classifiable(&record.caption) {
        return Ok(RecordOutcome::Skipped);
    }
    let reply = oracle
        .generate(&classification_prompt(&record.caption), CLASSIFY_TEMPERATURE)
        .await?;
    let raw = RawClassification::parse(&reply)?;
    let ctx = scorer.context_for(record, now);
    Ok(RecordOutcome::Scored(scorer.score(&raw, &ctx)))
}

async fn process_record<S, O>(
    store: &S,
    oracle: &O,
    scorer: &ImpactScorer,
    record: SourceRecord,
    max_attempts: i32,
    now: DateTime<Utc>,
) -> Result<RecordResult, StoreError>
where
    S: SignalStore,
    O: TextOracle,
{
    match classify_record(oracle, scorer, &record, now).await {
        Ok(RecordOutcome::Scored(scored)) => {
            // Signal first: a crash between the two writes leaves the record
            // pending and the re-run upserts the same id.
            store.upsert_signal(&scored.signal).await?;
            store
                .mark_processed(&record.id, SourceOutcome::Processed)
                .await?;
            tracing::debug!(
                id = %record.id,
                impact = scored.signal.impact_score,
                "signal scored"
            );
            Ok(RecordResult::Scored {
                fallbacks: scored.report.fallbacks.len(),
            })
        }
        Ok(RecordOutcome::Skipped) => {
            store
                .mark_processed(&record.id, SourceOutcome::Skipped)
                .await?;
            tracing::debug!(id = %record.id, "caption too short, skipped");
            Ok(RecordResult::Skipped)
        }
        Err(SentimentError::Store(e)) => Err(e),
        Err(e) => {
            let state = store
                .record_failure(&record.id, &e.to_string(), max_attempts)
                .await?;
            match state {
                FailureState::Retrying { attempts } => {
                    tracing::warn!(id = %record.id, attempts, error = %e, "classification failed, will retry");
                    Ok(RecordResult::Retrying)
                }
                FailureState::GaveUp { attempts } => {
                    tracing::error!(id = %record.id, attempts, error = %e, "classification failed permanently");
                    Ok(RecordResult::Failed)
                }
            }
        }
    }
}

/// Score up to `options.limit` pending source records.
///
/// Records are classified concurrently (bounded by
/// `options.max_concurrent`). Oracle and parse failures are counted against
/// the record and never abort the batch; store failures do.
///
/// # Errors
///
/// Returns [`SentimentError::Store`] if the store fails.
pub async fn run_scoring_batch<S, O>(
    store: &S,
    oracle: &O,
    scorer: &ImpactScorer,
    options: BatchOptions,
    now: DateTime<Utc>,
) -> Result<BatchReport, SentimentError>
where
    S: SignalStore,
    O: TextOracle,
{
    let records = store.list_unprocessed(options.limit).await?;
    let mut report = BatchReport {
        listed: records.len(),
        ..BatchReport::default()
    };
    if records.is_empty() {
        tracing::info!("no pending source records");
        return Ok(report);
    }

    let results: Vec<Result<RecordResult, StoreError>> = stream::iter(records)
        .map(|record| process_record(store, oracle, scorer, record, options.max_attempts, now))
        .buffer_unordered(options.max_concurrent.max(1))
        .collect()
        .await;

    for result in results {
        match result? {
            RecordResult::Scored { fallbacks } => {
                report.scored += 1;
                report.fallbacks += fallbacks;
            }
            RecordResult::Skipped => report.skipped += 1,
            RecordResult::Retrying => report.retrying += 1,
            RecordResult::Failed => report.failed += 1,
        }
    }

    tracing::info!(
        listed = report.listed,
        scored = report.scored,
        skipped = report.skipped,
        retrying = report.retrying,
        failed = report.failed,
        fallbacks = report.fallbacks,
        weights_version = scorer.version(),
        "scoring batch complete"
    );
    Ok(report)
}

/// Generate, store and return a brief for the 24 hours ending at `now`.
///
/// Returns `Ok(None)` without calling the oracle when the current window
/// has no signals.
///
/// # Errors
///
/// Returns [`SentimentError`] if the store or oracle fails, or if the
/// oracle's reply is not JSON after one fence-stripping retry.
pub async fn generate_brief<S, O>(
    store: &S,
    oracle: &O,
    evidence_size: usize,
    now: DateTime<Utc>,
) -> Result<Option<Brief>, SentimentError>
where
    S: SignalStore,
    O: TextOracle,
{
    let windows = BriefWindows::ending(now);
    let all = SignalFilter::default();
    let current = store.query_signals(&windows.current, &all).await?;
    if current.is_empty() {
        tracing::info!("no signals in the last 24h, brief not generated");
        return Ok(None);
    }
    let yesterday = store.query_signals(&windows.yesterday, &all).await?;
    let last_week = store.query_signals(&windows.last_week, &all).await?;

    let ctx = build_context(now, &current, &yesterday, &last_week);
    let evidence = select_evidence(&current, evidence_size);
    let prompt = build_prompt(&ctx, &evidence);

    let text = oracle.generate(&prompt, BRIEF_TEMPERATURE).await?;
    let reply = repair_reply(&text)?;
    let brief = assemble_brief(&ctx, evidence, reply);
    store.insert_brief(&brief).await?;

    tracing::info!(
        headline = %brief.headline,
        window_score = brief.window_score,
        signals = ctx.signal_count,
        "brief generated"
    );
    Ok(Some(brief))
}

/// [`generate_brief`] with the default evidence size.
///
/// # Errors
///
/// See [`generate_brief`].
pub async fn generate_default_brief<S, O>(
    store: &S,
    oracle: &O,
    now: DateTime<Utc>,
) -> Result<Option<Brief>, SentimentError>
where
    S: SignalStore,
    O: TextOracle,
{
    generate_brief(store, oracle, DEFAULT_EVIDENCE_SIZE, now).await
}

/// Query a window and compute its dashboard metrics.
///
/// # Errors
///
/// Returns [`StoreError`] if the query fails. An empty window is not an error.
pub async fn get_window_metrics<S: SignalStore>(
    store: &S,
    window: &Window,
) -> Result<WindowMetrics, StoreError> {
    let signals = store
        .query_signals(window, &SignalFilter::default())
        .await?;
    Ok(window_metrics(window, &signals))
}

/// Metrics for a preset window plus deltas against the window before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub preset: WindowPreset,
    pub current: WindowMetrics,
    pub previous_count: usize,
    pub deltas: MetricDeltas,
}

/// # Errors
///
/// Returns [`StoreError`] if either query fails.
pub async fn get_metrics_report<S: SignalStore>(
    store: &S,
    preset: WindowPreset,
    now: DateTime<Utc>,
) -> Result<MetricsReport, StoreError> {
    let window = preset.window_ending(now);
    let current = get_window_metrics(store, &window).await?;
    let previous = get_window_metrics(store, &window.previous()).await?;
    Ok(MetricsReport {
        preset,
        deltas: compare(&current, &previous),
        previous_count: previous.count,
        current,
    })
}

/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn get_latest_brief<S: SignalStore>(store: &S) -> Result<Option<Brief>, StoreError> {
    store.latest_brief().await
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
