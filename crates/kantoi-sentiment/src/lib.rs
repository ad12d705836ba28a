//! Classification, scoring and aggregation for the trust monitor.
//!
//! Raw captions are classified by a text-generation oracle, forced onto the
//! closed taxonomy, weighted into impact scores and stored as signals.
//! Window statistics and the daily brief are computed from stored signals.

pub mod aggregate;
pub mod brief;
pub mod error;
pub mod ingest;
pub mod oracle;
pub mod pipeline;
pub mod scorer;
pub mod validator;

mod retry;

pub use aggregate::{window_metrics, Delta, Metric, WindowMetrics};
pub use error::SentimentError;
pub use ingest::{ingest_records, parse_source_dump};
pub use oracle::{GeminiClient, GeminiConfig, TextOracle};
pub use pipeline::{
    classify_record, generate_brief, get_latest_brief, get_metrics_report, get_window_metrics,
    run_scoring_batch, BatchOptions, BatchReport, MetricsReport, RecordOutcome,
};
pub use scorer::{ImpactScorer, ScoreContext, ScoredSignal};
pub use validator::{RawClassification, ValidatedClassification, ValidationReport};
