use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, TimeZone};
use kantoi_core::{Archetype, MemoryStore, ProcessingStatus, Sentiment, Signal, Topic, WeightTable};

use super::*;
use crate::aggregate::Delta;

enum Reply {
    Text(&'static str),
    Status(u16),
}

/// Oracle that answers by looking for a marker in the prompt.
struct ScriptedOracle {
    script: Vec<(&'static str, Reply)>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    fn new(script: Vec<(&'static str, Reply)>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextOracle for ScriptedOracle {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, SentimentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.iter().find(|(marker, _)| prompt.contains(marker)) {
            Some((_, Reply::Text(text))) => Ok((*text).to_string()),
            Some((_, Reply::Status(status))) => Err(SentimentError::Oracle {
                status: *status,
                message: "scripted failure".to_string(),
            }),
            None => Err(SentimentError::EmptyReply),
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap()
}

fn record(id: &str, caption: &str) -> SourceRecord {
    let mut r = SourceRecord::new(id, caption);
    r.view_count = 1_000;
    r.created_at = Some(now() - Duration::hours(2));
    r
}

fn scorer() -> ImpactScorer {
    ImpactScorer::new(WeightTable::default())
}

fn options() -> BatchOptions {
    BatchOptions {
        limit: 50,
        max_concurrent: 2,
        max_attempts: 3,
    }
}

const DIESEL_REPLY: &str = r#"{"sentiment": -1, "archetype": "Heartland Conservative", "topic": "Cost of Living", "specific_trigger": "diesel subsidy cut", "is_identity_risk": false, "summary": "Fishermen hurt by subsidy cut."}"#;
const AID_REPLY: &str = "```json\n{\"sentiment\": 1, \"persona\": \"Economic Pragmatist\", \"domain\": \"Economy\", \"specific_trigger\": \"cash aid\"}\n```";
const ODD_REPLY: &str = r#"{"sentiment": 1, "archetype": "Weekend Philosopher", "topic": "Weather"}"#;

async fn seeded(records: &[SourceRecord]) -> MemoryStore {
    let store = MemoryStore::new();
    for r in records {
        store.upsert_source(r).await.unwrap();
    }
    store
}

#[tokio::test]
async fn batch_scores_skips_and_marks_records() {
    let store = seeded(&[
        record("v1", "Why disturb the diesel subsidy? Fishermen suffer."),
        record("v2", "Thank you PM for the cash aid before Raya."),
        record("v3", " ok  "),
        record("v4", "Strange caption about nothing"),
    ])
    .await;
    let oracle = ScriptedOracle::new(vec![
        ("diesel", Reply::Text(DIESEL_REPLY)),
        ("cash aid", Reply::Text(AID_REPLY)),
        ("Strange", Reply::Text(ODD_REPLY)),
    ]);

    let report = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap();

    assert_eq!(report.listed, 4);
    assert_eq!(report.scored, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.retrying, 0);
    assert_eq!(report.fallbacks, 2, "unknown archetype and topic");
    assert_eq!(oracle.calls(), 3, "short caption never reaches the oracle");

    assert_eq!(store.signal_count().unwrap(), 3);
    assert_eq!(
        store.source("v3").unwrap().unwrap().status,
        ProcessingStatus::Skipped
    );
    assert_eq!(
        store.source("v1").unwrap().unwrap().status,
        ProcessingStatus::Processed
    );

    let window = Window::trailing(now(), Duration::days(1));
    let signals = store
        .query_signals(&window, &SignalFilter::default())
        .await
        .unwrap();
    let diesel = signals.iter().find(|s| s.id == "v1").unwrap();
    assert_eq!(diesel.sentiment, Sentiment::Negative);
    assert_eq!(diesel.archetype, Archetype::HeartlandConservative);
    assert!((diesel.impact_score - (-2.5)).abs() < f64::EPSILON);
    assert_eq!(diesel.timestamp, now() - Duration::hours(2));

    let odd = signals.iter().find(|s| s.id == "v4").unwrap();
    assert_eq!(odd.archetype, Archetype::DigitalCynic);
    assert_eq!(odd.topic, Topic::Uncategorized);

    let again = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap();
    assert_eq!(again.listed, 0);
    assert_eq!(oracle.calls(), 3);
}

#[tokio::test]
async fn malformed_replies_retry_until_failed() {
    let store = seeded(&[record("v1", "Harga beras naik lagi minggu ini")]).await;
    let oracle = ScriptedOracle::new(vec![("beras", Reply::Text("I would say negative."))]);

    for expected_attempts in 1..=2 {
        let report = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
            .await
            .unwrap();
        assert_eq!(report.retrying, 1);
        let stored = store.source("v1").unwrap().unwrap();
        assert_eq!(stored.status, ProcessingStatus::Pending);
        assert_eq!(stored.attempts, expected_attempts);
        assert!(stored.last_error.unwrap().contains("malformed"));
    }

    let report = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(
        store.source("v1").unwrap().unwrap().status,
        ProcessingStatus::Failed
    );
    assert_eq!(store.signal_count().unwrap(), 0);

    let report = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap();
    assert_eq!(report.listed, 0, "failed records are not retried");
}

#[tokio::test]
async fn oracle_errors_count_as_attempts() {
    let store = seeded(&[record("v1", "Rasuah lagi, SPRM diam sahaja")]).await;
    let oracle = ScriptedOracle::new(vec![("Rasuah", Reply::Status(400))]);
    let report = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap();
    assert_eq!(report.retrying, 1);
    assert_eq!(store.source("v1").unwrap().unwrap().attempts, 1);
}

#[tokio::test]
async fn rerun_after_partial_write_does_not_double_count() {
    let store = seeded(&[record("v1", "Why disturb the diesel subsidy? Fishermen suffer.")]).await;
    let oracle = ScriptedOracle::new(vec![("diesel", Reply::Text(DIESEL_REPLY))]);

    // Simulate a crash after the signal write but before mark-processed.
    let outcome = classify_record(&oracle, &scorer(), &record("v1", "diesel subsidy again"), now())
        .await
        .unwrap();
    let RecordOutcome::Scored(scored) = outcome else {
        panic!("expected a scored record");
    };
    store.upsert_signal(&scored.signal).await.unwrap();
    assert_eq!(store.signal_count().unwrap(), 1);

    let report = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap();
    assert_eq!(report.scored, 1);
    assert_eq!(store.signal_count().unwrap(), 1, "same id is upserted, not duplicated");
    assert_eq!(
        store.source("v1").unwrap().unwrap().status,
        ProcessingStatus::Processed
    );
}

#[tokio::test]
async fn store_outage_aborts_the_batch() {
    let store = seeded(&[record("v1", "Why disturb the diesel subsidy?")]).await;
    store.set_offline(true);
    let oracle = ScriptedOracle::new(vec![]);
    let err = run_scoring_batch(&store, &oracle, &scorer(), options(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, SentimentError::Store(StoreError::Unavailable(_))));
    assert_eq!(oracle.calls(), 0);
}

fn stored_signal(id: &str, hours_ago: i64, impact: f64) -> Signal {
    Signal {
        id: id.to_string(),
        timestamp: now() - Duration::hours(hours_ago),
        sentiment: Sentiment::from_continuous(impact),
        archetype: Archetype::UrbanReformist,
        topic: Topic::Reform,
        specific_trigger: format!("trigger {id}"),
        is_identity_risk: false,
        is_sarcasm: false,
        summary: format!("summary {id}"),
        velocity: None,
        impact_score: impact,
        weights_version: 1,
    }
}

#[tokio::test]
async fn brief_is_not_generated_for_an_empty_day() {
    let store = MemoryStore::new();
    let oracle = ScriptedOracle::new(vec![]);
    let brief = generate_default_brief(&store, &oracle, now()).await.unwrap();
    assert!(brief.is_none());
    assert_eq!(oracle.calls(), 0);
    assert!(get_latest_brief(&store).await.unwrap().is_none());
}

#[tokio::test]
async fn brief_combines_context_evidence_and_reply() {
    let store = MemoryStore::new();
    for s in [
        stored_signal("today-neg", 1, -2.5),
        stored_signal("today-pos", 3, 1.5),
        stored_signal("yesterday", 30, -1.0),
        stored_signal("last-week", 7 * 24 + 6, 2.0),
    ] {
        store.upsert_signal(&s).await.unwrap();
    }
    let oracle = ScriptedOracle::new(vec![(
        "TELEMETRY",
        Reply::Text(r#"{"headline": "Diesel Anxiety Real", "public_narrative": "The rhetoric says recovery.", "key_driver": "diesel"}"#),
    )]);

    let brief = generate_brief(&store, &oracle, 8, now())
        .await
        .unwrap()
        .expect("brief");

    assert!((brief.window_score - (-0.5)).abs() < f64::EPSILON);
    assert_eq!(brief.day_delta, Some(0.5));
    assert_eq!(brief.week_delta, Some(-2.5));
    assert_eq!(brief.headline, "Diesel Anxiety Real");
    assert_eq!(brief.private_memo, "");
    assert_eq!(brief.top_negative.len(), 1);
    assert_eq!(brief.top_positive.len(), 1);
    assert_eq!(brief.top_negative[0].id, "today-neg");

    let latest = get_latest_brief(&store).await.unwrap().unwrap();
    assert_eq!(latest, brief);
}

#[tokio::test]
async fn malformed_brief_reply_is_a_hard_failure() {
    let store = MemoryStore::new();
    store
        .upsert_signal(&stored_signal("a", 1, -1.0))
        .await
        .unwrap();
    let oracle = ScriptedOracle::new(vec![("TELEMETRY", Reply::Text("Here is your brief!"))]);
    let err = generate_default_brief(&store, &oracle, now())
        .await
        .unwrap_err();
    assert!(matches!(err, SentimentError::MalformedOracleOutput(_)));
    assert!(get_latest_brief(&store).await.unwrap().is_none());
}

#[tokio::test]
async fn metrics_report_compares_with_previous_window() {
    let store = MemoryStore::new();
    for s in [
        stored_signal("a", 1, -1.0),
        stored_signal("b", 2, 3.0),
        stored_signal("c", 30, 1.0),
    ] {
        store.upsert_signal(&s).await.unwrap();
    }

    let report = get_metrics_report(&store, WindowPreset::Day, now())
        .await
        .unwrap();
    assert_eq!(report.current.count, 2);
    assert_eq!(report.previous_count, 1);
    assert_eq!(report.deltas.consensus, Delta::Change(-25.0));

    let empty = get_metrics_report(&store, WindowPreset::Day, now() - Duration::days(5))
        .await
        .unwrap();
    assert_eq!(empty.current.count, 0);
    assert_eq!(empty.deltas.mean_impact, Delta::NoBaseline);
}
