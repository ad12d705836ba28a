//! Offline tests for kantoi-db pool configuration and row conversion.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use kantoi_core::{AppConfig, Environment, ProcessingStatus, Topic};
use kantoi_db::{PoolConfig, SignalRow, SourceRecordRow};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        weights_path: PathBuf::from("./config/weights.yaml"),
        oracle_api_key: None,
        oracle_base_url: "http://localhost".to_string(),
        oracle_model: "gemini-test".to_string(),
        oracle_request_timeout_secs: 30,
        oracle_max_retries: 3,
        oracle_retry_backoff_base_ms: 500,
        classify_max_concurrent: 4,
        classify_batch_size: 100,
        classify_max_attempts: 3,
        brief_evidence_size: 8,
        score_cron: "0 */15 * * * *".to_string(),
        brief_cron: "0 0 6 * * *".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn signal_row_round_trips_labels() {
    let row = SignalRow {
        id: "7301".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
        sentiment: 1,
        archetype: "Urban Reformist".to_string(),
        topic: "Malay Rights".to_string(),
        specific_trigger: "quota debate".to_string(),
        is_identity_risk: true,
        is_sarcasm: false,
        summary: String::new(),
        velocity: None,
        impact_score: 1.5,
        weights_version: 1,
    };

    let signal = row.into_signal().expect("valid row");
    assert_eq!(signal.topic, Topic::MalayRights);
    assert!(signal.is_identity_risk);
    assert!(signal.velocity.is_none());
}

#[test]
fn pending_row_converts_to_pending_record() {
    let row = SourceRecordRow {
        id: "7302".to_string(),
        caption: "Harga minyak naik".to_string(),
        view_count: 12_000,
        share_count: 40,
        like_count: 900,
        thumbnail_url: Some("https://cdn.example/t.jpg".to_string()),
        created_at: None,
        status: "pending".to_string(),
        attempts: 1,
        last_error: Some("oracle returned 503".to_string()),
        ingest_seq: 9,
    };

    let record = row.into_record().expect("valid row");
    assert_eq!(record.status, ProcessingStatus::Pending);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.view_count, 12_000);
}
