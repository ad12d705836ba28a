//! Mapping of scraper dataset dumps onto [`SourceRecord`]s.
//!
//! Dumps are the JSON arrays a video-search actor writes to its dataset.
//! Only the fields the pipeline needs are read; everything else is ignored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kantoi_core::{SignalStore, SourceRecord, StoreError};
use serde_json::Value;

use crate::error::SentimentError;

fn id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_of(item: &Value, key: &str) -> i64 {
    match item.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                n.as_f64().map(|f| f as i64)
            })
            .unwrap_or(0)
            .max(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0).max(0),
        _ => 0,
    }
}

fn created_at_of(item: &Value) -> Option<DateTime<Utc>> {
    let raw = item.get("createTimeISO")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Map one dataset item. Items without a usable id yield `None`.
#[must_use]
pub fn map_item(item: &Value) -> Option<SourceRecord> {
    let id = id_of(item)?;
    let caption = item
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut record = SourceRecord::new(id, caption);
    record.view_count = count_of(item, "playCount");
    record.share_count = count_of(item, "shareCount");
    record.like_count = count_of(item, "diggCount");
    record.created_at = created_at_of(item);
    record.thumbnail_url = item
        .get("videoMeta")
        .and_then(|m| m.get("coverUrl"))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    Some(record)
}

/// Parse a dataset dump.
///
/// Duplicate ids collapse to the last occurrence, kept at the position of
/// the first.
///
/// # Errors
///
/// Returns [`SentimentError::InvalidDump`] if the text is not JSON or is not
/// an array or object.
pub fn parse_source_dump(text: &str) -> Result<Vec<SourceRecord>, SentimentError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| SentimentError::InvalidDump(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => {
            return Err(SentimentError::InvalidDump(
                "expected a JSON array of items".to_string(),
            ))
        }
    };

    let mut records: Vec<SourceRecord> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;
    for item in &items {
        let Some(record) = map_item(item) else {
            skipped += 1;
            continue;
        };
        match positions.get(&record.id) {
            Some(&i) => records[i] = record,
            None => {
                positions.insert(record.id.clone(), records.len());
                records.push(record);
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "dump items without an id were skipped");
    }
    Ok(records)
}

/// Upsert every record. Existing ids keep their processing status.
///
/// # Errors
///
/// Returns [`StoreError`] on the first failed write.
pub async fn ingest_records<S: SignalStore>(
    store: &S,
    records: &[SourceRecord],
) -> Result<usize, StoreError> {
    for record in records {
        store.upsert_source(record).await?;
    }
    tracing::info!(count = records.len(), "source records ingested");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use kantoi_core::{MemoryStore, ProcessingStatus, SourceOutcome};

    use super::*;

    const DUMP: &str = r#"[
        {
            "id": "7351234567890",
            "text": "Harga diesel naik, nelayan menderita #malaysia",
            "playCount": 120500,
            "shareCount": 310,
            "diggCount": 8800,
            "createTimeISO": "2026-03-09T14:30:00.000Z",
            "videoMeta": { "coverUrl": "https://cdn.example.com/cover.jpg", "duration": 31 }
        },
        { "id": 7351234567891, "text": "Rasuah lagi?", "playCount": "42" },
        { "text": "no id here" },
        { "id": "", "text": "blank id" },
        { "id": "7351234567890", "text": "updated caption", "playCount": 130000 }
    ]"#;

    #[test]
    fn maps_scraper_fields() {
        let records = parse_source_dump(DUMP).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "7351234567890");
        assert_eq!(first.caption, "updated caption", "last duplicate wins");
        assert_eq!(first.view_count, 130_000);
        assert_eq!(first.status, ProcessingStatus::Pending);

        let second = &records[1];
        assert_eq!(second.id, "7351234567891", "numeric ids are stringified");
        assert_eq!(second.view_count, 42);
        assert!(second.created_at.is_none());
        assert!(second.thumbnail_url.is_none());
    }

    #[test]
    fn maps_nested_cover_and_publish_time() {
        let item: Value = serde_json::from_str(DUMP).unwrap();
        let record = map_item(&item[0]).unwrap();
        assert_eq!(record.like_count, 8_800);
        assert_eq!(record.share_count, 310);
        assert_eq!(
            record.thumbnail_url.as_deref(),
            Some("https://cdn.example.com/cover.jpg")
        );
        assert_eq!(
            record.created_at.unwrap().to_rfc3339(),
            "2026-03-09T14:30:00+00:00"
        );
    }

    #[test]
    fn rejects_non_json_and_scalars() {
        assert!(matches!(
            parse_source_dump("not json"),
            Err(SentimentError::InvalidDump(_))
        ));
        assert!(matches!(
            parse_source_dump("42"),
            Err(SentimentError::InvalidDump(_))
        ));
        assert!(parse_source_dump("[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn reingest_does_not_reset_processing_state() {
        let store = MemoryStore::new();
        let records = parse_source_dump(DUMP).unwrap();
        ingest_records(&store, &records).await.unwrap();
        store
            .mark_processed("7351234567890", SourceOutcome::Processed)
            .await
            .unwrap();

        ingest_records(&store, &records).await.unwrap();
        let stored = store.source("7351234567890").unwrap().unwrap();
        assert_eq!(stored.status, ProcessingStatus::Processed);

        let pending = store.list_unprocessed(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "7351234567891");
    }
}
