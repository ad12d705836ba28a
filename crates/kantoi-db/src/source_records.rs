//! Database operations for the `source_records` table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kantoi_core::{ProcessingStatus, SourceRecord};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `source_records` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SourceRecordRow {
    pub id: String,
    pub caption: String,
    pub view_count: i64,
    pub share_count: i64,
    pub like_count: i64,
    pub thumbnail_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub ingest_seq: i64,
}

impl SourceRecordRow {
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if the stored status is unknown.
    pub fn into_record(self) -> Result<SourceRecord, DbError> {
        let status = ProcessingStatus::parse(&self.status)
            .ok_or_else(|| DbError::InvalidValue(format!("status '{}'", self.status)))?;
        Ok(SourceRecord {
            id: self.id,
            caption: self.caption,
            view_count: self.view_count,
            share_count: self.share_count,
            like_count: self.like_count,
            thumbnail_url: self.thumbnail_url,
            created_at: self.created_at,
            status,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}

/// Insert a source record, or refresh the metadata of an existing one.
///
/// Processing columns (`status`, `attempts`, `last_error`) are never touched
/// on conflict, so re-ingesting a dump does not requeue finished records.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_source_record(pool: &PgPool, record: &SourceRecord) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO source_records \
             (id, caption, view_count, share_count, like_count, thumbnail_url, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET \
             caption = EXCLUDED.caption, \
             view_count = EXCLUDED.view_count, \
             share_count = EXCLUDED.share_count, \
             like_count = EXCLUDED.like_count, \
             thumbnail_url = EXCLUDED.thumbnail_url, \
             created_at = EXCLUDED.created_at",
    )
    .bind(&record.id)
    .bind(&record.caption)
    .bind(record.view_count)
    .bind(record.share_count)
    .bind(record.like_count)
    .bind(record.thumbnail_url.as_deref())
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Pending source records, oldest ingested first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_source_records(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<SourceRecordRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRecordRow>(
        "SELECT \
             id, caption, view_count, share_count, like_count, thumbnail_url, \
             created_at, status, attempts, last_error, ingest_seq \
         FROM source_records \
         WHERE status = 'pending' \
         ORDER BY ingest_seq ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Set a terminal status and stamp `processed_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has this id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn mark_source_record(
    pool: &PgPool,
    id: &str,
    status: ProcessingStatus,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE source_records \
         SET status = $2, processed_at = NOW(), last_error = NULL \
         WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Count one failed attempt in a single statement.
///
/// Returns the resulting status and attempt count. The record becomes
/// `failed` once `attempts` reaches `max_attempts`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has this id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn record_source_failure(
    pool: &PgPool,
    id: &str,
    error: &str,
    max_attempts: i32,
) -> Result<(ProcessingStatus, i32), DbError> {
    let row = sqlx::query_as::<_, (String, i32)>(
        "UPDATE source_records \
         SET attempts = attempts + 1, \
             last_error = $2, \
             status = CASE WHEN attempts + 1 >= $3 THEN 'failed' ELSE status END, \
             processed_at = CASE WHEN attempts + 1 >= $3 THEN NOW() ELSE processed_at END \
         WHERE id = $1 \
         RETURNING status, attempts",
    )
    .bind(id)
    .bind(error)
    .bind(max_attempts)
    .fetch_optional(pool)
    .await?;

    let (status, attempts) = row.ok_or(DbError::NotFound)?;
    let status = ProcessingStatus::parse(&status)
        .ok_or_else(|| DbError::InvalidValue(format!("status '{status}'")))?;
    Ok((status, attempts))
}

/// Number of source records per processing status. Statuses with no
/// records are absent from the map.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_source_records_by_status(
    pool: &PgPool,
) -> Result<HashMap<ProcessingStatus, i64>, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM source_records GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(status, count)| {
            ProcessingStatus::parse(&status)
                .map(|s| (s, count))
                .ok_or_else(|| DbError::InvalidValue(format!("status '{status}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_with_unknown_status_is_rejected() {
        let row = SourceRecordRow {
            id: "v1".to_string(),
            caption: "caption".to_string(),
            view_count: 10,
            share_count: 1,
            like_count: 2,
            thumbnail_url: None,
            created_at: None,
            status: "done".to_string(),
            attempts: 0,
            last_error: None,
            ingest_seq: 1,
        };
        assert!(matches!(row.clone().into_record(), Err(DbError::InvalidValue(_))));

        let ok = SourceRecordRow {
            status: "skipped".to_string(),
            ..row
        };
        assert_eq!(ok.into_record().unwrap().status, ProcessingStatus::Skipped);
    }
}
