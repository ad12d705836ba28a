//! [`SignalStore`] backed by Postgres.

use std::collections::HashMap;

use kantoi_core::{
    Brief, FailureState, ProcessingStatus, Signal, SignalFilter, SignalStore, SourceOutcome,
    SourceRecord, StoreError, Window,
};
use sqlx::PgPool;

use crate::signals::SignalQuery;
use crate::{briefs, signals, source_records, DbError};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_error(id: &str, err: DbError) -> StoreError {
    match err {
        DbError::NotFound => StoreError::SourceNotFound(id.to_string()),
        DbError::InvalidValue(reason) => StoreError::Corrupt {
            id: id.to_string(),
            reason,
        },
        DbError::Json(e) => StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        },
        DbError::Sqlx(e) => StoreError::Unavailable(e.to_string()),
        DbError::Migration(e) => StoreError::Unavailable(e.to_string()),
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl SignalStore for PgStore {
    async fn upsert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        let written = signals::upsert_signal(&self.pool, signal)
            .await
            .map_err(|e| store_error(&signal.id, e))?;
        if !written {
            tracing::debug!(id = %signal.id, "stale signal write ignored");
        }
        Ok(())
    }

    async fn query_signals(
        &self,
        window: &Window,
        filter: &SignalFilter,
    ) -> Result<Vec<Signal>, StoreError> {
        let query = SignalQuery {
            topic: filter.topic.map(|t| t.as_str()),
            archetype: filter.archetype.map(|a| a.as_str()),
            limit: filter.limit.map(clamp_limit),
        };
        let rows = signals::list_signals_in_window(&self.pool, window.start, window.end, query)
            .await
            .map_err(|e| store_error("signals", e))?;
        rows.into_iter()
            .map(|row| {
                let id = row.id.clone();
                row.into_signal().map_err(|e| store_error(&id, e))
            })
            .collect()
    }

    async fn upsert_source(&self, record: &SourceRecord) -> Result<(), StoreError> {
        source_records::upsert_source_record(&self.pool, record)
            .await
            .map_err(|e| store_error(&record.id, e))
    }

    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<SourceRecord>, StoreError> {
        let rows = source_records::list_pending_source_records(&self.pool, clamp_limit(limit))
            .await
            .map_err(|e| store_error("source_records", e))?;
        rows.into_iter()
            .map(|row| {
                let id = row.id.clone();
                row.into_record().map_err(|e| store_error(&id, e))
            })
            .collect()
    }

    async fn mark_processed(&self, id: &str, outcome: SourceOutcome) -> Result<(), StoreError> {
        source_records::mark_source_record(&self.pool, id, outcome.status())
            .await
            .map_err(|e| store_error(id, e))
    }

    async fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_attempts: i32,
    ) -> Result<FailureState, StoreError> {
        let (status, attempts) =
            source_records::record_source_failure(&self.pool, id, error, max_attempts)
                .await
                .map_err(|e| store_error(id, e))?;
        Ok(if status == ProcessingStatus::Failed {
            FailureState::GaveUp { attempts }
        } else {
            FailureState::Retrying { attempts }
        })
    }

    async fn insert_brief(&self, brief: &Brief) -> Result<(), StoreError> {
        let id = briefs::insert_brief(&self.pool, brief)
            .await
            .map_err(|e| store_error("narrative_briefs", e))?;
        tracing::debug!(brief_id = id, "brief stored");
        Ok(())
    }

    async fn latest_brief(&self) -> Result<Option<Brief>, StoreError> {
        let Some(row) = briefs::get_latest_brief(&self.pool)
            .await
            .map_err(|e| store_error("narrative_briefs", e))?
        else {
            return Ok(None);
        };
        let id = row.id.to_string();
        row.into_brief().map(Some).map_err(|e| store_error(&id, e))
    }

    async fn source_status_counts(&self) -> Result<HashMap<ProcessingStatus, i64>, StoreError> {
        source_records::count_source_records_by_status(&self.pool)
            .await
            .map_err(|e| store_error("source_records", e))
    }
}
