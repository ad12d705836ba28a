//! Database operations for the `narrative_briefs` table.

use chrono::{DateTime, Utc};
use kantoi_core::Brief;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BriefRow {
    pub id: i64,
    pub generated_at: DateTime<Utc>,
    pub net_trust_score: f64,
    pub content: Value,
    pub created_at: DateTime<Utc>,
}

impl BriefRow {
    /// # Errors
    ///
    /// Returns [`DbError::Json`] if `content` does not hold a brief.
    pub fn into_brief(self) -> Result<Brief, DbError> {
        Ok(serde_json::from_value(self.content)?)
    }
}

/// Append a brief. Returns the new row id.
///
/// # Errors
///
/// Returns [`DbError::Json`] if the brief cannot be serialized, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_brief(pool: &PgPool, brief: &Brief) -> Result<i64, DbError> {
    let content = serde_json::to_value(brief)?;
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO narrative_briefs (generated_at, net_trust_score, content) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(brief.generated_at)
    .bind(brief.window_score)
    .bind(content)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// The most recently generated brief, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_brief(pool: &PgPool) -> Result<Option<BriefRow>, DbError> {
    let row = sqlx::query_as::<_, BriefRow>(
        "SELECT id, generated_at, net_trust_score, content, created_at \
         FROM narrative_briefs \
         ORDER BY generated_at DESC, id DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
