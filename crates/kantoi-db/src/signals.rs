//! Database operations for the `signals` table.

use chrono::{DateTime, Utc};
use kantoi_core::{Archetype, Sentiment, Signal, Topic};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `signals` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SignalRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub sentiment: i16,
    pub archetype: String,
    pub topic: String,
    pub specific_trigger: String,
    pub is_identity_risk: bool,
    pub is_sarcasm: bool,
    pub summary: String,
    pub velocity: Option<f64>,
    pub impact_score: f64,
    pub weights_version: i32,
}

impl SignalRow {
    /// Convert a stored row back into a [`Signal`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] if a stored label or number is not
    /// part of the current taxonomy.
    pub fn into_signal(self) -> Result<Signal, DbError> {
        let sentiment = i8::try_from(self.sentiment)
            .map_err(|_| DbError::InvalidValue(format!("sentiment {}", self.sentiment)))
            .and_then(|v| Sentiment::try_from(v).map_err(DbError::InvalidValue))?;
        let archetype = Archetype::from_label(&self.archetype)
            .ok_or_else(|| DbError::InvalidValue(format!("archetype '{}'", self.archetype)))?;
        let topic = Topic::from_label(&self.topic)
            .ok_or_else(|| DbError::InvalidValue(format!("topic '{}'", self.topic)))?;
        let weights_version = u32::try_from(self.weights_version).map_err(|_| {
            DbError::InvalidValue(format!("weights_version {}", self.weights_version))
        })?;

        Ok(Signal {
            id: self.id,
            timestamp: self.created_at,
            sentiment,
            archetype,
            topic,
            specific_trigger: self.specific_trigger,
            is_identity_risk: self.is_identity_risk,
            is_sarcasm: self.is_sarcasm,
            summary: self.summary,
            velocity: self.velocity,
            impact_score: self.impact_score,
            weights_version,
        })
    }
}

/// Input filters for window queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalQuery<'a> {
    pub topic: Option<&'a str>,
    pub archetype: Option<&'a str>,
    pub limit: Option<i64>,
}

/// Insert a signal, or replace the existing row with the same id.
///
/// A write carrying an older timestamp than the stored row is ignored, so
/// concurrent writers converge on the newest classification.
///
/// Returns `true` if a row was inserted or updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_signal(pool: &PgPool, signal: &Signal) -> Result<bool, DbError> {
    let weights_version = i32::try_from(signal.weights_version).map_err(|_| {
        DbError::InvalidValue(format!("weights_version {}", signal.weights_version))
    })?;

    let result = sqlx::query(
        "INSERT INTO signals \
             (id, created_at, sentiment, archetype, topic, specific_trigger, \
              is_identity_risk, is_sarcasm, summary, velocity, impact_score, \
              weights_version, scored_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW()) \
         ON CONFLICT (id) DO UPDATE SET \
             created_at = EXCLUDED.created_at, \
             sentiment = EXCLUDED.sentiment, \
             archetype = EXCLUDED.archetype, \
             topic = EXCLUDED.topic, \
             specific_trigger = EXCLUDED.specific_trigger, \
             is_identity_risk = EXCLUDED.is_identity_risk, \
             is_sarcasm = EXCLUDED.is_sarcasm, \
             summary = EXCLUDED.summary, \
             velocity = EXCLUDED.velocity, \
             impact_score = EXCLUDED.impact_score, \
             weights_version = EXCLUDED.weights_version, \
             scored_at = NOW() \
         WHERE signals.created_at <= EXCLUDED.created_at",
    )
    .bind(&signal.id)
    .bind(signal.timestamp)
    .bind(i16::from(signal.sentiment.as_i8()))
    .bind(signal.archetype.as_str())
    .bind(signal.topic.as_str())
    .bind(&signal.specific_trigger)
    .bind(signal.is_identity_risk)
    .bind(signal.is_sarcasm)
    .bind(&signal.summary)
    .bind(signal.velocity)
    .bind(signal.impact_score)
    .bind(weights_version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Signals with `start <= created_at < end`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_signals_in_window(
    pool: &PgPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    query: SignalQuery<'_>,
) -> Result<Vec<SignalRow>, DbError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT \
             id, created_at, sentiment, archetype, topic, specific_trigger, \
             is_identity_risk, is_sarcasm, summary, velocity, impact_score, \
             weights_version \
         FROM signals \
         WHERE created_at >= $1 \
           AND created_at < $2 \
           AND ($3::TEXT IS NULL OR topic = $3) \
           AND ($4::TEXT IS NULL OR archetype = $4) \
         ORDER BY created_at DESC, id DESC \
         LIMIT COALESCE($5, 9223372036854775807)",
    )
    .bind(start)
    .bind(end)
    .bind(query.topic)
    .bind(query.archetype)
    .bind(query.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
