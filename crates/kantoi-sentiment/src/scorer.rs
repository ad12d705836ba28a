//! Impact score calculator.
//!
//! `impact = sentiment × archetype weight × identity-risk multiplier × velocity bonus`
//!
//! The scorer owns an explicit, versioned [`WeightTable`]; it never reads the
//! clock or any global state, so recomputing an impact from the stored fields
//! of a [`Signal`] with the same table reproduces the stored value exactly.

use chrono::{DateTime, Duration, Utc};
use kantoi_core::{Archetype, Sentiment, Signal, SourceRecord, WeightTable};

use crate::validator::{validate, RawClassification, ValidationReport};

/// Inputs to [`ImpactScorer::score`] that do not come from the classifier.
#[derive(Debug, Clone)]
pub struct ScoreContext {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Caption the classification was made from; searched in hierarchy mode.
    pub source_text: String,
    /// Views per hour, when known.
    pub velocity: Option<f64>,
}

/// A scored signal together with the label fallbacks taken to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSignal {
    pub signal: Signal,
    pub report: ValidationReport,
}

#[derive(Debug, Clone)]
pub struct ImpactScorer {
    weights: WeightTable,
}

impl ImpactScorer {
    #[must_use]
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.weights.version
    }

    /// Total, deterministic impact of one validated classification.
    #[must_use]
    pub fn impact(
        &self,
        sentiment: Sentiment,
        archetype: Archetype,
        is_identity_risk: bool,
        velocity: Option<f64>,
    ) -> f64 {
        let weight = self.weights.weight(archetype);
        let risk = if is_identity_risk && self.weights.identity_risk_enabled {
            self.weights.identity_risk_multiplier
        } else {
            1.0
        };
        let v = &self.weights.velocity;
        let bonus = match velocity {
            Some(vel) if v.enabled && vel > v.threshold => v.bonus,
            _ => 1.0,
        };
        sentiment.as_f64() * weight * risk * bonus
    }

    /// Views per hour, with age floored at the configured minimum.
    #[must_use]
    pub fn velocity(&self, view_count: i64, age: Duration) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let hours = age.num_seconds() as f64 / 3600.0;
        #[allow(clippy::cast_precision_loss)]
        let views = view_count.max(0) as f64;
        views / hours.max(self.weights.velocity.min_age_hours)
    }

    /// Build the scoring context for a source record as of `now`.
    ///
    /// The signal timestamp is the content's publish time when known, else
    /// `now`. Velocity needs a publish time and is `None` without one.
    #[must_use]
    pub fn context_for(&self, record: &SourceRecord, now: DateTime<Utc>) -> ScoreContext {
        let velocity = record
            .created_at
            .map(|created| self.velocity(record.view_count, now - created));
        ScoreContext {
            id: record.id.clone(),
            timestamp: record.created_at.unwrap_or(now),
            source_text: record.caption.clone(),
            velocity,
        }
    }

    /// Validate a raw classification and compute its impact.
    #[must_use]
    pub fn score(&self, raw: &RawClassification, ctx: &ScoreContext) -> ScoredSignal {
        let v = validate(raw, self.weights.topic_mode, &ctx.source_text);
        let impact_score = self.impact(v.sentiment, v.archetype, v.is_identity_risk, ctx.velocity);
        ScoredSignal {
            signal: Signal {
                id: ctx.id.clone(),
                timestamp: ctx.timestamp,
                sentiment: v.sentiment,
                archetype: v.archetype,
                topic: v.topic,
                specific_trigger: v.specific_trigger,
                is_identity_risk: v.is_identity_risk,
                is_sarcasm: v.is_sarcasm,
                summary: v.summary,
                velocity: ctx.velocity,
                impact_score,
                weights_version: self.weights.version,
            },
            report: v.report,
        }
    }

    /// Recompute the impact of a stored signal from its own fields.
    #[must_use]
    pub fn recompute(&self, signal: &Signal) -> f64 {
        self.impact(
            signal.sentiment,
            signal.archetype,
            signal.is_identity_risk,
            signal.velocity,
        )
    }
}
