//! Evidence selection, context packaging and reply repair for the daily brief.
//!
//! No prose is generated here. The oracle writes the text; this module
//! decides what it is shown and forces whatever comes back into a [`Brief`].

use chrono::{DateTime, Duration, Utc};
use kantoi_core::{Brief, Signal, Topic, Window};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::aggregate::{dominant_topic, mean_impact};
use crate::error::SentimentError;
use crate::validator::{first_object, parse_oracle_json};

pub const DEFAULT_EVIDENCE_SIZE: usize = 8;
pub const DEFAULT_HEADLINE: &str = "System Stable";
pub const DEFAULT_NARRATIVE: &str = "Analyzing data streams...";

/// The three windows a brief compares, all ending relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BriefWindows {
    /// `[now − 24h, now)`
    pub current: Window,
    /// `[now − 48h, now − 24h)`
    pub yesterday: Window,
    /// `[now − 8d, now − 7d)`
    pub last_week: Window,
}

impl BriefWindows {
    #[must_use]
    pub fn ending(now: DateTime<Utc>) -> Self {
        let current = Window::trailing(now, Duration::days(1));
        Self {
            current,
            yesterday: current.previous(),
            last_week: current.shifted_back(Duration::days(7)),
        }
    }
}

/// Most negative and most positive signals of a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    /// Impact < 0, most negative first.
    pub threats: Vec<Signal>,
    /// Impact > 0, most positive first.
    pub wins: Vec<Signal>,
}

/// Pick up to `n` threats and `n` wins. Neutral signals are never evidence;
/// equal impacts keep input order.
#[must_use]
pub fn select_evidence(signals: &[Signal], n: usize) -> Evidence {
    let mut threats: Vec<Signal> = signals
        .iter()
        .filter(|s| s.impact_score < 0.0)
        .cloned()
        .collect();
    threats.sort_by(|a, b| a.impact_score.total_cmp(&b.impact_score));
    threats.truncate(n);

    let mut wins: Vec<Signal> = signals
        .iter()
        .filter(|s| s.impact_score > 0.0)
        .cloned()
        .collect();
    wins.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));
    wins.truncate(n);

    Evidence { threats, wins }
}

/// Deterministic numbers handed to the oracle alongside the evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefContext {
    pub generated_at: DateTime<Utc>,
    pub signal_count: usize,
    /// Mean impact over the current 24h window.
    pub window_score: f64,
    /// `window_score − yesterday's mean`; `None` when yesterday is empty.
    pub day_delta: Option<f64>,
    /// `window_score − last week's mean`; `None` when that day is empty.
    pub week_delta: Option<f64>,
    pub dominant_topic: Option<Topic>,
}

#[must_use]
pub fn build_context(
    now: DateTime<Utc>,
    current: &[Signal],
    yesterday: &[Signal],
    last_week: &[Signal],
) -> BriefContext {
    let window_score = mean_impact(current);
    let gap = |baseline: &[Signal]| {
        (!baseline.is_empty()).then(|| window_score - mean_impact(baseline))
    };
    BriefContext {
        generated_at: now,
        signal_count: current.len(),
        window_score,
        day_delta: gap(yesterday),
        week_delta: gap(last_week),
        dominant_topic: dominant_topic(current),
    }
}

fn format_gap(gap: Option<f64>) -> String {
    gap.map_or_else(|| "no baseline".to_string(), |g| format!("{g:+.2}"))
}

fn evidence_entry(s: &Signal) -> Value {
    json!({
        "topic": s.topic,
        "specific_trigger": s.specific_trigger,
        "summary": s.summary,
        "archetype": s.archetype,
        "sentiment": s.sentiment,
        "impact_score": s.impact_score,
    })
}

/// Render the oracle prompt. The reply must be a single JSON object with
/// `headline`, `public_narrative`, `private_memo` and `key_driver`.
#[must_use]
pub fn build_prompt(ctx: &BriefContext, evidence: &Evidence) -> String {
    let packet: Vec<Value> = evidence
        .threats
        .iter()
        .chain(evidence.wins.iter())
        .map(evidence_entry)
        .collect();
    let dominant = ctx.dominant_topic.map_or("none", Topic::as_str);

    format!(
        "You are writing the daily situation report for a public-trust monitor.\n\
         \n\
         TELEMETRY:\n\
         - Current trust score: {score:.2} (mean impact over the last 24 hours; below zero erodes trust)\n\
         - Signals in window: {count}\n\
         - Gap vs yesterday: {day}\n\
         - Gap vs same day last week: {week}\n\
         - Dominant topic: {dominant}\n\
         \n\
         EVIDENCE (most negative first, then most positive):\n\
         {packet}\n\
         \n\
         TASK:\n\
         Contrast the official narrative with what the data shows. Use short, plain sentences.\n\
         Say so explicitly when the current trend contradicts the gaps above.\n\
         \n\
         OUTPUT JSON ONLY:\n\
         {{\"headline\": \"at most 5 words\", \
         \"public_narrative\": \"2-3 sentences\", \
         \"private_memo\": \"1 sentence of advice\", \
         \"key_driver\": \"the trigger driving the score\"}}\n",
        score = ctx.window_score,
        count = ctx.signal_count,
        day = format_gap(ctx.day_delta),
        week = format_gap(ctx.week_delta),
        packet = Value::Array(packet),
    )
}

/// The oracle's brief after repair; every field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BriefReply {
    pub headline: String,
    pub public_narrative: String,
    pub private_memo: String,
    pub key_driver: String,
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Parse and repair a brief reply.
///
/// Missing keys get defaults: `headline` → "System Stable",
/// `public_narrative` → `dominant_narrative` → "Analyzing data streams...",
/// `private_memo` and `key_driver` → empty.
///
/// # Errors
///
/// Returns [`SentimentError::MalformedOracleOutput`] when the text is not a
/// JSON object after one fence-stripping retry. An unparseable reply is
/// never turned into an empty brief.
pub fn repair_reply(text: &str) -> Result<BriefReply, SentimentError> {
    let map = first_object(parse_oracle_json(text)?)?;
    Ok(BriefReply {
        headline: text_field(&map, "headline").unwrap_or_else(|| DEFAULT_HEADLINE.to_string()),
        public_narrative: text_field(&map, "public_narrative")
            .or_else(|| text_field(&map, "dominant_narrative"))
            .unwrap_or_else(|| DEFAULT_NARRATIVE.to_string()),
        private_memo: text_field(&map, "private_memo").unwrap_or_default(),
        key_driver: text_field(&map, "key_driver").unwrap_or_default(),
    })
}

#[must_use]
pub fn assemble_brief(ctx: &BriefContext, evidence: Evidence, reply: BriefReply) -> Brief {
    Brief {
        generated_at: ctx.generated_at,
        window_score: ctx.window_score,
        headline: reply.headline,
        narrative: reply.public_narrative,
        private_memo: reply.private_memo,
        key_driver: reply.key_driver,
        day_delta: ctx.day_delta,
        week_delta: ctx.week_delta,
        top_positive: evidence.wins,
        top_negative: evidence.threats,
    }
}
