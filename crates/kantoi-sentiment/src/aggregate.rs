//! Window statistics over materialised signal slices.
//!
//! Every function here is pure and synchronous. Callers fetch a window from
//! a [`kantoi_core::SignalStore`] and hand the slice in; nothing here can
//! fail, and every division has a defined result for empty input.
//!
//! Tie-breaks are by first appearance in the input slice. Store queries
//! return newest first, so "first seen" means "most recent" for slices
//! coming straight from the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kantoi_core::{Archetype, Signal, Topic, Window};
use serde::Serialize;

/// A percentage-point or count delta smaller than this is reported as
/// [`Delta::Stable`].
pub const STABLE_THRESHOLD: f64 = 1.0;

/// Stable threshold for mean impact, whose range is about ±3.75.
pub const IMPACT_STABLE_THRESHOLD: f64 = 0.1;

/// Size of the dashboard's "burning issues" and "wins" lists.
pub const DEFAULT_TOP_K: usize = 5;

/// Windows up to this many days are bucketed hourly, longer ones daily.
const HOURLY_MAX_DAYS: i64 = 3;

#[allow(clippy::cast_precision_loss)]
fn as_f64(n: usize) -> f64 {
    n as f64
}

/// Mean impact, `0.0` for an empty slice.
#[must_use]
pub fn mean_impact(signals: &[Signal]) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    signals.iter().map(|s| s.impact_score).sum::<f64>() / as_f64(signals.len())
}

/// `(Σ|negative impact|, Σ|impact|)`.
fn impact_volumes(signals: &[Signal]) -> (f64, f64) {
    signals.iter().fold((0.0, 0.0), |(neg, total), s| {
        let abs = s.impact_score.abs();
        if s.impact_score < 0.0 {
            (neg + abs, total + abs)
        } else {
            (neg, total + abs)
        }
    })
}

/// `100 × (1 − Σ|negative impact| / Σ|impact|)`, `0.0` when the
/// denominator is zero.
#[must_use]
pub fn consensus_pct(signals: &[Signal]) -> f64 {
    let (negative, total) = impact_volumes(signals);
    if total == 0.0 {
        return 0.0;
    }
    100.0 * (1.0 - negative / total)
}

/// `100 × Σ|negative impact| / Σ|impact|`, `0.0` when the denominator is
/// zero. Complements [`consensus_pct`] whenever any impact is non-zero.
#[must_use]
pub fn resistance_pct(signals: &[Signal]) -> f64 {
    let (negative, total) = impact_volumes(signals);
    if total == 0.0 {
        return 0.0;
    }
    100.0 * negative / total
}

/// Count occurrences of `key` and return `(key, count)` pairs in
/// first-seen order.
fn tally<K: PartialEq + Copy>(keys: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut counts: Vec<(K, usize)> = Vec::new();
    for key in keys {
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }
    counts
}

/// Most frequent topic; ties go to the topic seen first. `None` when empty.
#[must_use]
pub fn dominant_topic(signals: &[Signal]) -> Option<Topic> {
    let mut best: Option<(Topic, usize)> = None;
    for (topic, n) in tally(signals.iter().map(|s| s.topic)) {
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((topic, n));
        }
    }
    best.map(|(t, _)| t)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSign {
    /// Burning issues: negative signals, most negative sum first.
    Negative,
    /// Wins: positive signals, most positive sum first.
    Positive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerImpact {
    pub trigger: String,
    pub total_impact: f64,
    pub count: usize,
}

/// Group signals of one sign by trigger, sum their impact and return the
/// `k` most extreme groups. Equal sums keep first-seen order.
#[must_use]
pub fn top_triggers(signals: &[Signal], k: usize, sign: TriggerSign) -> Vec<TriggerImpact> {
    let mut groups: Vec<TriggerImpact> = Vec::new();
    let selected = signals.iter().filter(|s| match sign {
        TriggerSign::Negative => s.impact_score < 0.0,
        TriggerSign::Positive => s.impact_score > 0.0,
    });
    for s in selected {
        match groups.iter_mut().find(|g| g.trigger == s.specific_trigger) {
            Some(g) => {
                g.total_impact += s.impact_score;
                g.count += 1;
            }
            None => groups.push(TriggerImpact {
                trigger: s.specific_trigger.clone(),
                total_impact: s.impact_score,
                count: 1,
            }),
        }
    }
    // Stable sort keeps first-seen order among equal sums.
    match sign {
        TriggerSign::Negative => groups.sort_by(|a, b| a.total_impact.total_cmp(&b.total_impact)),
        TriggerSign::Positive => groups.sort_by(|a, b| b.total_impact.total_cmp(&a.total_impact)),
    }
    groups.truncate(k);
    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerCount {
    pub trigger: String,
    pub count: usize,
}

/// Triggers by number of posts regardless of sign (the "trending" list).
#[must_use]
pub fn trending_triggers(signals: &[Signal], k: usize) -> Vec<TriggerCount> {
    let mut counts: Vec<TriggerCount> = Vec::new();
    for s in signals {
        match counts.iter_mut().find(|c| c.trigger == s.specific_trigger) {
            Some(c) => c.count += 1,
            None => counts.push(TriggerCount {
                trigger: s.specific_trigger.clone(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(k);
    counts
}

/// One row of the topic risk radar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub topic: Topic,
    pub volume: usize,
    pub mean_impact: f64,
    /// Most frequent trigger within the topic.
    pub top_trigger: String,
}

/// Per-topic volume, mean impact and modal trigger, largest volume first.
#[must_use]
pub fn topic_breakdown(signals: &[Signal]) -> Vec<TopicSummary> {
    let mut rows: Vec<TopicSummary> = tally(signals.iter().map(|s| s.topic))
        .into_iter()
        .map(|(topic, volume)| {
            let members: Vec<Signal> = signals.iter().filter(|s| s.topic == topic).cloned().collect();
            let top_trigger = trending_triggers(&members, 1)
                .into_iter()
                .next()
                .map(|t| t.trigger)
                .unwrap_or_default();
            TopicSummary {
                topic,
                volume,
                mean_impact: mean_impact(&members),
                top_trigger,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.volume.cmp(&a.volume));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchetypeShare {
    pub archetype: Archetype,
    pub count: usize,
    pub pct: f64,
}

/// Share of voice per archetype, most frequent first.
#[must_use]
pub fn share_of_voice(signals: &[Signal]) -> Vec<ArchetypeShare> {
    let total = as_f64(signals.len());
    let mut shares: Vec<ArchetypeShare> = tally(signals.iter().map(|s| s.archetype))
        .into_iter()
        .map(|(archetype, count)| ArchetypeShare {
            archetype,
            count,
            pct: 100.0 * as_f64(count) / total,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSize {
    Hour,
    Day,
}

impl BucketSize {
    /// Hourly for windows of at most three days, daily otherwise.
    #[must_use]
    pub fn for_window(window: &Window) -> Self {
        if window.length() <= chrono::Duration::days(HOURLY_MAX_DAYS) {
            BucketSize::Hour
        } else {
            BucketSize::Day
        }
    }

    fn seconds(self) -> i64 {
        match self {
            BucketSize::Hour => 3_600,
            BucketSize::Day => 86_400,
        }
    }

    /// Start of the UTC bucket containing `t`.
    #[must_use]
    pub fn floor(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let secs = t.timestamp();
        DateTime::from_timestamp(secs - secs.rem_euclid(self.seconds()), 0).unwrap_or(t)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub mean_impact: f64,
    pub count: usize,
}

/// Mean impact per bucket, ascending by bucket start. Buckets without
/// signals are omitted rather than zero-filled.
#[must_use]
pub fn trend_series(signals: &[Signal], bucket: BucketSize) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for s in signals {
        let entry = buckets.entry(bucket.floor(s.timestamp)).or_insert((0.0, 0));
        entry.0 += s.impact_score;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(bucket_start, (sum, count))| TrendPoint {
            bucket_start,
            mean_impact: sum / as_f64(count),
            count,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Count,
    MeanImpact,
    Consensus,
    Resistance,
}

impl Metric {
    #[must_use]
    pub fn compute(self, signals: &[Signal]) -> f64 {
        match self {
            Metric::Count => as_f64(signals.len()),
            Metric::MeanImpact => mean_impact(signals),
            Metric::Consensus => consensus_pct(signals),
            Metric::Resistance => resistance_pct(signals),
        }
    }

    /// Deltas below this are reported as [`Delta::Stable`].
    #[must_use]
    pub fn stable_threshold(self) -> f64 {
        match self {
            Metric::MeanImpact => IMPACT_STABLE_THRESHOLD,
            Metric::Count | Metric::Consensus | Metric::Resistance => STABLE_THRESHOLD,
        }
    }
}

/// Change of a metric between two windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Delta {
    /// The change is below the metric's stable threshold.
    Stable,
    Change(f64),
    /// The previous window had no signals.
    NoBaseline,
}

impl Delta {
    /// Compare two percentage values; `previous = None` means no baseline.
    #[must_use]
    pub fn between(current: f64, previous: Option<f64>) -> Self {
        Self::with_threshold(current, previous, STABLE_THRESHOLD)
    }

    #[must_use]
    pub fn with_threshold(current: f64, previous: Option<f64>, threshold: f64) -> Self {
        match previous {
            None => Delta::NoBaseline,
            Some(p) => {
                let d = current - p;
                if d.abs() < threshold {
                    Delta::Stable
                } else {
                    Delta::Change(d)
                }
            }
        }
    }
}

/// `metric(current) − metric(previous)` with noise suppression.
#[must_use]
pub fn delta(current: &[Signal], previous: &[Signal], metric: Metric) -> Delta {
    if previous.is_empty() {
        return Delta::NoBaseline;
    }
    Delta::with_threshold(
        metric.compute(current),
        Some(metric.compute(previous)),
        metric.stable_threshold(),
    )
}

/// Everything the dashboard shows for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub window: Window,
    pub count: usize,
    pub mean_impact: f64,
    pub consensus_pct: f64,
    pub resistance_pct: f64,
    pub dominant_topic: Option<Topic>,
    pub burning_issues: Vec<TriggerImpact>,
    pub wins: Vec<TriggerImpact>,
    pub trending: Vec<TriggerCount>,
    pub topics: Vec<TopicSummary>,
    pub share_of_voice: Vec<ArchetypeShare>,
    pub bucket: BucketSize,
    pub trend: Vec<TrendPoint>,
}

#[must_use]
pub fn window_metrics(window: &Window, signals: &[Signal]) -> WindowMetrics {
    let bucket = BucketSize::for_window(window);
    WindowMetrics {
        window: *window,
        count: signals.len(),
        mean_impact: mean_impact(signals),
        consensus_pct: consensus_pct(signals),
        resistance_pct: resistance_pct(signals),
        dominant_topic: dominant_topic(signals),
        burning_issues: top_triggers(signals, DEFAULT_TOP_K, TriggerSign::Negative),
        wins: top_triggers(signals, DEFAULT_TOP_K, TriggerSign::Positive),
        trending: trending_triggers(signals, DEFAULT_TOP_K),
        topics: topic_breakdown(signals),
        share_of_voice: share_of_voice(signals),
        bucket,
        trend: trend_series(signals, bucket),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDeltas {
    pub count: Delta,
    pub mean_impact: Delta,
    pub consensus: Delta,
    pub resistance: Delta,
}

/// Deltas between two already computed windows.
#[must_use]
pub fn compare(current: &WindowMetrics, previous: &WindowMetrics) -> MetricDeltas {
    let d = |metric: Metric, cur: f64, prev: f64| {
        Delta::with_threshold(
            cur,
            (previous.count > 0).then_some(prev),
            metric.stable_threshold(),
        )
    };
    MetricDeltas {
        count: d(
            Metric::Count,
            as_f64(current.count),
            as_f64(previous.count),
        ),
        mean_impact: d(Metric::MeanImpact, current.mean_impact, previous.mean_impact),
        consensus: d(Metric::Consensus, current.consensus_pct, previous.consensus_pct),
        resistance: d(
            Metric::Resistance,
            current.resistance_pct,
            previous.resistance_pct,
        ),
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
