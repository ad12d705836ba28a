use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::taxonomy::{Archetype, Topic};

/// Signed tri-state sentiment. The sign is the trust direction: negative
/// erodes trust, positive builds it.
///
/// Serialized as the integer `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    #[must_use]
    pub fn as_i8(self) -> i8 {
        match self {
            Sentiment::Negative => -1,
            Sentiment::Neutral => 0,
            Sentiment::Positive => 1,
        }
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.as_i8())
    }

    /// Flip the polarity. Neutral stays neutral.
    #[must_use]
    pub fn inverted(self) -> Self {
        match self {
            Sentiment::Negative => Sentiment::Positive,
            Sentiment::Neutral => Sentiment::Neutral,
            Sentiment::Positive => Sentiment::Negative,
        }
    }

    /// Convert a continuous value: clamp to `[-1.0, 1.0]`, then round to the
    /// nearest integer (half away from zero). Non-finite input is neutral.
    #[must_use]
    pub fn from_continuous(value: f64) -> Self {
        if !value.is_finite() {
            return Sentiment::Neutral;
        }
        let rounded = value.clamp(-1.0, 1.0).round();
        if rounded > 0.0 {
            Sentiment::Positive
        } else if rounded < 0.0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    /// Parse a word label (`Positive`, `negative`, `NEUTRAL`, ...).
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" => Some(Sentiment::Positive),
            "negative" | "neg" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl From<Sentiment> for i8 {
    fn from(s: Sentiment) -> Self {
        s.as_i8()
    }
}

impl TryFrom<i8> for Sentiment {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Sentiment::Negative),
            0 => Ok(Sentiment::Neutral),
            1 => Ok(Sentiment::Positive),
            other => Err(format!("sentiment must be -1, 0 or 1, got {other}")),
        }
    }
}

/// One classified unit of content.
///
/// Created once at classification time and never mutated afterwards; a
/// re-ingest of the same `id` replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Dedup key; equal to the id of the source record it was derived from.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Stored polarity, after any sarcasm inversion.
    pub sentiment: Sentiment,
    pub archetype: Archetype,
    pub topic: Topic,
    /// Short label, at most four tokens.
    pub specific_trigger: String,
    pub is_identity_risk: bool,
    /// Sarcasm flag as received from the classifier.
    pub is_sarcasm: bool,
    pub summary: String,
    /// Views per hour at scoring time, if the source metadata allowed it.
    pub velocity: Option<f64>,
    pub impact_score: f64,
    /// Version of the weight table that produced `impact_score`.
    pub weights_version: u32,
}

/// Processing state of a raw source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Not yet turned into a signal; eligible for the next batch.
    Pending,
    /// A signal was written for this record.
    Processed,
    /// Deliberately skipped (empty or too-short caption); no signal.
    Skipped,
    /// Gave up after the maximum number of attempts.
    Failed,
}

impl ProcessingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Skipped => "skipped",
            ProcessingStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "processed" => Some(ProcessingStatus::Processed),
            "skipped" => Some(ProcessingStatus::Skipped),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw video metadata produced by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub caption: String,
    pub view_count: i64,
    pub share_count: i64,
    pub like_count: i64,
    pub thumbnail_url: Option<String>,
    /// When the content was published, if known.
    pub created_at: Option<DateTime<Utc>>,
    pub status: ProcessingStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl SourceRecord {
    /// A fresh pending record with zeroed counters.
    #[must_use]
    pub fn new(id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            caption: caption.into(),
            view_count: 0,
            share_count: 0,
            like_count: 0,
            thumbnail_url: None,
            created_at: None,
            status: ProcessingStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Periodic summary combining window statistics with delegated narrative text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub generated_at: DateTime<Utc>,
    /// Mean impact over the evaluation window.
    pub window_score: f64,
    pub headline: String,
    pub narrative: String,
    #[serde(default)]
    pub private_memo: String,
    #[serde(default)]
    pub key_driver: String,
    /// `window_score` minus the previous day's mean; `None` without a baseline.
    #[serde(default)]
    pub day_delta: Option<f64>,
    /// `window_score` minus the same day last week; `None` without a baseline.
    #[serde(default)]
    pub week_delta: Option<f64>,
    pub top_positive: Vec<Signal>,
    pub top_negative: Vec<Signal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_values_round_half_away_from_zero() {
        assert_eq!(Sentiment::from_continuous(0.5), Sentiment::Positive);
        assert_eq!(Sentiment::from_continuous(-0.5), Sentiment::Negative);
        assert_eq!(Sentiment::from_continuous(0.3), Sentiment::Neutral);
        assert_eq!(Sentiment::from_continuous(0.7), Sentiment::Positive);
    }

    #[test]
    fn continuous_values_clamp_out_of_range() {
        assert_eq!(Sentiment::from_continuous(7.0), Sentiment::Positive);
        assert_eq!(Sentiment::from_continuous(-42.0), Sentiment::Negative);
        assert_eq!(Sentiment::from_continuous(f64::NAN), Sentiment::Neutral);
    }

    #[test]
    fn inversion_flips_polarity() {
        assert_eq!(Sentiment::Positive.inverted(), Sentiment::Negative);
        assert_eq!(Sentiment::Negative.inverted(), Sentiment::Positive);
        assert_eq!(Sentiment::Neutral.inverted(), Sentiment::Neutral);
    }

    #[test]
    fn sentiment_is_total_ordered_by_sign() {
        assert!(Sentiment::Negative < Sentiment::Neutral);
        assert!(Sentiment::Neutral < Sentiment::Positive);
    }

    #[test]
    fn sentiment_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Sentiment::Negative).unwrap(), "-1");
        let parsed: Sentiment = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Sentiment::Positive);
        assert!(serde_json::from_str::<Sentiment>("2").is_err());
    }

    #[test]
    fn word_labels_parse_case_insensitively() {
        assert_eq!(Sentiment::from_word("Negative"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_word(" POSITIVE "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_word("meh"), None);
    }

    #[test]
    fn processing_status_parses_own_labels() {
        for s in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processed,
            ProcessingStatus::Skipped,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ProcessingStatus::parse("done"), None);
    }
}
