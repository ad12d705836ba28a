//! Parse-and-repair of oracle classifications.
//!
//! The oracle's JSON is treated as untrusted input. Field aliases are
//! accepted, wrong scalar types are coerced, and every label is forced onto
//! the closed taxonomy. Nothing in here fails on a well-formed JSON object;
//! unknown values are replaced and recorded in a [`ValidationReport`].

use kantoi_core::{classify_by_hierarchy, Archetype, Coerced, Sentiment, Topic, TopicMode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SentimentError;

/// Trigger labels longer than this are cut at a token boundary.
pub const MAX_TRIGGER_TOKENS: usize = 4;

pub const UNSPECIFIED_TRIGGER: &str = "Unspecified";

/// Parse oracle text as JSON.
///
/// Models frequently wrap JSON in markdown code fences even when asked not
/// to, so a failed parse is retried exactly once with the fences removed.
///
/// # Errors
///
/// Returns [`SentimentError::MalformedOracleOutput`] if the text is not JSON
/// after fence stripping.
pub fn parse_oracle_json(text: &str) -> Result<Value, SentimentError> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => Ok(value),
        Err(first) => {
            let stripped = strip_fences(text);
            serde_json::from_str::<Value>(&stripped).map_err(|second| {
                tracing::debug!(first = %first, second = %second, "oracle reply is not JSON");
                SentimentError::MalformedOracleOutput(second.to_string())
            })
        }
    }
}

fn strip_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Reduce a parsed reply to a single JSON object. A top-level array yields
/// its first element.
///
/// # Errors
///
/// Returns [`SentimentError::MalformedOracleOutput`] for empty arrays and
/// non-object values.
pub fn first_object(value: Value) -> Result<Map<String, Value>, SentimentError> {
    let value = match value {
        Value::Array(items) => items.into_iter().next().ok_or_else(|| {
            SentimentError::MalformedOracleOutput("empty array".to_string())
        })?,
        other => other,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SentimentError::MalformedOracleOutput(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Field-tolerant view of one classification reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawClassification {
    /// Number or word; coerced during validation.
    pub sentiment: Option<Value>,
    pub archetype: Option<String>,
    pub topic: Option<String>,
    pub specific_trigger: Option<String>,
    pub is_identity_risk: bool,
    pub is_sarcasm: bool,
    pub summary: Option<String>,
}

impl RawClassification {
    /// Build from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::MalformedOracleOutput`] when the value is
    /// not an object (or an array whose first element is one).
    pub fn from_value(value: Value) -> Result<Self, SentimentError> {
        let map = first_object(value)?;
        let pick = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k)).cloned();

        Ok(Self {
            sentiment: pick(&["sentiment"]).filter(|v| !v.is_null()),
            archetype: pick(&["archetype", "persona"]).as_ref().and_then(as_label),
            topic: pick(&["topic", "domain"]).as_ref().and_then(as_label),
            specific_trigger: pick(&["specific_trigger", "trigger"])
                .as_ref()
                .and_then(as_label),
            is_identity_risk: pick(&["is_identity_risk", "is_3r"])
                .as_ref()
                .is_some_and(coerce_bool),
            is_sarcasm: pick(&["is_sarcasm", "sarcasm"])
                .as_ref()
                .is_some_and(coerce_bool),
            summary: pick(&["summary"]).as_ref().and_then(as_label),
        })
    }

    /// Parse raw oracle text.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::MalformedOracleOutput`] if the text is not a
    /// JSON object after one fence-stripping retry.
    pub fn parse(text: &str) -> Result<Self, SentimentError> {
        Self::from_value(parse_oracle_json(text)?)
    }
}

fn as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Booleans arrive as `true`, `"true"`, `"yes"`, `1`, `"1"` and so on.
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1"
        ),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelField {
    Sentiment,
    Archetype,
    Topic,
}

/// One label that was missing or outside its closed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelFallback {
    pub field: LabelField,
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub fallbacks: Vec<LabelFallback>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.fallbacks.is_empty()
    }

    fn note<T>(&mut self, field: LabelField, coerced: &Coerced<T>) {
        if let Coerced::Fallback { raw, .. } = coerced {
            self.fallbacks.push(LabelFallback {
                field,
                raw: raw.clone(),
            });
        }
    }
}

/// A classification with every label inside its closed set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedClassification {
    /// Polarity after sarcasm inversion.
    pub sentiment: Sentiment,
    pub archetype: Archetype,
    pub topic: Topic,
    pub specific_trigger: String,
    pub is_identity_risk: bool,
    pub is_sarcasm: bool,
    pub summary: String,
    pub report: ValidationReport,
}

fn coerce_sentiment(raw: Option<&Value>) -> Coerced<Sentiment> {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64().map(Sentiment::from_continuous),
        Some(Value::String(s)) => Sentiment::from_word(s).or_else(|| {
            s.trim()
                .parse::<f64>()
                .ok()
                .map(Sentiment::from_continuous)
        }),
        _ => None,
    };
    match parsed {
        Some(s) => Coerced::Exact(s),
        None => Coerced::Fallback {
            value: Sentiment::Neutral,
            raw: raw.map(ToString::to_string),
        },
    }
}

/// Trim and cut a trigger to [`MAX_TRIGGER_TOKENS`] whitespace tokens.
#[must_use]
pub fn normalize_trigger(raw: Option<&str>) -> String {
    let tokens: Vec<&str> = raw
        .unwrap_or_default()
        .split_whitespace()
        .take(MAX_TRIGGER_TOKENS)
        .collect();
    if tokens.is_empty() {
        UNSPECIFIED_TRIGGER.to_string()
    } else {
        tokens.join(" ")
    }
}

/// Force a raw classification onto the taxonomy.
///
/// `source_text` is the caption the classification was made from; in
/// [`TopicMode::Hierarchy`] it is searched together with the trigger and
/// summary before the oracle's topic label is consulted.
#[must_use]
pub fn validate(
    raw: &RawClassification,
    topic_mode: TopicMode,
    source_text: &str,
) -> ValidatedClassification {
    let mut report = ValidationReport::default();

    let sentiment = coerce_sentiment(raw.sentiment.as_ref());
    report.note(LabelField::Sentiment, &sentiment);

    let archetype = Archetype::coerce(raw.archetype.as_deref());
    report.note(LabelField::Archetype, &archetype);

    let specific_trigger = normalize_trigger(raw.specific_trigger.as_deref());
    let summary = raw.summary.clone().unwrap_or_default();

    let hierarchy_topic = match topic_mode {
        TopicMode::Label => None,
        TopicMode::Hierarchy => {
            classify_by_hierarchy(&format!("{source_text} {specific_trigger} {summary}"))
        }
    };
    let topic = match hierarchy_topic {
        Some(t) => t,
        None => {
            let coerced = Topic::coerce(raw.topic.as_deref());
            report.note(LabelField::Topic, &coerced);
            coerced.value()
        }
    };

    let polarity = if raw.is_sarcasm {
        sentiment.value().inverted()
    } else {
        sentiment.value()
    };

    for fallback in &report.fallbacks {
        tracing::warn!(
            field = ?fallback.field,
            raw = fallback.raw.as_deref().unwrap_or("<missing>"),
            "classification label outside taxonomy, using fallback"
        );
    }

    ValidatedClassification {
        sentiment: polarity,
        archetype: archetype.value(),
        topic,
        specific_trigger,
        is_identity_risk: raw.is_identity_risk,
        is_sarcasm: raw.is_sarcasm,
        summary,
        report,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawClassification {
        RawClassification::from_value(value).expect("object")
    }

    #[test]
    fn fenced_reply_parses_on_retry() {
        let text = "```json\n{\"sentiment\": -1, \"archetype\": \"Urban Reformist\"}\n```";
        let parsed = RawClassification::parse(text).unwrap();
        assert_eq!(parsed.archetype.as_deref(), Some("Urban Reformist"));
    }

    #[test]
    fn garbage_reply_is_malformed() {
        let err = RawClassification::parse("I think this is negative").unwrap_err();
        assert!(matches!(err, SentimentError::MalformedOracleOutput(_)));
    }

    #[test]
    fn top_level_array_takes_first_element() {
        let parsed = raw(json!([{ "topic": "Economy" }, { "topic": "Reform" }]));
        assert_eq!(parsed.topic.as_deref(), Some("Economy"));
        assert!(RawClassification::from_value(json!([])).is_err());
        assert!(RawClassification::from_value(json!("text")).is_err());
    }

    #[test]
    fn aliases_are_accepted() {
        let parsed = raw(json!({
            "persona": "Heartland Conservative",
            "domain": "Malay Rights",
            "is_3r": "true",
        }));
        assert_eq!(parsed.archetype.as_deref(), Some("Heartland Conservative"));
        assert_eq!(parsed.topic.as_deref(), Some("Malay Rights"));
        assert!(parsed.is_identity_risk);
    }

    #[test]
    fn booleans_are_coerced_from_strings_and_numbers() {
        assert!(raw(json!({ "is_sarcasm": 1 })).is_sarcasm);
        assert!(raw(json!({ "is_sarcasm": "YES" })).is_sarcasm);
        assert!(!raw(json!({ "is_sarcasm": "false" })).is_sarcasm);
        assert!(!raw(json!({ "is_sarcasm": 0 })).is_sarcasm);
        assert!(!raw(json!({})).is_sarcasm);
    }

    #[test]
    fn unknown_archetype_falls_back_and_is_reported() {
        let v = validate(
            &raw(json!({ "sentiment": 1, "archetype": "Random Made Up Label", "topic": "Economy" })),
            TopicMode::Label,
            "",
        );
        assert_eq!(v.archetype, Archetype::DigitalCynic);
        assert_eq!(
            v.report.fallbacks,
            vec![LabelFallback {
                field: LabelField::Archetype,
                raw: Some("Random Made Up Label".to_string()),
            }]
        );
    }

    #[test]
    fn unknown_topic_becomes_uncategorized() {
        let v = validate(
            &raw(json!({ "sentiment": 0, "archetype": "Digital Cynic", "topic": "Weather" })),
            TopicMode::Label,
            "",
        );
        assert_eq!(v.topic, Topic::Uncategorized);
        assert_eq!(v.report.fallbacks.len(), 1);
    }

    #[test]
    fn out_of_range_sentiment_is_clamped() {
        let v = validate(&raw(json!({ "sentiment": 5 })), TopicMode::Label, "");
        assert_eq!(v.sentiment, Sentiment::Positive);
        let v = validate(&raw(json!({ "sentiment": "-0.8" })), TopicMode::Label, "");
        assert_eq!(v.sentiment, Sentiment::Negative);
        let v = validate(&raw(json!({ "sentiment": "Negative" })), TopicMode::Label, "");
        assert_eq!(v.sentiment, Sentiment::Negative);
    }

    #[test]
    fn missing_sentiment_is_neutral_fallback() {
        let v = validate(&raw(json!({})), TopicMode::Label, "");
        assert_eq!(v.sentiment, Sentiment::Neutral);
        assert!(v
            .report
            .fallbacks
            .iter()
            .any(|f| f.field == LabelField::Sentiment && f.raw.is_none()));
    }

    #[test]
    fn sarcasm_inverts_polarity() {
        let v = validate(
            &raw(json!({ "sentiment": 1, "is_sarcasm": true })),
            TopicMode::Label,
            "",
        );
        assert_eq!(v.sentiment, Sentiment::Negative);
        assert!(v.is_sarcasm);

        let v = validate(
            &raw(json!({ "sentiment": 0, "is_sarcasm": true })),
            TopicMode::Label,
            "",
        );
        assert_eq!(v.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn trigger_is_truncated_to_four_tokens() {
        assert_eq!(
            normalize_trigger(Some("  diesel subsidy cut for fishermen in kampung ")),
            "diesel subsidy cut for"
        );
        assert_eq!(normalize_trigger(Some("   ")), UNSPECIFIED_TRIGGER);
        assert_eq!(normalize_trigger(None), UNSPECIFIED_TRIGGER);
    }

    #[test]
    fn hierarchy_mode_prefers_specific_keywords() {
        let classification = raw(json!({
            "sentiment": -1,
            "archetype": "Economic Pragmatist",
            "topic": "Leadership",
            "specific_trigger": "PM announcement",
        }));
        let v = validate(
            &classification,
            TopicMode::Hierarchy,
            "PM says diesel subsidy cut is necessary",
        );
        assert_eq!(v.topic, Topic::CostOfLiving);

        let v = validate(&classification, TopicMode::Label, "PM says diesel subsidy cut");
        assert_eq!(v.topic, Topic::Leadership);
    }

    #[test]
    fn hierarchy_mode_falls_back_to_oracle_label() {
        let classification = raw(json!({ "topic": "Education", "specific_trigger": "something" }));
        let v = validate(&classification, TopicMode::Hierarchy, "lorem ipsum");
        assert_eq!(v.topic, Topic::Education);
    }
}
