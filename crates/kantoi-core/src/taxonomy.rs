//! Closed label sets for classified signals.
//!
//! The classification step is an untrusted generative model, so every label it
//! returns goes through exactly one mapping here: an exact, case-sensitive
//! match against the display string, or a fallback. Aggregation code only ever
//! sees the enums.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Result of mapping a raw label onto a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coerced<T> {
    /// The raw label matched a known value exactly.
    Exact(T),
    /// The raw label was missing or unknown and was replaced by the fallback.
    Fallback { value: T, raw: Option<String> },
}

impl<T: Copy> Coerced<T> {
    #[must_use]
    pub fn value(&self) -> T {
        match self {
            Coerced::Exact(v) | Coerced::Fallback { value: v, .. } => *v,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Coerced::Fallback { .. })
    }
}

/// Persona category used to weight a signal's political significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    /// Tradition-focused voices. Highest weight.
    #[serde(rename = "Heartland Conservative")]
    HeartlandConservative,
    /// Cost-of-living-focused voices.
    #[serde(rename = "Economic Pragmatist")]
    EconomicPragmatist,
    /// Governance-focused voices.
    #[serde(rename = "Urban Reformist")]
    UrbanReformist,
    /// Satire and noise. Lowest weight, and the fallback for unknown labels.
    #[serde(rename = "Digital Cynic")]
    DigitalCynic,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::HeartlandConservative,
        Archetype::EconomicPragmatist,
        Archetype::UrbanReformist,
        Archetype::DigitalCynic,
    ];

    pub const FALLBACK: Archetype = Archetype::DigitalCynic;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Archetype::HeartlandConservative => "Heartland Conservative",
            Archetype::EconomicPragmatist => "Economic Pragmatist",
            Archetype::UrbanReformist => "Urban Reformist",
            Archetype::DigitalCynic => "Digital Cynic",
        }
    }

    /// Exact, case-sensitive lookup by display label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == label)
    }

    /// Map a raw label to an archetype, replacing anything unknown with
    /// [`Archetype::FALLBACK`].
    #[must_use]
    pub fn coerce(raw: Option<&str>) -> Coerced<Self> {
        match raw.and_then(Self::from_label) {
            Some(a) => Coerced::Exact(a),
            None => Coerced::Fallback {
                value: Self::FALLBACK,
                raw: raw.map(ToString::to_string),
            },
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutually exclusive subject-matter bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "Cost of Living")]
    CostOfLiving,
    Economy,
    Corruption,
    Reform,
    #[serde(rename = "Malay Rights")]
    MalayRights,
    Education,
    Leadership,
    Uncategorized,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::CostOfLiving,
        Topic::Economy,
        Topic::Corruption,
        Topic::Reform,
        Topic::MalayRights,
        Topic::Education,
        Topic::Leadership,
        Topic::Uncategorized,
    ];

    pub const FALLBACK: Topic = Topic::Uncategorized;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::CostOfLiving => "Cost of Living",
            Topic::Economy => "Economy",
            Topic::Corruption => "Corruption",
            Topic::Reform => "Reform",
            Topic::MalayRights => "Malay Rights",
            Topic::Education => "Education",
            Topic::Leadership => "Leadership",
            Topic::Uncategorized => "Uncategorized",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }

    /// Map a raw label to a topic, replacing anything unknown with
    /// [`Topic::Uncategorized`].
    #[must_use]
    pub fn coerce(raw: Option<&str>) -> Coerced<Self> {
        match raw.and_then(Self::from_label) {
            Some(t) => Coerced::Exact(t),
            None => Coerced::Fallback {
                value: Self::FALLBACK,
                raw: raw.map(ToString::to_string),
            },
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a signal's topic is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicMode {
    /// Use the oracle's label as-is (after validation).
    #[default]
    Label,
    /// Run the policy-specificity keyword hierarchy first; the oracle label is
    /// only used when no rule matches.
    Hierarchy,
}

/// One numbered rule of the policy-specificity hierarchy.
pub struct TopicRule {
    pub priority: u8,
    pub tier: &'static str,
    pub topic: Topic,
    pattern: Regex,
}

impl TopicRule {
    fn new(priority: u8, tier: &'static str, topic: Topic, pattern: &str) -> Self {
        Self {
            priority,
            tier,
            topic,
            // Patterns are compile-time literals covered by the tests below.
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid topic rule: {e}")),
        }
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Rules in evaluation order. Specific economic keywords outrank governance,
/// governance outranks identity, identity outranks service delivery, and the
/// generic leadership catch-all is last so it cannot swallow policy content.
pub static TOPIC_RULES: LazyLock<Vec<TopicRule>> = LazyLock::new(|| {
    vec![
        TopicRule::new(
            1,
            "economic",
            Topic::CostOfLiving,
            r"(?i)\b(harga|prices?|subsid\w*|diesel|petrol|ron95|sst|gst|tax(es)?|tolls?|rent|rice|beras|chicken|ayam|electricity|tarif\w*|inflation|cost of living|kos sara hidup|gaji|wages?|salary)\b",
        ),
        TopicRule::new(
            1,
            "economic",
            Topic::Economy,
            r"(?i)\b(ringgit|gdp|economy|ekonomi|investments?|pelaburan|bursa|stock market|exports?|imports?|jobs?|unemployment|monopol\w*|business(es)?|smes?)\b",
        ),
        TopicRule::new(
            2,
            "governance",
            Topic::Corruption,
            r"(?i)\b(rasuah|corrupt\w*|macc|sprm|brib\w*|kleptocra\w*|1mdb|scandals?|embezzl\w*)\b",
        ),
        TopicRule::new(
            2,
            "governance",
            Topic::Reform,
            r"(?i)\b(reform\w*|parliament|parlimen|courts?|mahkamah|laws?|undang|constitution\w*|judicia\w*|institution\w*|elections?|pilihan raya)\b",
        ),
        TopicRule::new(
            3,
            "identity",
            Topic::MalayRights,
            r"(?i)\b(3r|race|racial|kaum|religion|agama|royal\w*|raja|bumiputera|malay rights|hak melayu|ketuanan|vernacular)\b",
        ),
        TopicRule::new(
            4,
            "service",
            Topic::Education,
            r"(?i)\b(schools?|sekolah|universit\w*|exams?|spm|teachers?|cikgu|students?|pelajar|education|pendidikan|ptptn)\b",
        ),
        TopicRule::new(
            5,
            "leadership",
            Topic::Leadership,
            r"(?i)\b(pm|prime minister|perdana menteri|anwar|ministers?|menteri|leaders?\w*|pemimpin|politic\w*|cabinet|kabinet|government|kerajaan)\b",
        ),
    ]
});

/// Return the topic of the first hierarchy rule matching `text`.
#[must_use]
pub fn classify_by_hierarchy(text: &str) -> Option<Topic> {
    TOPIC_RULES.iter().find(|r| r.matches(text)).map(|r| r.topic)
}
