//! Versioned archetype weight table.
//!
//! Changing any weight changes the comparability of historical impact scores,
//! so the table carries an explicit `version` that is stored next to every
//! score it produced.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::taxonomy::{Archetype, TopicMode};
use crate::ConfigError;

fn default_identity_risk_multiplier() -> f64 {
    1.5
}

fn default_true() -> bool {
    true
}

/// Virality bonus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Views per hour above which the bonus applies (strictly greater).
    pub threshold: f64,
    pub bonus: f64,
    /// Floor on content age so brand-new content does not divide by ~0.
    pub min_age_hours: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10_000.0,
            bonus: 1.2,
            min_age_hours: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub version: u32,
    pub archetypes: BTreeMap<Archetype, f64>,
    #[serde(default = "default_identity_risk_multiplier")]
    pub identity_risk_multiplier: f64,
    #[serde(default = "default_true")]
    pub identity_risk_enabled: bool,
    #[serde(default)]
    pub velocity: VelocityConfig,
    #[serde(default)]
    pub topic_mode: TopicMode,
}

impl Default for WeightTable {
    fn default() -> Self {
        let archetypes = BTreeMap::from([
            (Archetype::HeartlandConservative, 2.5),
            (Archetype::EconomicPragmatist, 1.5),
            (Archetype::UrbanReformist, 1.0),
            (Archetype::DigitalCynic, 0.5),
        ]);
        Self {
            version: 1,
            archetypes,
            identity_risk_multiplier: default_identity_risk_multiplier(),
            identity_risk_enabled: true,
            velocity: VelocityConfig::default(),
            topic_mode: TopicMode::Label,
        }
    }
}

impl WeightTable {
    /// Weight for an archetype.
    ///
    /// Validated tables always contain every archetype; a missing entry
    /// falls back to the fallback archetype's weight.
    #[must_use]
    pub fn weight(&self, archetype: Archetype) -> f64 {
        self.archetypes
            .get(&archetype)
            .or_else(|| self.archetypes.get(&Archetype::FALLBACK))
            .copied()
            .unwrap_or(0.0)
    }

    /// Hex SHA-256 over the canonical YAML rendering of the table.
    ///
    /// Two tables with the same version but different fingerprints indicate
    /// an edit that forgot to bump `version`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_yaml::to_string(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }
}

/// Load and validate a weight table from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_weights(path: &Path) -> Result<WeightTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::WeightsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_weights(&content)
}

/// Parse and validate a weight table from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_weights(content: &str) -> Result<WeightTable, ConfigError> {
    let table: WeightTable =
        serde_yaml::from_str(content).map_err(ConfigError::WeightsFileParse)?;
    validate_weights(&table)?;
    Ok(table)
}

fn validate_weights(table: &WeightTable) -> Result<(), ConfigError> {
    if table.version == 0 {
        return Err(ConfigError::Validation(
            "weight table version must be at least 1".to_string(),
        ));
    }

    for archetype in Archetype::ALL {
        match table.archetypes.get(&archetype) {
            None => {
                return Err(ConfigError::Validation(format!(
                    "weight table is missing archetype '{archetype}'"
                )));
            }
            Some(w) if !w.is_finite() || *w <= 0.0 => {
                return Err(ConfigError::Validation(format!(
                    "archetype '{archetype}' has invalid weight {w}; must be positive"
                )));
            }
            Some(_) => {}
        }
    }

    let fallback = table.weight(Archetype::FALLBACK);
    let undercut = Archetype::ALL
        .into_iter()
        .filter(|a| *a != Archetype::FALLBACK)
        .find(|a| table.weight(*a) <= fallback);
    if let Some(a) = undercut {
        return Err(ConfigError::Validation(format!(
            "fallback archetype '{}' must have the lowest weight, but '{a}' is not higher",
            Archetype::FALLBACK
        )));
    }

    if !table.identity_risk_multiplier.is_finite() || table.identity_risk_multiplier <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "identity_risk_multiplier must be positive, got {}",
            table.identity_risk_multiplier
        )));
    }

    let v = &table.velocity;
    if !(v.threshold.is_finite() && v.threshold >= 0.0) {
        return Err(ConfigError::Validation(format!(
            "velocity.threshold must be non-negative, got {}",
            v.threshold
        )));
    }
    if !(v.bonus.is_finite() && v.bonus > 0.0) {
        return Err(ConfigError::Validation(format!(
            "velocity.bonus must be positive, got {}",
            v.bonus
        )));
    }
    if !(v.min_age_hours.is_finite() && v.min_age_hours > 0.0) {
        return Err(ConfigError::Validation(format!(
            "velocity.min_age_hours must be positive, got {}",
            v.min_age_hours
        )));
    }

    Ok(())
}

#[cfg(test)]
#[path = "weights_test.rs"]
mod tests;
