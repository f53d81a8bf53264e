//! Record weighting policies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::{Classifier, Record};

/// Smallest weight a policy hands out; every record counts for something.
pub const MIN_WEIGHT: f64 = 1.0e-3;

/// Assigns each stored record a positive weight.
pub trait WeightPolicy: Send + Sync {
    fn weight(&self, classifier: &Classifier) -> f64;
}

/// Settings for [`DefaultWeightPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub default_weight: f64,
    /// Observable holding an explicit weight, which wins outright.
    pub weight_observable: String,
    /// Observable holding an integer priority, scaled logarithmically.
    pub priority_observable: String,
    pub status_observable: String,
    pub rank_observable: String,
    /// Multipliers keyed by status term.
    pub status_multipliers: BTreeMap<String, f64>,
    /// Multipliers keyed by rank term.
    pub rank_multipliers: BTreeMap<String, f64>,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            default_weight: 1.0,
            weight_observable: "weight".into(),
            priority_observable: "priority".into(),
            status_observable: "taxonomicStatus".into(),
            rank_observable: "taxonRank".into(),
            status_multipliers: BTreeMap::new(),
            rank_multipliers: BTreeMap::new(),
        }
    }
}

impl WeightConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        if !(config.default_weight > 0.0) {
            return Err(ConfigError::Invalid {
                message: format!("default_weight must be positive, got {}", config.default_weight),
            });
        }
        if let Some((term, m)) = config
            .status_multipliers
            .iter()
            .chain(&config.rank_multipliers)
            .find(|(_, m)| !(**m > 0.0))
        {
            return Err(ConfigError::Invalid {
                message: format!("multiplier for {term} must be positive, got {m}"),
            });
        }
        Ok(config)
    }
}

/// 1.0 unless stated otherwise; priority scales the weight by
/// `1 + ln(priority)`, then status and rank multipliers apply.
#[derive(Debug, Clone, Default)]
pub struct DefaultWeightPolicy {
    config: WeightConfig,
}

impl DefaultWeightPolicy {
    pub fn new(config: WeightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }
}

impl WeightPolicy for DefaultWeightPolicy {
    fn weight(&self, classifier: &Classifier) -> f64 {
        let config = &self.config;
        if let Some(explicit) = classifier
            .value_of(&config.weight_observable)
            .and_then(|v| v.as_f64())
            .filter(|w| *w > 0.0)
        {
            return explicit;
        }

        let mut weight = config.default_weight;
        if let Some(priority) = classifier
            .value_of(&config.priority_observable)
            .and_then(|v| v.as_i64())
            .filter(|p| *p > 0)
        {
            weight *= 1.0 + (priority as f64).ln();
        }
        let multiplier = |table: &BTreeMap<String, f64>, observable: &str| {
            classifier
                .text_of(observable)
                .and_then(|term| {
                    table
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&term))
                        .map(|(_, m)| *m)
                })
                .unwrap_or(1.0)
        };
        weight *= multiplier(&config.status_multipliers, &config.status_observable);
        weight *= multiplier(&config.rank_multipliers, &config.rank_observable);
        weight.max(MIN_WEIGHT)
    }
}
