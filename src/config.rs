//! Matcher configuration and per-request match options.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Thresholds and limits for the classification matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum posterior for a candidate to count as a possible match.
    pub possible_threshold: f64,
    /// Minimum posterior for a candidate to be acceptable during disambiguation.
    pub acceptable_threshold: f64,
    /// Minimum evidence probability for an acceptable candidate.
    pub acceptable_evidence: f64,
    /// Posteriors closer than this are ranked by status preference instead.
    pub tie_delta: f64,
    /// Maximum number of candidates scored per search.
    pub max_candidates: usize,
    /// Synthetic least-upper-bound matches must be strictly coarser than this rank.
    pub synthetic_limit_rank: String,
    /// Maximum number of hops followed along a synonym's accepted chain.
    pub max_accepted_depth: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            possible_threshold: 0.1,
            acceptable_threshold: 0.99,
            acceptable_evidence: 1.0e-4,
            tie_delta: 0.05,
            max_candidates: 100,
            synthetic_limit_rank: "genus".into(),
            max_accepted_depth: 8,
        }
    }
}

impl MatcherConfig {
    /// Parse a configuration from TOML, filling unspecified fields with defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check thresholds are probabilities and ordered sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    message: format!("{name} must be within [0, 1], got {v}"),
                })
            }
        };
        unit("possible_threshold", self.possible_threshold)?;
        unit("acceptable_threshold", self.acceptable_threshold)?;
        unit("acceptable_evidence", self.acceptable_evidence)?;
        unit("tie_delta", self.tie_delta)?;
        if self.acceptable_threshold < self.possible_threshold {
            return Err(ConfigError::Invalid {
                message: "acceptable_threshold must not be below possible_threshold".into(),
            });
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid {
                message: "max_candidates must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// A runtime switch that optional derivations and modifiers can be gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchFlag {
    /// Phonetic and other approximate evidence.
    FuzzyDerivations,
    /// Retrying failed queries with the network's match modifiers.
    ModifyQuery,
    /// Recording match statistics.
    CollectStatistics,
}

impl std::fmt::Display for MatchFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FuzzyDerivations => write!(f, "fuzzy-derivations"),
            Self::ModifyQuery => write!(f, "modify-query"),
            Self::CollectStatistics => write!(f, "collect-statistics"),
        }
    }
}

/// Options supplied with each match request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    pub fuzzy_derivations: bool,
    pub modify_query: bool,
    pub collect_statistics: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            fuzzy_derivations: true,
            modify_query: true,
            collect_statistics: false,
        }
    }
}

impl MatchOptions {
    /// Options with every optional behaviour switched off.
    pub fn exact() -> Self {
        Self {
            fuzzy_derivations: false,
            modify_query: false,
            collect_statistics: false,
        }
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy_derivations = fuzzy;
        self
    }

    pub fn with_statistics(mut self, collect: bool) -> Self {
        self.collect_statistics = collect;
        self
    }

    /// Whether a flag is switched on.
    pub fn allows(&self, flag: MatchFlag) -> bool {
        match flag {
            MatchFlag::FuzzyDerivations => self.fuzzy_derivations,
            MatchFlag::ModifyQuery => self.modify_query,
            MatchFlag::CollectStatistics => self.collect_statistics,
        }
    }

    /// Gate check for an optional rule: `None` means always enabled.
    pub fn permits(&self, gate: Option<MatchFlag>) -> bool {
        gate.is_none_or(|flag| self.allows(flag))
    }
}
