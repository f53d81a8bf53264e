//! Conditions: side-effect-free predicates over a record.
//!
//! Evaluation returns `Option<bool>`. `None` means "no constraint": an empty
//! composite, or a composite whose clauses all abstain. Callers must read
//! `None` as "do not filter", never as `true`.

use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::record::Record;
use crate::value::Value;

/// How a presence test combines its observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceMode {
    /// Every listed observable must be present.
    #[default]
    All,
    /// At least one listed observable must be present.
    Any,
}

/// A boolean test over a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Condition {
    /// Presence of one, all or any of a list of observables.
    Present {
        observables: Vec<String>,
        #[serde(default)]
        mode: PresenceMode,
    },
    /// Conjunction of the clauses that do not abstain.
    All { clauses: Vec<Condition> },
    /// Disjunction of the clauses that do not abstain.
    Any { clauses: Vec<Condition> },
    Not { clause: Box<Condition> },
    /// The primary value equals a literal (case-insensitively for text).
    Equals { observable: String, value: Value },
    /// The value's position in the observable's vocabulary lies within
    /// `[min, max]`; either bound may be left open.
    RankRange {
        observable: String,
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
    },
}

impl Condition {
    pub fn present(observable: impl Into<String>) -> Self {
        Self::Present {
            observables: vec![observable.into()],
            mode: PresenceMode::All,
        }
    }

    pub fn equals(observable: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            observable: observable.into(),
            value: value.into(),
        }
    }

    pub fn not(clause: Condition) -> Self {
        Self::Not {
            clause: Box::new(clause),
        }
    }

    /// Evaluate against a record. See the module docs for the meaning of `None`.
    pub fn evaluate(&self, record: &dyn Record, network: &Network) -> Option<bool> {
        match self {
            Self::Present { observables, mode } => {
                let mut present = observables.iter().map(|o| record.has(o));
                Some(match mode {
                    PresenceMode::All => present.all(|p| p),
                    PresenceMode::Any => present.any(|p| p),
                })
            }
            Self::All { clauses } => {
                let results: Vec<bool> = clauses
                    .iter()
                    .filter_map(|c| c.evaluate(record, network))
                    .collect();
                if results.is_empty() {
                    None
                } else {
                    Some(results.into_iter().all(|r| r))
                }
            }
            Self::Any { clauses } => {
                let results: Vec<bool> = clauses
                    .iter()
                    .filter_map(|c| c.evaluate(record, network))
                    .collect();
                if results.is_empty() {
                    None
                } else {
                    Some(results.into_iter().any(|r| r))
                }
            }
            Self::Not { clause } => clause.evaluate(record, network).map(|r| !r),
            Self::Equals { observable, value } => {
                let Some(actual) = record.value_of(observable) else {
                    return Some(false);
                };
                Some(match (&actual, value) {
                    (Value::Text(a), Value::Text(b)) => a.eq_ignore_ascii_case(b),
                    (a, b) => a == b,
                })
            }
            Self::RankRange {
                observable,
                min,
                max,
            } => {
                let Some(term) = record.text_of(observable) else {
                    return Some(false);
                };
                let Some(position) = network.term_order(observable, &term) else {
                    return Some(false);
                };
                let lower = match min {
                    Some(m) => network.term_order(observable, m),
                    None => Some(0),
                };
                let upper = match max {
                    Some(m) => network.term_order(observable, m),
                    None => Some(usize::MAX),
                };
                match (lower, upper) {
                    (Some(lo), Some(hi)) => Some(lo <= position && position <= hi),
                    _ => Some(false),
                }
            }
        }
    }

    /// Whether the condition permits an action: only an explicit `false` blocks.
    pub fn permits(&self, record: &dyn Record, network: &Network) -> bool {
        self.evaluate(record, network) != Some(false)
    }

    /// Observables read by this condition.
    pub fn inputs(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_inputs(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_inputs(&self, out: &mut Vec<String>) {
        match self {
            Self::Present { observables, .. } => out.extend(observables.iter().cloned()),
            Self::All { clauses } | Self::Any { clauses } => {
                for clause in clauses {
                    clause.collect_inputs(out);
                }
            }
            Self::Not { clause } => clause.collect_inputs(out),
            Self::Equals { observable, .. } | Self::RankRange { observable, .. } => {
                out.push(observable.clone())
            }
        }
    }
}
