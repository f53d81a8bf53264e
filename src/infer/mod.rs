//! Match probabilities.
//!
//! An [`Inference`] is the (prior, conditional, evidence, posterior)
//! quadruple for one candidate. [`CompiledNetwork`] computes it from the
//! per-candidate [`Parameters`] for whatever evidence the query and the
//! candidate have in common.

pub mod compiled;
pub mod parameters;

pub use compiled::{CompiledNetwork, ErasureGroup, Signature};
pub use parameters::Parameters;

use serde::{Deserialize, Serialize};

/// Probability summary of a candidate match.
///
/// `posterior = conditional * prior / evidence` holds for every value built
/// through the constructors and combinators here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Inference {
    /// P(H): the candidate is the right record before looking at evidence.
    pub prior: f64,
    /// P(E | H).
    pub conditional: f64,
    /// P(E).
    pub evidence: f64,
    /// P(H | E).
    pub posterior: f64,
}

impl Inference {
    /// Build from prior, evidence and conditional, deriving the posterior.
    pub fn for_pec(prior: f64, evidence: f64, conditional: f64) -> Self {
        let posterior = if evidence > 0.0 {
            (conditional * prior / evidence).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            prior,
            conditional,
            evidence,
            posterior,
        }
    }

    /// Build from the joint probabilities of evidence with and without the
    /// hypothesis.
    pub fn from_joint(prior: f64, with_h: f64, without_h: f64) -> Self {
        let evidence = with_h + without_h;
        let conditional = if prior > 0.0 { with_h / prior } else { 0.0 };
        let posterior = if evidence > 0.0 { with_h / evidence } else { 0.0 };
        Self {
            prior,
            conditional,
            evidence,
            posterior,
        }
    }

    /// The inference of "no match at all".
    pub fn none() -> Self {
        Self::default()
    }

    /// Both hypotheses hold, assuming independence.
    pub fn and(&self, other: &Inference) -> Self {
        Self::for_pec(
            self.prior * other.prior,
            self.evidence * other.evidence,
            self.conditional * other.conditional,
        )
    }

    /// Either hypothesis holds, assuming independence. Used to fold
    /// candidates that stand for the same taxon into one match.
    pub fn or(&self, other: &Inference) -> Self {
        let union = |a: f64, b: f64| a + b - a * b;
        let prior = union(self.prior, other.prior);
        let evidence = union(self.evidence, other.evidence);
        let posterior = union(self.posterior, other.posterior);
        let conditional = if prior > 0.0 {
            posterior * evidence / prior
        } else {
            0.0
        };
        Self {
            prior,
            conditional,
            evidence,
            posterior,
        }
    }
}

impl std::fmt::Display for Inference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "posterior={:.4} prior={:.4} conditional={:.4} evidence={:.6}",
            self.posterior, self.prior, self.conditional, self.evidence
        )
    }
}
