//! Match results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infer::Inference;
use crate::record::{Classification, Classifier};

use super::issue::{Issue, Issues};

/// Counters for one `find_match` call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchMeasurement {
    /// Candidates returned by the searcher, over every attempt.
    pub candidates: usize,
    /// Candidates that passed the pre-filter and were scored.
    pub scored: usize,
    /// Scored candidates above the possible threshold.
    pub possible: usize,
    /// Modified queries tried after the first attempt failed.
    pub modifications: usize,
    pub elapsed: Duration,
}

/// The outcome of a match request.
///
/// A match is either absent ([`Match::none`]), found but unusable
/// (`valid == false` with issues explaining why), or valid, possibly with
/// issues describing caveats. Issues only ever accumulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match<C: Classification> {
    matched: Option<C>,
    candidate: Option<Classifier>,
    accepted: Option<C>,
    accepted_candidate: Option<Classifier>,
    inference: Inference,
    issues: Issues,
    valid: bool,
    #[serde(default)]
    measurement: Option<MatchMeasurement>,
}

impl<C: Classification> Match<C> {
    pub fn new(
        matched: C,
        candidate: Classifier,
        accepted: C,
        accepted_candidate: Classifier,
        inference: Inference,
    ) -> Self {
        Self {
            matched: Some(matched),
            candidate: Some(candidate),
            accepted: Some(accepted),
            accepted_candidate: Some(accepted_candidate),
            inference,
            issues: Issues::new(),
            valid: true,
            measurement: None,
        }
    }

    /// Nothing found.
    pub fn none() -> Self {
        Self::invalid(Issues::new())
    }

    /// Found, but not safely resolvable.
    pub fn invalid(issues: Issues) -> Self {
        Self {
            matched: None,
            candidate: None,
            accepted: None,
            accepted_candidate: None,
            inference: Inference::none(),
            issues,
            valid: false,
            measurement: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn matched(&self) -> Option<&C> {
        self.matched.as_ref()
    }

    /// The stored record the match came from.
    pub fn candidate(&self) -> Option<&Classifier> {
        self.candidate.as_ref()
    }

    /// The accepted classification; the matched one unless it is a synonym.
    pub fn accepted(&self) -> Option<&C> {
        self.accepted.as_ref()
    }

    pub fn accepted_candidate(&self) -> Option<&Classifier> {
        self.accepted_candidate.as_ref()
    }

    pub fn inference(&self) -> &Inference {
        &self.inference
    }

    /// Posterior probability of the match.
    pub fn probability(&self) -> f64 {
        self.inference.posterior
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }

    pub fn measurement(&self) -> Option<&MatchMeasurement> {
        self.measurement.as_ref()
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.add(issue);
        self
    }

    pub fn with_issues(mut self, issues: &Issues) -> Self {
        self.issues.merge(issues);
        self
    }

    pub fn with_inference(mut self, inference: Inference) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_measurement(mut self, measurement: MatchMeasurement) -> Self {
        self.measurement = Some(measurement);
        self
    }

    /// Whether the matched record's accepted identifier equals `other`'s.
    pub(crate) fn same_accepted(&self, other: &Match<C>) -> bool {
        let id = |m: &Match<C>| m.accepted.as_ref().and_then(Classification::identifier);
        id(self).is_some() && id(self) == id(other)
    }
}

impl<C: Classification> std::fmt::Display for Match<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = |c: Option<&C>| c.and_then(Classification::scientific_name);
        match name(self.matched()) {
            Some(matched) => {
                write!(f, "{matched}")?;
                if let Some(accepted) = name(self.accepted()).filter(|a| *a != matched) {
                    write!(f, " -> {accepted}")?;
                }
                write!(f, " ({:.4})", self.probability())?;
            }
            None => f.write_str("no match")?,
        }
        if !self.valid {
            f.write_str(" invalid")?;
        }
        if !self.issues.is_empty() {
            write!(f, " {}", self.issues)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LinnaeanClassification, TaxonomicStatus};

    fn sample() -> Match<LinnaeanClassification> {
        let matched = LinnaeanClassification::named("Acacia dealbata")
            .with_id("t1")
            .with_status(TaxonomicStatus::Synonym);
        let accepted = LinnaeanClassification::named("Racosperma dealbatum").with_id("t2");
        Match::new(
            matched.clone(),
            matched.to_classifier(),
            accepted.clone(),
            accepted.to_classifier(),
            Inference::for_pec(0.5, 0.5, 0.9),
        )
    }

    #[test]
    fn none_is_invalid_and_empty() {
        let m = Match::<LinnaeanClassification>::none();
        assert!(!m.is_valid());
        assert!(m.matched().is_none());
        assert!(m.issues().is_empty());
        assert_eq!(m.to_string(), "no match invalid");
    }

    #[test]
    fn issues_accumulate() {
        let m = sample()
            .with_issue(Issue::MultipleMatches)
            .with_issue(Issue::PossibleMisspelling);
        assert!(m.issues().contains(Issue::MultipleMatches));
        assert_eq!(m.issues().len(), 2);
        assert!(m.is_valid());
    }

    #[test]
    fn display_shows_accepted_name() {
        let text = sample().to_string();
        assert!(text.starts_with("Acacia dealbata -> Racosperma dealbatum"));
    }
}
