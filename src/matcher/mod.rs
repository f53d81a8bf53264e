//! The classification matcher.
//!
//! A match request runs: infer the query, check it has a compiled procedure,
//! search, pre-filter, score every surviving candidate, keep the possible
//! ones, annotate, rank and disambiguate. When nothing usable comes back and
//! the options allow it, the network's match modifiers rewrite the query and
//! the search runs again, one modifier at a time.
//!
//! Store failures abort the request. Evaluation failures only disqualify the
//! candidate that caused them.

pub mod annotate;
pub mod disambiguate;
pub mod issue;
pub mod result;

pub use issue::{Issue, Issues};
pub use result::{Match, MatchMeasurement};

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{MatchOptions, MatcherConfig};
use crate::error::{EvalError, MatchError, MatchResult};
use crate::expr::DeriveContext;
use crate::infer::{CompiledNetwork, Inference};
use crate::index::Searcher;
use crate::record::linnaean::terms;
use crate::record::{Classification, Classifier, Record};

/// Matches queries of type `C` against the records behind a searcher.
///
/// Holds no per-request state, so one matcher can serve concurrent calls.
pub struct ClassificationMatcher<C: Classification, S: Searcher<C>> {
    compiled: Arc<CompiledNetwork>,
    searcher: S,
    config: MatcherConfig,
    _query: PhantomData<fn() -> C>,
}

impl<C: Classification, S: Searcher<C>> ClassificationMatcher<C, S> {
    /// Fails when the network cannot serve `C` or the configuration is invalid.
    pub fn new(compiled: Arc<CompiledNetwork>, searcher: S, config: MatcherConfig) -> MatchResult<Self> {
        C::check_network(compiled.network())?;
        config.validate()?;
        Ok(Self {
            compiled,
            searcher,
            config,
            _query: PhantomData,
        })
    }

    pub fn compiled(&self) -> &CompiledNetwork {
        &self.compiled
    }

    pub fn searcher(&self) -> &S {
        &self.searcher
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Find the best supported match for `query`.
    pub fn find_match(&self, query: &C, options: &MatchOptions) -> MatchResult<Match<C>> {
        let started = Instant::now();
        let mut stats = MatchMeasurement::default();
        let network = self.compiled.network();

        let mut query = query.clone();
        query.infer(network, options)?;
        self.compiled.check_query(&query)?;
        let mut result = self.find_source(&query, &mut stats)?;

        if !result.is_valid() && result.issues().is_empty() && options.modify_query {
            let ctx = DeriveContext::new(network, options);
            for rule in network.match_modifiers() {
                let mut modified = match rule.apply(&query, &ctx) {
                    Ok(Some(modified)) => modified,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!(rule = %rule.id, error = %e, "match modifier failed");
                        continue;
                    }
                };
                stats.modifications += 1;
                if let Err(e) = modified.infer(network, options) {
                    tracing::debug!(rule = %rule.id, error = %e, "modified query rejected");
                    continue;
                }
                if let Err(e) = self.compiled.check_query(&modified) {
                    tracing::debug!(rule = %rule.id, error = %e, "modified query has no procedure");
                    continue;
                }
                tracing::debug!(rule = %rule.id, "retrying with modified query");
                let found = self.find_source(&modified, &mut stats)?;
                if found.is_valid() {
                    result = match rule.issue {
                        Some(issue) => found.with_issue(issue),
                        None => found,
                    };
                    break;
                }
            }
        }

        if options.collect_statistics {
            stats.elapsed = started.elapsed();
            result = result.with_measurement(stats);
        }
        Ok(result)
    }

    /// One search-score-disambiguate pass for an inferred query.
    fn find_source(&self, query: &C, stats: &mut MatchMeasurement) -> MatchResult<Match<C>> {
        let mut candidates = self.searcher.search(query)?;
        candidates.truncate(self.config.max_candidates);
        stats.candidates += candidates.len();
        if candidates.is_empty() {
            return Ok(Match::none());
        }

        let mut possible = Vec::new();
        for candidate in candidates {
            if !self.is_valid_candidate(query, &candidate) {
                tracing::trace!(candidate = ?candidate.identifier(), "rejected by pre-filter");
                continue;
            }
            let parameters = self.compiled.unpack(&candidate)?;
            let inference = match self.compiled.evaluate(query, &candidate, &parameters) {
                Ok(inference) => inference,
                Err(e) => {
                    tracing::debug!(candidate = ?candidate.identifier(), error = %e, "candidate not scored");
                    continue;
                }
            };
            stats.scored += 1;
            if inference.posterior < self.config.possible_threshold {
                continue;
            }
            if let Some(found) = self.build_match(candidate, inference)? {
                possible.push(found);
            }
        }
        stats.possible += possible.len();

        annotate::annotate(&mut possible);
        let mut usable: Vec<Match<C>> = possible
            .into_iter()
            .filter(|m| !m.issues().is_bad())
            .collect();
        disambiguate::rank(&mut usable, self.config.tie_delta);
        Ok(disambiguate::find_single(
            usable,
            &self.config,
            self.compiled.network(),
            &self.searcher,
        )?)
    }

    /// Cheap rejection: the first words of the names must sound alike.
    fn is_valid_candidate(&self, query: &C, candidate: &Classifier) -> bool {
        let phonetic = self.compiled.network().phonetic();
        let first_word = |code: String| code.split(' ').next().map(str::to_string);
        let query_key = query
            .phonetic_name()
            .and_then(first_word)
            .or_else(|| query.scientific_name().and_then(|n| phonetic.encode_prefix(&n).ok()));
        let candidate_key = candidate
            .text_of(terms::SOUNDEX_SCIENTIFIC_NAME)
            .and_then(first_word)
            .or_else(|| {
                candidate
                    .text_of(terms::SCIENTIFIC_NAME)
                    .and_then(|n| phonetic.encode_prefix(&n).ok())
            });
        match (query_key, candidate_key) {
            (Some(q), Some(c)) => q == c,
            _ => true,
        }
    }

    fn build_match(&self, candidate: Classifier, inference: Inference) -> MatchResult<Option<Match<C>>> {
        let (accepted_candidate, broken) = match self.follow_accepted(&candidate) {
            Ok(accepted) => (accepted, false),
            Err(MatchError::Eval(e)) => {
                tracing::debug!(candidate = ?candidate.identifier(), error = %e, "accepted name unresolved");
                (candidate.clone(), true)
            }
            Err(e) => return Err(e),
        };
        let classifications = C::from_classifier(&candidate)
            .and_then(|m| C::from_classifier(&accepted_candidate).map(|a| (m, a)));
        let (matched, accepted) = match classifications {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(candidate = ?candidate.identifier(), error = %e, "candidate not readable");
                return Ok(None);
            }
        };
        let found = Match::new(matched, candidate, accepted, accepted_candidate, inference);
        Ok(Some(if broken {
            found.with_issue(Issue::MissingAccepted)
        } else {
            found
        }))
    }

    /// Follow accepted-name links to the end of the chain.
    fn follow_accepted(&self, candidate: &Classifier) -> MatchResult<Classifier> {
        let start = candidate.identifier().unwrap_or_default().to_string();
        let mut current = candidate.clone();
        let mut seen = BTreeSet::from([start.clone()]);
        let mut hops = 0;
        loop {
            let next = match current.text_of(terms::ACCEPTED_NAME_USAGE_ID) {
                Some(next) if current.identifier() != Some(next.as_str()) => next,
                _ => return Ok(current),
            };
            if hops == self.config.max_accepted_depth {
                return Err(EvalError::AcceptedChain {
                    id: start,
                    message: format!("more than {hops} links"),
                }
                .into());
            }
            if !seen.insert(next.clone()) {
                return Err(EvalError::AcceptedChain {
                    id: start,
                    message: format!("{next} loops back"),
                }
                .into());
            }
            hops += 1;
            current = match self.searcher.get(candidate.type_tag(), &next)? {
                Some(found) => found,
                None => {
                    return Err(EvalError::AcceptedChain {
                        id: start,
                        message: format!("{next} not found"),
                    }
                    .into());
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NetworkError, StoreError};
    use crate::index::IndexBuilder;
    use crate::network::Network;
    use crate::record::{LinnaeanClassification, TaxonomicStatus};

    fn compiled() -> Arc<CompiledNetwork> {
        Arc::new(CompiledNetwork::compile(Arc::new(Network::linnaean().unwrap())).unwrap())
    }

    fn matcher(
        records: Vec<LinnaeanClassification>,
    ) -> ClassificationMatcher<LinnaeanClassification, crate::index::MemoryIndex> {
        let c = compiled();
        let mut builder = IndexBuilder::new(Arc::clone(&c));
        for r in &records {
            builder.add_classification(r);
        }
        ClassificationMatcher::new(c, builder.build().unwrap(), MatcherConfig::default()).unwrap()
    }

    fn taxon(id: &str, name: &str) -> LinnaeanClassification {
        LinnaeanClassification::named(name)
            .with_id(id)
            .with_rank("species")
            .with_status(TaxonomicStatus::Accepted)
    }

    fn corpus() -> Vec<LinnaeanClassification> {
        vec![
            taxon("t1", "Acacia dealbata"),
            taxon("t2", "Acacia mearnsii"),
            taxon("t3", "Banksia serrata"),
            taxon("t4", "Eucalyptus globulus"),
            taxon("s1", "Racosperma dealbatum")
                .with_status(TaxonomicStatus::Synonym)
                .with_accepted("x9"),
        ]
    }

    #[test]
    fn chain_to_a_missing_record_is_flagged_bad() {
        let m = matcher(corpus());
        let result = m
            .find_match(&LinnaeanClassification::named("Racosperma dealbatum"), &MatchOptions::exact())
            .unwrap();
        assert!(!result.is_valid());
        assert!(result.matched().is_none());
    }

    #[test]
    fn pre_filter_compares_leading_sounds() {
        let m = matcher(corpus());
        let mut query = LinnaeanClassification::named("Acacia dealbata");
        query.infer(m.compiled().network(), &MatchOptions::default()).unwrap();
        let mut same = Classifier::new("Taxon");
        same.add(terms::SCIENTIFIC_NAME, "Acacia mearnsii".into());
        let mut other = Classifier::new("Taxon");
        other.add(terms::SCIENTIFIC_NAME, "Banksia serrata".into());
        assert!(m.is_valid_candidate(&query, &same));
        assert!(!m.is_valid_candidate(&query, &other));
        assert!(m.is_valid_candidate(&LinnaeanClassification::new(), &other));
    }

    #[test]
    fn query_without_name_has_no_procedure() {
        let m = matcher(corpus());
        let query = LinnaeanClassification::new().with_rank("species");
        let err = m.find_match(&query, &MatchOptions::exact()).unwrap_err();
        assert!(matches!(err, MatchError::Network(NetworkError::UnboundSignature { .. })));
    }

    #[test]
    fn statistics_are_collected_on_request() {
        let m = matcher(corpus());
        let options = MatchOptions::default().with_statistics(true);
        let result = m
            .find_match(&LinnaeanClassification::named("Acacia dealbata"), &options)
            .unwrap();
        let stats = result.measurement().unwrap();
        assert!(stats.candidates >= 1);
        assert_eq!(stats.possible, 1);
        assert_eq!(stats.modifications, 0);
        let plain = m
            .find_match(&LinnaeanClassification::named("Acacia dealbata"), &MatchOptions::default())
            .unwrap();
        assert!(plain.measurement().is_none());
    }

    #[test]
    fn unavailable_index_is_a_hard_failure() {
        let m = matcher(corpus());
        m.searcher().set_available(false);
        let err = m
            .find_match(&LinnaeanClassification::named("Acacia dealbata"), &MatchOptions::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::Store(StoreError::Unavailable { .. })));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let c = compiled();
        let index = IndexBuilder::new(Arc::clone(&c)).build().unwrap();
        let config = MatcherConfig {
            max_candidates: 0,
            ..MatcherConfig::default()
        };
        let result = ClassificationMatcher::<LinnaeanClassification, _>::new(c, index, config);
        assert!(matches!(result, Err(MatchError::Config(_))));
    }
}
