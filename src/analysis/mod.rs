//! Corpus-driven parameter estimation.
//!
//! Probabilities are weighted counts over the reference corpus:
//!
//! - prior = w(records satisfying the fact) / w(all records)
//! - conditional = w(records satisfying fact and inputs) / w(records satisfying inputs)
//!
//! Every estimate is clamped into `[MIN_PROBABILITY, MAX_PROBABILITY]` so a
//! single missing example can never zero out (or saturate) a posterior.

pub mod weight;

pub use weight::{DefaultWeightPolicy, WeightConfig, WeightPolicy};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::infer::{CompiledNetwork, Parameters};
use crate::record::{Classifier, Record};
use crate::value::Value;

/// Smallest probability the analyser ever reports.
pub const MIN_PROBABILITY: f64 = 1.0e-6;

/// Largest probability the analyser ever reports.
pub const MAX_PROBABILITY: f64 = 1.0 - MIN_PROBABILITY;

/// One term of a corpus query: "the observable agrees with these values".
///
/// An empty value list stands for "the observable is absent". A negated
/// fact holds for exactly the records the plain fact does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub observable: String,
    pub values: Vec<Value>,
    #[serde(default)]
    pub negated: bool,
}

impl Fact {
    pub fn is(observable: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            observable: observable.into(),
            values,
            negated: false,
        }
    }

    pub fn not(observable: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            negated: true,
            ..Self::is(observable, values)
        }
    }

    fn key(&self) -> FactKey {
        let values = self
            .values
            .iter()
            .map(|v| (v.kind(), v.to_string()))
            .collect();
        (self.negated, self.observable.clone(), values)
    }
}

/// Cache key of one fact: negation, observable, then each value with its kind.
type FactKey = (bool, String, Vec<(&'static str, String)>);

/// Weighted access to the reference corpus.
pub trait WeightedCorpus: Send + Sync {
    /// Total weight of the records satisfying every fact. An empty fact list
    /// matches the whole corpus.
    fn sum_weight(&self, facts: &[Fact]) -> StoreResult<f64>;
}

fn clamp(p: f64) -> f64 {
    p.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

/// Estimates priors and conditionals from a weighted corpus.
///
/// The total corpus weight is read once at construction; build a new
/// analyser to pick up corpus changes. Sums are cached and the cache is
/// shared between threads.
pub struct ParameterAnalyser<'a, W: WeightedCorpus + ?Sized> {
    corpus: &'a W,
    total: f64,
    cache: DashMap<Vec<FactKey>, f64>,
}

impl<'a, W: WeightedCorpus + ?Sized> ParameterAnalyser<'a, W> {
    pub fn new(corpus: &'a W) -> StoreResult<Self> {
        let total = corpus.sum_weight(&[])?;
        Ok(Self {
            corpus,
            total,
            cache: DashMap::new(),
        })
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    fn weight(&self, facts: &[Fact]) -> StoreResult<f64> {
        let mut key: Vec<FactKey> = facts.iter().map(Fact::key).collect();
        key.sort();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(*hit);
        }
        let sum = self.corpus.sum_weight(facts)?;
        self.cache.insert(key, sum);
        Ok(sum)
    }

    /// P(fact) over the corpus.
    pub fn compute_prior(&self, fact: &Fact) -> StoreResult<f64> {
        if self.total < MIN_PROBABILITY {
            return Ok(MIN_PROBABILITY);
        }
        Ok(clamp(self.weight(std::slice::from_ref(fact))? / self.total))
    }

    /// P(fact | inputs) over the corpus.
    pub fn compute_conditional(&self, fact: &Fact, inputs: &[Fact]) -> StoreResult<f64> {
        let denominator = self.weight(inputs)?;
        if denominator < MIN_PROBABILITY {
            return Ok(MIN_PROBABILITY);
        }
        let mut joint = inputs.to_vec();
        joint.push(fact.clone());
        Ok(clamp(self.weight(&joint)? / denominator))
    }

    /// Estimate the full parameter table of one candidate.
    pub fn estimate(&self, compiled: &CompiledNetwork, candidate: &Classifier) -> StoreResult<Parameters> {
        let observables = compiled.network().observables();
        let root = compiled.root();
        let fact = |vertex: usize, agree: bool| {
            let id = &observables[vertex].id;
            let mut values = candidate.values_of(id);
            if vertex == root && values.is_empty() {
                values.extend(candidate.identifier().map(Value::from));
            }
            if agree {
                Fact::is(id.clone(), values)
            } else {
                Fact::not(id.clone(), values)
            }
        };

        let mut values = Vec::with_capacity(compiled.parameter_count());
        values.push(self.compute_prior(&fact(root, true))?);
        for &vertex in compiled.vertices() {
            if vertex == root {
                continue;
            }
            let parents = compiled.parents_of(vertex);
            let target = fact(vertex, true);
            for index in 0..(1usize << parents.len()) {
                let inputs: Vec<Fact> = parents
                    .iter()
                    .enumerate()
                    .map(|(j, &p)| fact(p, index & (1 << j) != 0))
                    .collect();
                values.push(self.compute_conditional(&target, &inputs)?);
            }
        }
        Ok(Parameters::new(values))
    }
}
