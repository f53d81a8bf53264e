//! Turns raw reference records into a searchable, parameterised index.
//!
//! The pipeline, in order:
//!
//! 1. normalise every value and give each record an identifier, mirrored in
//!    the network's root observable
//! 2. run derivations, with the record's parent chain as context
//! 3. number the containment tree as nested sets
//! 4. weigh each record through the weighting policy
//! 5. add search aliases from the network's index modifiers
//! 6. estimate and pack each record's probability parameters

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::analysis::{DefaultWeightPolicy, ParameterAnalyser, WeightPolicy};
use crate::config::MatchOptions;
use crate::error::{EvalResult, StoreError, StoreResult};
use crate::expr::DeriveContext;
use crate::infer::CompiledNetwork;
use crate::network::Network;
use crate::record::linnaean::terms;
use crate::record::{Classification, Classifier, Record, RecordMut};
use crate::value::Value;

use super::MemoryIndex;

/// Longest parent chain followed when collecting ancestors.
const MAX_ANCESTRY: usize = 64;

pub struct IndexBuilder {
    compiled: Arc<CompiledNetwork>,
    policy: Box<dyn WeightPolicy>,
    options: MatchOptions,
    weight_observable: String,
    records: Vec<Classifier>,
}

impl IndexBuilder {
    /// A builder using the default weighting policy and default options,
    /// so fuzzy derivations such as phonetic codes are stored.
    pub fn new(compiled: Arc<CompiledNetwork>) -> Self {
        Self {
            compiled,
            policy: Box::new(DefaultWeightPolicy::default()),
            options: MatchOptions::default(),
            weight_observable: terms::WEIGHT.to_string(),
            records: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: impl WeightPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn add(&mut self, record: Classifier) {
        self.records.push(record);
    }

    pub fn add_classification<C: Classification>(&mut self, classification: &C) {
        self.records.push(classification.to_classifier());
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Classifier>) {
        self.records.extend(records);
    }

    /// Queue the records of a JSON array of classifiers.
    pub fn add_json(&mut self, text: &str) -> StoreResult<usize> {
        let records: Vec<Classifier> = serde_json::from_str(text).map_err(|e| StoreError::Corpus {
            message: e.to_string(),
        })?;
        let count = records.len();
        self.records.extend(records);
        Ok(count)
    }

    pub fn load_json(&mut self, path: &Path) -> StoreResult<usize> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::Corpus {
            message: format!("{}: {e}", path.display()),
        })?;
        self.add_json(&text)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn build(self) -> StoreResult<MemoryIndex> {
        use rayon::prelude::*;

        let network = self.compiled.shared_network();
        let root = network.observables()[self.compiled.root()].id.clone();
        let queued = self.records.len();

        let mut records = Vec::with_capacity(queued);
        let mut seen = BTreeSet::new();
        for record in self.records {
            match prepare(&network, &root, record) {
                Ok(record) => {
                    let id = record.identifier().unwrap_or_default().to_string();
                    if seen.insert(id.clone()) {
                        records.push(record);
                    } else {
                        tracing::warn!(id = %id, "duplicate record skipped");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "record skipped during normalisation"),
            }
        }

        let by_id: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.identifier().map(|id| (id.to_string(), i)))
            .collect();
        let parents: Vec<Option<usize>> = records
            .iter()
            .map(|r| {
                r.text_of(terms::PARENT_NAME_USAGE_ID)
                    .and_then(|p| by_id.get(&p).copied())
            })
            .collect();

        let options = self.options;
        let derived: Vec<Classifier> = (0..records.len())
            .into_par_iter()
            .map(|i| {
                let chain = ancestry(&parents, i);
                let ancestors: Vec<&dyn Record> =
                    chain.iter().map(|&a| &records[a] as &dyn Record).collect();
                let mut record = records[i].clone();
                if let Err(e) = network.infer(&mut record, &options, &ancestors, false) {
                    tracing::warn!(id = ?records[i].identifier(), error = %e, "derivation failed");
                    return records[i].clone();
                }
                record
            })
            .collect();
        let mut records = derived;

        let unplaced = number_nested_sets(&mut records, &parents);
        if unplaced > 0 {
            tracing::warn!(unplaced, "records on a parent cycle left without a nested-set range");
        }

        let ctx = DeriveContext::new(&network, &options);
        for record in &mut records {
            let weight = self.policy.weight(record);
            record
                .set_values(&self.weight_observable, vec![Value::Decimal(weight)])
                .map_err(|e| StoreError::Corpus {
                    message: e.to_string(),
                })?;
            add_aliases(&network, &ctx, record);
        }

        let mut index = MemoryIndex::new(Arc::clone(&network), records)
            .with_weight_observable(self.weight_observable.clone());
        let analyser = ParameterAnalyser::new(&index)?;
        let compiled = &self.compiled;
        let packed: Vec<StoreResult<Vec<u8>>> = index
            .records()
            .par_iter()
            .map(|record| {
                let id = record.identifier().unwrap_or_default();
                analyser.estimate(compiled, record)?.pack(id)
            })
            .collect();
        let total = analyser.total_weight();
        drop(analyser);
        for (position, parameters) in packed.into_iter().enumerate() {
            index.set_parameters(position, parameters?);
        }

        tracing::info!(
            network = network.id(),
            queued,
            indexed = index.len(),
            total_weight = total,
            parameters = compiled.parameter_count(),
            "index built"
        );
        Ok(index)
    }
}

/// Normalise values, then settle the identifier: the root observable's value
/// wins, then an existing identifier, then a fresh one.
fn prepare(network: &Network, root: &str, record: Classifier) -> EvalResult<Classifier> {
    let mut record = record;
    let observables: Vec<String> = record.observables().map(str::to_string).collect();
    for id in observables {
        let values = network.normalise_all(&id, record.values_of(&id))?;
        record.set_values(&id, values)?;
    }
    let id = match record.text_of(root) {
        Some(id) => id,
        None => record.identify().to_string(),
    };
    let mut record = record.with_identifier(id.clone());
    record.set_values(root, vec![Value::Text(id)])?;
    Ok(record)
}

/// Positions of a record's ancestors, nearest first. Stops at a cycle.
fn ancestry(parents: &[Option<usize>], start: usize) -> Vec<usize> {
    let mut chain = Vec::new();
    let mut current = parents[start];
    while let Some(p) = current {
        if p == start || chain.contains(&p) || chain.len() == MAX_ANCESTRY {
            break;
        }
        chain.push(p);
        current = parents[p];
    }
    chain
}

/// Assign `(left, right)` ranges by depth-first walk from every record
/// without a known parent. Returns how many records were not reached.
fn number_nested_sets(records: &mut [Classifier], parents: &[Option<usize>]) -> usize {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) if *p != i => children[*p].push(i),
            _ => roots.push(i),
        }
    }
    for list in &mut children {
        list.sort_by(|a, b| records[*a].identifier().cmp(&records[*b].identifier()));
    }

    let mut ranges: Vec<Option<(i64, i64)>> = vec![None; records.len()];
    let mut counter = 0i64;
    for root in roots {
        let mut stack = vec![(root, false)];
        while let Some((v, closing)) = stack.pop() {
            if closing {
                if let Some((left, _)) = ranges[v] {
                    ranges[v] = Some((left, counter));
                }
                counter += 1;
                continue;
            }
            ranges[v] = Some((counter, counter));
            counter += 1;
            stack.push((v, true));
            for &c in children[v].iter().rev() {
                stack.push((c, false));
            }
        }
    }

    let mut unplaced = 0;
    for (record, range) in records.iter_mut().zip(ranges) {
        match range {
            Some((left, right)) => record.set_index(left, right),
            None => unplaced += 1,
        }
    }
    unplaced
}

/// Run the index modifiers and keep the names they produce as aliases.
fn add_aliases(network: &Network, ctx: &DeriveContext<'_>, record: &mut Classifier) {
    for rule in network.index_modifiers() {
        let modified = match rule.apply(&*record, ctx) {
            Ok(Some(modified)) => modified,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(rule = %rule.id, id = ?record.identifier(), error = %e, "index modifier failed");
                continue;
            }
        };
        for name in modified.values_of(terms::SCIENTIFIC_NAME) {
            if let Value::Text(text) = &name {
                record.add_name(text.clone());
            }
            record.add(terms::SCIENTIFIC_NAME, name);
        }
    }
}
