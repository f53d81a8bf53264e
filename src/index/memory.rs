//! A reference in-memory index.
//!
//! Lookups go through hash maps keyed by lowercased name, phonetic code and
//! identifier. Weighted fact counting scans the whole corpus, which is fine
//! for reference data sets and tests but not meant for millions of records.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::analysis::{Fact, WeightedCorpus};
use crate::error::{StoreError, StoreResult};
use crate::network::Network;
use crate::record::linnaean::terms;
use crate::record::{Classification, Classifier, Record};

use super::Searcher;

/// Default bound on the candidates returned by one search.
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

pub struct MemoryIndex {
    network: Arc<Network>,
    records: Vec<Classifier>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_sound: HashMap<String, Vec<usize>>,
    /// Lowercased name prefixes, for autocompletion.
    prefixes: BTreeMap<String, Vec<usize>>,
    weight_observable: String,
    default_weight: f64,
    limit: usize,
    available: AtomicBool,
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("network", &self.network.id())
            .field("records", &self.records.len())
            .field("available", &self.is_available())
            .finish()
    }
}

impl MemoryIndex {
    /// Index `records` as they are. Records without an identifier can be
    /// searched by name but not fetched by id.
    pub fn new(network: Arc<Network>, records: Vec<Classifier>) -> Self {
        let mut index = Self {
            network,
            records: Vec::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            by_sound: HashMap::new(),
            prefixes: BTreeMap::new(),
            weight_observable: terms::WEIGHT.to_string(),
            default_weight: 1.0,
            limit: DEFAULT_SEARCH_LIMIT,
            available: AtomicBool::new(true),
        };
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Load an index previously written with [`MemoryIndex::to_json`].
    pub fn from_json(network: Arc<Network>, text: &str) -> StoreResult<Self> {
        let records: Vec<Classifier> = serde_json::from_str(text).map_err(|e| StoreError::Corpus {
            message: e.to_string(),
        })?;
        Ok(Self::new(network, records))
    }

    pub fn load(network: Arc<Network>, path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::Corpus {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(network, &text)
    }

    /// Every stored record as a JSON array.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(&self.records).map_err(|e| StoreError::Corpus {
            message: e.to_string(),
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Weight given to records that carry none.
    pub fn with_default_weight(mut self, weight: f64) -> Self {
        self.default_weight = weight;
        self
    }

    pub fn with_weight_observable(mut self, observable: impl Into<String>) -> Self {
        self.weight_observable = observable.into();
        self
    }

    fn insert(&mut self, record: Classifier) {
        let position = self.records.len();
        if let Some(id) = record.identifier() {
            if self.by_id.insert(id.to_string(), position).is_some() {
                tracing::warn!(id, "duplicate identifier; later record shadows earlier");
            }
        }

        let mut names: BTreeSet<String> = record
            .values_of(terms::SCIENTIFIC_NAME)
            .iter()
            .filter_map(|v| v.as_str().map(str::to_lowercase))
            .collect();
        names.extend(record.names().iter().map(|n| n.to_lowercase()));
        for name in names {
            self.by_name.entry(name).or_default().push(position);
        }
        for sound in record.values_of(terms::SOUNDEX_SCIENTIFIC_NAME) {
            if let Some(sound) = sound.as_str() {
                self.by_sound.entry(sound.to_string()).or_default().push(position);
            }
        }
        for prefix in record.values_of(terms::NAME_PREFIX) {
            if let Some(prefix) = prefix.as_str() {
                self.prefixes
                    .entry(prefix.to_lowercase())
                    .or_default()
                    .push(position);
            }
        }
        self.records.push(record);
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Classifier] {
        &self.records
    }

    /// Switch the index on or off. An unavailable index fails every lookup.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                message: format!("in-memory index for {} is closed", self.network.id()),
            })
        }
    }

    /// Attach packed parameters to the record at `position`.
    pub(crate) fn set_parameters(&mut self, position: usize, parameters: Vec<u8>) {
        if let Some(record) = self.records.get_mut(position) {
            record.set_parameters(parameters);
        }
    }

    /// Records whose name starts with `prefix`, by name.
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> StoreResult<Vec<&Classifier>> {
        self.check()?;
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        if let Some(positions) = self.prefixes.get(&prefix.to_lowercase()) {
            for &position in positions {
                if out.len() == limit {
                    break;
                }
                if seen.insert(position) {
                    out.push(&self.records[position]);
                }
            }
        }
        out.sort_by_key(|r| r.text_of(terms::SCIENTIFIC_NAME));
        Ok(out)
    }

    fn weight_of(&self, record: &Classifier) -> f64 {
        record
            .value_of(&self.weight_observable)
            .and_then(|v| v.as_f64())
            .unwrap_or(self.default_weight)
    }

    fn satisfies(&self, record: &Classifier, fact: &Fact) -> bool {
        let values = record.values_of(&fact.observable);
        let hit = if fact.values.is_empty() {
            values.is_empty()
        } else {
            let equivalence = self
                .network
                .observable(&fact.observable)
                .map(|o| o.equivalence)
                .unwrap_or_default();
            match equivalence.any_equivalent(&fact.values, &values, self.network.phonetic()) {
                Ok(hit) => hit,
                Err(e) => {
                    tracing::debug!(
                        observable = %fact.observable,
                        error = %e,
                        "comparison failed; counted as disagreement"
                    );
                    false
                }
            }
        };
        hit != fact.negated
    }
}

impl<C: Classification> Searcher<C> for MemoryIndex {
    fn search(&self, query: &C) -> StoreResult<Vec<Classifier>> {
        self.check()?;
        let mut positions: Vec<usize> = Vec::new();
        if let Some(hits) = query
            .scientific_name()
            .and_then(|name| self.by_name.get(&name.to_lowercase()))
        {
            positions.extend(hits);
        }
        if let Some(hits) = query.phonetic_name().and_then(|sound| self.by_sound.get(&sound)) {
            positions.extend(hits);
        }

        let mut seen = BTreeSet::new();
        Ok(positions
            .into_iter()
            .filter(|p| seen.insert(*p))
            .map(|p| &self.records[p])
            .filter(|r| r.type_tag() == C::TYPE)
            .take(self.limit)
            .cloned()
            .collect())
    }

    fn get(&self, type_tag: &str, id: &str) -> StoreResult<Option<Classifier>> {
        self.check()?;
        Ok(self
            .by_id
            .get(id)
            .map(|&p| &self.records[p])
            .filter(|r| r.type_tag() == type_tag)
            .cloned())
    }

    fn close(&self) -> StoreResult<()> {
        self.set_available(false);
        Ok(())
    }
}

impl WeightedCorpus for MemoryIndex {
    fn sum_weight(&self, facts: &[Fact]) -> StoreResult<f64> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .filter(|r| facts.iter().all(|f| self.satisfies(r, f)))
            .map(|r| self.weight_of(r))
            .sum())
    }
}
