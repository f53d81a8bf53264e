//! The observable network: typed attributes plus their dependency DAG.
//!
//! A [`Network`] is built once (from a [`NetworkDefinition`] or a
//! [`NetworkBuilder`]), validated, and never mutated afterwards. Vertices are
//! added in declaration order, so a vertex's `NodeIndex` equals the position
//! of its observable in [`Network::observables`].

pub mod definition;
pub mod horizon;
pub mod observable;

pub use definition::NetworkDefinition;
pub use horizon::{Horizon, compute_horizon};
pub use observable::{Equivalence, Multiplicity, Observable, Style};

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::MatchOptions;
use crate::error::{EvalError, EvalResult, NetworkError, NetworkResult};
use crate::expr::derivation::{DeriveContext, DerivationKind};
use crate::expr::modifier::ModifierRule;
use crate::expr::phonetic::PhoneticEncoder;
use crate::record::{Record, RecordMut};
use crate::value::{Value, ValueType};

/// Maximum number of parents a vertex may have. Conditional tables hold
/// `2^parents` entries.
pub const MAX_PARENTS: usize = 8;

/// A validated, immutable observable network.
#[derive(Debug, Clone)]
pub struct Network {
    id: String,
    type_tag: String,
    description: Option<String>,
    observables: Vec<Observable>,
    positions: HashMap<String, usize>,
    graph: DiGraph<usize, ()>,
    /// Topological order of the dependency graph, ties broken by declaration.
    topo: Vec<usize>,
    /// Order in which derivations must run so their inputs exist first.
    derivation_order: Vec<usize>,
    /// Observables whose derivation reads each observable directly.
    readers: Vec<Vec<usize>>,
    vocabularies: BTreeMap<String, Vec<String>>,
    match_modifiers: Vec<ModifierRule>,
    index_modifiers: Vec<ModifierRule>,
    phonetic: PhoneticEncoder,
}

impl Network {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The record type tag this network describes (e.g. "Taxon").
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn observables(&self) -> &[Observable] {
        &self.observables
    }

    pub fn observable(&self, id: &str) -> Option<&Observable> {
        self.positions.get(id).map(|&i| &self.observables[i])
    }

    /// Position of an observable, which is also its vertex index.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.observables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observables.is_empty()
    }

    pub fn phonetic(&self) -> &PhoneticEncoder {
        &self.phonetic
    }

    pub fn match_modifiers(&self) -> &[ModifierRule] {
        &self.match_modifiers
    }

    pub fn index_modifiers(&self) -> &[ModifierRule] {
        &self.index_modifiers
    }

    pub fn vocabulary(&self, name: &str) -> Option<&[String]> {
        self.vocabularies.get(name).map(Vec::as_slice)
    }

    /// Position of `term` in the vocabulary of `observable`, coarse first.
    pub fn term_order(&self, observable: &str, term: &str) -> Option<usize> {
        let vocabulary = self.observable(observable)?.vocabulary.as_ref()?;
        self.vocabularies
            .get(vocabulary)?
            .iter()
            .position(|t| t.eq_ignore_ascii_case(term))
    }

    // -- graph queries -----------------------------------------------------

    /// Parent vertices, ordered topologically.
    pub fn parents(&self, vertex: usize) -> Vec<usize> {
        self.sorted_neighbours(vertex, Direction::Incoming)
    }

    /// Child vertices, ordered topologically.
    pub fn children(&self, vertex: usize) -> Vec<usize> {
        self.sorted_neighbours(vertex, Direction::Outgoing)
    }

    fn sorted_neighbours(&self, vertex: usize, direction: Direction) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(vertex), direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort_by_key(|&v| self.topo_rank(v));
        out.dedup();
        out
    }

    fn topo_rank(&self, vertex: usize) -> usize {
        self.topo.iter().position(|&v| v == vertex).unwrap_or(usize::MAX)
    }

    /// Vertices without parents, in declaration order.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.observables.len())
            .filter(|&v| {
                self.graph
                    .neighbors_directed(NodeIndex::new(v), Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    pub fn topological_order(&self) -> &[usize] {
        &self.topo
    }

    /// Every vertex with a directed path to `vertex`.
    pub fn ancestors(&self, vertex: usize) -> BTreeSet<usize> {
        self.reach(vertex, Direction::Incoming)
    }

    /// Every vertex reachable from `vertex`.
    pub fn descendants(&self, vertex: usize) -> BTreeSet<usize> {
        self.reach(vertex, Direction::Outgoing)
    }

    fn reach(&self, vertex: usize, direction: Direction) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([vertex]);
        while let Some(v) = queue.pop_front() {
            for n in self.graph.neighbors_directed(NodeIndex::new(v), direction) {
                let n = self.graph[n];
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    /// Horizon and interior of an observable. See [`compute_horizon`].
    pub fn horizon(&self, id: &str) -> Option<Horizon> {
        self.position(id).map(|v| compute_horizon(self, v))
    }

    /// Observables whose derivation transitively reads `id`.
    pub fn derived_dependents(&self, id: &str) -> Vec<String> {
        let Some(start) = self.position(id) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for &reader in &self.readers[v] {
                if reader != start && seen.insert(reader) {
                    queue.push_back(reader);
                }
            }
        }
        seen.into_iter()
            .map(|v| self.observables[v].id.clone())
            .collect()
    }

    /// Check that every listed observable is declared.
    pub fn require(&self, ids: &[&str]) -> NetworkResult<()> {
        match ids.iter().find(|id| !self.positions.contains_key(**id)) {
            Some(id) => Err(NetworkError::MissingRequired { id: id.to_string() }),
            None => Ok(()),
        }
    }

    // -- values ------------------------------------------------------------

    /// Coerce, style and vocabulary-check values for an observable, dropping
    /// duplicates. Values of undeclared observables pass through unchanged.
    pub fn normalise_all(&self, id: &str, values: Vec<Value>) -> EvalResult<Vec<Value>> {
        let Some(observable) = self.observable(id) else {
            return Ok(values);
        };
        let mut out: Vec<Value> = Vec::with_capacity(values.len());
        for value in values {
            let mut value = observable.normalise(value)?;
            if let (ValueType::Term, Some(name), Value::Text(term)) =
                (observable.value_type, &observable.vocabulary, &value)
            {
                let terms = self.vocabularies.get(name).map(Vec::as_slice).unwrap_or_default();
                match terms.iter().find(|t| t.eq_ignore_ascii_case(term)) {
                    Some(canonical) => value = Value::Text(canonical.clone()),
                    None => {
                        return Err(EvalError::NotInVocabulary {
                            vocabulary: name.clone(),
                            value: term.clone(),
                        });
                    }
                }
            }
            if !out.contains(&value) {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Normalise a record's values and run every derivation in dependency
    /// order.
    ///
    /// Values already present are kept unless `overwrite` is set; generated
    /// identifiers are never replaced. A derivation that fails is skipped
    /// so the rest of the record can still be inferred.
    pub fn infer<R: RecordMut>(
        &self,
        record: &mut R,
        options: &MatchOptions,
        ancestors: &[&dyn Record],
        overwrite: bool,
    ) -> EvalResult<()> {
        for observable in &self.observables {
            let values = record.values_of(&observable.id);
            if !values.is_empty() {
                let normalised = self.normalise_all(&observable.id, values)?;
                record.set_values(&observable.id, normalised)?;
            }
        }

        let ctx = DeriveContext::new(self, options).with_ancestors(ancestors);
        for &v in &self.derivation_order {
            let observable = &self.observables[v];
            let Some(derivation) = &observable.derivation else {
                continue;
            };
            let generator = matches!(derivation.kind, DerivationKind::Generator { .. });
            if record.has(&observable.id) && (!overwrite || generator) {
                continue;
            }
            if !derivation.applies(&*record, &ctx) {
                continue;
            }
            let derived = derivation
                .compute(&*record, &ctx)
                .and_then(|values| self.normalise_all(&observable.id, values));
            match derived {
                Ok(values) if !values.is_empty() => record.set_values(&observable.id, values)?,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(observable = %observable.id, error = %e, "derivation skipped");
                }
            }
        }
        Ok(())
    }
}

/// Incremental construction of a [`Network`].
#[derive(Debug, Clone, Default)]
pub struct NetworkBuilder {
    id: String,
    type_tag: String,
    description: Option<String>,
    observables: Vec<Observable>,
    edges: Vec<(String, String)>,
    vocabularies: BTreeMap<String, Vec<String>>,
    match_modifiers: Vec<ModifierRule>,
    index_modifiers: Vec<ModifierRule>,
    phonetic: PhoneticEncoder,
}

impl NetworkBuilder {
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            phonetic: PhoneticEncoder::new(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn vocabulary<I, S>(mut self, name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vocabularies
            .insert(name.into(), terms.into_iter().map(Into::into).collect());
        self
    }

    pub fn observable(mut self, observable: Observable) -> Self {
        self.observables.push(observable);
        self
    }

    /// Declare that `to`'s probability is conditioned on `from`.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn match_modifier(mut self, rule: ModifierRule) -> Self {
        self.match_modifiers.push(rule);
        self
    }

    pub fn index_modifier(mut self, rule: ModifierRule) -> Self {
        self.index_modifiers.push(rule);
        self
    }

    pub fn phonetic(mut self, encoder: PhoneticEncoder) -> Self {
        self.phonetic = encoder;
        self
    }

    /// Validate and freeze the network.
    pub fn build(self) -> NetworkResult<Network> {
        let mut positions = HashMap::with_capacity(self.observables.len());
        for (i, observable) in self.observables.iter().enumerate() {
            if positions.insert(observable.id.clone(), i).is_some() {
                return Err(NetworkError::DuplicateObservable {
                    id: observable.id.clone(),
                });
            }
        }
        let lookup = |id: &str, context: &str| -> NetworkResult<usize> {
            positions
                .get(id)
                .copied()
                .ok_or_else(|| NetworkError::UndeclaredObservable {
                    id: id.to_string(),
                    context: context.to_string(),
                })
        };

        for observable in &self.observables {
            if let Some(name) = &observable.vocabulary {
                if !self.vocabularies.contains_key(name) {
                    return Err(NetworkError::UnknownVocabulary { name: name.clone() });
                }
            }
            let context = format!("the derivation of \"{}\"", observable.id);
            for derivation in observable.derivation.iter().chain(&observable.base) {
                for reference in derivation.references() {
                    lookup(&reference, &context)?;
                }
            }
        }
        for rule in self.match_modifiers.iter().chain(&self.index_modifiers) {
            let context = format!("modifier \"{}\"", rule.id);
            let mut refs: BTreeSet<String> = rule.modifier.references();
            if let Some(condition) = &rule.condition {
                refs.extend(condition.inputs());
            }
            for reference in refs {
                lookup(&reference, &context)?;
            }
        }

        // Dependency DAG.
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.observables.len(), self.edges.len());
        for i in 0..self.observables.len() {
            graph.add_node(i);
        }
        let mut seen_edges = BTreeSet::new();
        for (from, to) in &self.edges {
            let a = lookup(from, "an edge")?;
            let b = lookup(to, "an edge")?;
            if seen_edges.insert((a, b)) {
                graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
            }
        }
        for v in graph.node_indices() {
            let count = graph.neighbors_directed(v, Direction::Incoming).count();
            if count > MAX_PARENTS {
                return Err(NetworkError::TooManyParents {
                    id: self.observables[v.index()].id.clone(),
                    count,
                    max: MAX_PARENTS,
                });
            }
        }
        let topo = stable_toposort(&graph).map_err(|v| NetworkError::Cyclic {
            id: self.observables[v].id.clone(),
        })?;

        // Derivation dependencies: input -> derived observable.
        let mut derivations: DiGraph<usize, ()> = DiGraph::new();
        for i in 0..self.observables.len() {
            derivations.add_node(i);
        }
        let mut readers = vec![Vec::new(); self.observables.len()];
        for (target, observable) in self.observables.iter().enumerate() {
            let Some(derivation) = &observable.derivation else {
                continue;
            };
            for input in derivation.inputs() {
                let source = lookup(&input, "a derivation")?;
                derivations.add_edge(NodeIndex::new(source), NodeIndex::new(target), ());
                readers[source].push(target);
            }
        }
        let derivation_order = stable_toposort(&derivations).map_err(|v| NetworkError::Cyclic {
            id: self.observables[v].id.clone(),
        })?;

        tracing::info!(
            network = %self.id,
            observables = self.observables.len(),
            edges = graph.edge_count(),
            "network built"
        );

        Ok(Network {
            id: self.id,
            type_tag: self.type_tag,
            description: self.description,
            observables: self.observables,
            positions,
            graph,
            topo,
            derivation_order,
            readers,
            vocabularies: self.vocabularies,
            match_modifiers: self.match_modifiers,
            index_modifiers: self.index_modifiers,
            phonetic: self.phonetic,
        })
    }
}

/// Kahn's algorithm, always releasing the lowest-numbered ready vertex so the
/// order only depends on declaration order. Returns a vertex on a cycle on
/// failure.
fn stable_toposort(graph: &DiGraph<usize, ()>) -> Result<Vec<usize>, usize> {
    if let Err(cycle) = petgraph::algo::toposort(graph, None) {
        return Err(graph[cycle.node_id()]);
    }
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<usize> = (0..in_degree.len()).filter(|&v| in_degree[v] == 0).collect();
    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(v) = ready.pop_first() {
        order.push(v);
        for n in graph.neighbors_directed(NodeIndex::new(v), Direction::Outgoing) {
            let n = n.index();
            in_degree[n] -= 1;
            if in_degree[n] == 0 {
                ready.insert(n);
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::derivation::Derivation;
    use crate::record::Classifier;

    fn chain() -> NetworkBuilder {
        NetworkBuilder::new("chain", "Taxon")
            .vocabulary("rank", ["genus", "species"])
            .observable(Observable::new("id", ValueType::Identifier))
            .observable(Observable::new("name", ValueType::Text).with_style(Style::Scientific))
            .observable(
                Observable::new("code", ValueType::Text).with_derivation(Derivation::phonetic("name")),
            )
            .observable(Observable {
                vocabulary: Some("rank".into()),
                ..Observable::new("rank", ValueType::Term)
            })
            .edge("id", "name")
            .edge("name", "code")
            .edge("id", "rank")
    }

    #[test]
    fn builds_topological_order() {
        let net = chain().build().unwrap();
        assert_eq!(net.roots(), vec![0]);
        assert_eq!(net.topological_order(), &[0, 1, 2, 3]);
        assert_eq!(net.parents(2), vec![1]);
        assert_eq!(net.children(0), vec![1, 3]);
        assert_eq!(net.ancestors(2), BTreeSet::from([0, 1]));
        assert_eq!(net.descendants(1), BTreeSet::from([2]));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = chain().edge("code", "id").build().unwrap_err();
        assert!(matches!(err, NetworkError::Cyclic { .. }));
    }

    #[test]
    fn undeclared_edge_endpoint_is_rejected() {
        let err = chain().edge("name", "genus").build().unwrap_err();
        assert!(matches!(err, NetworkError::UndeclaredObservable { ref id, .. } if id == "genus"));
    }

    #[test]
    fn duplicate_observable_is_rejected() {
        let err = chain()
            .observable(Observable::new("name", ValueType::Text))
            .build()
            .unwrap_err();
        assert!(matches!(err, NetworkError::DuplicateObservable { .. }));
    }

    #[test]
    fn missing_vocabulary_is_rejected() {
        let err = NetworkBuilder::new("n", "Taxon")
            .observable(Observable {
                vocabulary: Some("status".into()),
                ..Observable::new("status", ValueType::Term)
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, NetworkError::UnknownVocabulary { .. }));
    }

    #[test]
    fn infer_normalises_and_derives() {
        let net = chain().build().unwrap();
        let mut c = Classifier::new("Taxon");
        c.add("name", Value::from(" acacia  dealbata"));
        c.add("rank", Value::from("SPECIES"));
        net.infer(&mut c, &MatchOptions::default(), &[], false).unwrap();
        assert_eq!(c.text_of("name").as_deref(), Some("Acacia dealbata"));
        assert_eq!(c.text_of("rank").as_deref(), Some("species"));
        let expected = net.phonetic().encode("Acacia dealbata").unwrap();
        assert_eq!(c.text_of("code"), Some(expected));
    }

    #[test]
    fn infer_keeps_existing_values_unless_overwriting() {
        let net = chain().build().unwrap();
        let mut c = Classifier::new("Taxon");
        c.add("name", Value::from("Acacia"));
        c.add("code", Value::from("X"));
        net.infer(&mut c, &MatchOptions::default(), &[], false).unwrap();
        assert_eq!(c.text_of("code").as_deref(), Some("X"));
        net.infer(&mut c, &MatchOptions::default(), &[], true).unwrap();
        assert_ne!(c.text_of("code").as_deref(), Some("X"));
    }

    #[test]
    fn unknown_term_fails_normalisation() {
        let net = chain().build().unwrap();
        let err = net
            .normalise_all("rank", vec![Value::from("tribe")])
            .unwrap_err();
        assert!(matches!(err, EvalError::NotInVocabulary { .. }));
    }

    #[test]
    fn dependents_follow_derivation_chains() {
        let net = chain()
            .observable(
                Observable::new("loud", ValueType::Text).with_derivation(Derivation::copy("code")),
            )
            .build()
            .unwrap();
        assert_eq!(net.derived_dependents("name"), vec!["code".to_string(), "loud".to_string()]);
        assert!(net.derived_dependents("rank").is_empty());
    }

    #[test]
    fn require_reports_missing_observable() {
        let net = chain().build().unwrap();
        assert!(net.require(&["id", "name"]).is_ok());
        assert!(matches!(
            net.require(&["taxonomicStatus"]),
            Err(NetworkError::MissingRequired { .. })
        ));
    }
}
