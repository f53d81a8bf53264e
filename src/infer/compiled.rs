//! The compiled inference strategy.
//!
//! Compilation partitions the non-root vertices into erasure groups (each
//! group is a convergence point or a child of the root, plus its interior),
//! then binds a procedure for every presence signature that can occur: all
//! combinations of the erasable groups, with the groups holding a required
//! observable always present. A query whose signature has no procedure is a
//! configuration error; a candidate that leaves out a required group is bad
//! data for that candidate only.
//!
//! Each vertex stands for the event "the query and the candidate agree on
//! this observable", the root for the match hypothesis itself. Evaluation
//! sums the joint probability of the observed agreements over every state of
//! the unobserved ancestors, once with the hypothesis true and once false.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{EvalError, EvalResult, NetworkError, NetworkResult, StoreError, StoreResult};
use crate::network::Network;
use crate::network::horizon::horizon_vertices;
use crate::record::{Classifier, Record};

use super::{Inference, Parameters};

/// Upper bound on vertices taking part in inference.
pub const MAX_VERTICES: usize = 24;

/// Upper bound on erasable groups; every combination gets a procedure.
pub const MAX_ERASABLE_GROUPS: usize = 16;

/// Presence bitmask over erasure groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    bits: u64,
    len: usize,
}

impl Signature {
    pub fn is_present(&self, group: usize) -> bool {
        self.bits & (1 << group) != 0
    }

    fn intersect(self, other: Signature) -> Signature {
        Signature {
            bits: self.bits & other.bits,
            len: self.len,
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for group in 0..self.len {
            f.write_str(if self.is_present(group) { "+" } else { "-" })?;
        }
        Ok(())
    }
}

/// A cluster of vertices that is present or absent as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasureGroup {
    /// Vertex that opens the group.
    pub start: usize,
    /// Start plus its interior, in topological order.
    pub members: Vec<usize>,
    /// False when a member is a required observable.
    pub erasable: bool,
}

#[derive(Debug, Clone)]
struct Procedure {
    /// Non-root vertices that may carry evidence, in topological order.
    vertices: Vec<usize>,
}

/// A network compiled for inference. Built once, shared read-only.
#[derive(Debug, Clone)]
pub struct CompiledNetwork {
    network: Arc<Network>,
    root: usize,
    /// Participating vertices in topological order, root first.
    vertices: Vec<usize>,
    parents: HashMap<usize, Vec<usize>>,
    ancestors: HashMap<usize, BTreeSet<usize>>,
    offsets: HashMap<usize, usize>,
    parameter_count: usize,
    groups: Vec<ErasureGroup>,
    procedures: HashMap<u64, Procedure>,
}

impl CompiledNetwork {
    pub fn compile(network: Arc<Network>) -> NetworkResult<Self> {
        let connected: BTreeSet<usize> = (0..network.len())
            .filter(|&v| !network.parents(v).is_empty() || !network.children(v).is_empty())
            .collect();
        let roots: Vec<usize> = connected
            .iter()
            .copied()
            .filter(|&v| network.parents(v).is_empty())
            .collect();
        let [root] = roots[..] else {
            return Err(NetworkError::RootCount { count: roots.len() });
        };
        if connected.len() > MAX_VERTICES {
            return Err(NetworkError::TooLarge {
                what: "inference vertices",
                count: connected.len(),
                max: MAX_VERTICES,
            });
        }

        let vertices: Vec<usize> = network
            .topological_order()
            .iter()
            .copied()
            .filter(|v| connected.contains(v))
            .collect();
        let mut parents = HashMap::new();
        let mut ancestors = HashMap::new();
        let mut offsets = HashMap::new();
        let mut parameter_count = 1;
        for &v in &vertices {
            let mut up = network.ancestors(v);
            up.remove(&root);
            ancestors.insert(v, up);
            let ps = network.parents(v);
            if v != root {
                offsets.insert(v, parameter_count);
                parameter_count += 1 << ps.len();
            }
            parents.insert(v, ps);
        }

        // Erasure groups: children of the root and convergence points open a
        // group that absorbs their interior.
        let mut groups: Vec<ErasureGroup> = Vec::new();
        for &v in &vertices {
            let ps = &parents[&v];
            if v == root || !(ps.len() > 1 || ps[..] == [root]) {
                continue;
            }
            let (_, interior) = horizon_vertices(&network, v);
            let mut members: Vec<usize> = vertices
                .iter()
                .copied()
                .filter(|m| *m == v || interior.contains(m))
                .collect();
            members.dedup();
            let erasable = !members
                .iter()
                .any(|&m| network.observables()[m].is_required());
            groups.push(ErasureGroup {
                start: v,
                members,
                erasable,
            });
        }
        if groups.len() > 64 {
            return Err(NetworkError::TooLarge {
                what: "erasure groups",
                count: groups.len(),
                max: 64,
            });
        }
        let erasable: Vec<usize> = (0..groups.len()).filter(|&g| groups[g].erasable).collect();
        if erasable.len() > MAX_ERASABLE_GROUPS {
            return Err(NetworkError::TooLarge {
                what: "erasable groups",
                count: erasable.len(),
                max: MAX_ERASABLE_GROUPS,
            });
        }

        let fixed: u64 = (0..groups.len())
            .filter(|&g| !groups[g].erasable)
            .fold(0, |bits, g| bits | (1 << g));
        let mut procedures = HashMap::with_capacity(1 << erasable.len());
        for combination in 0u64..(1 << erasable.len()) {
            let mut bits = fixed;
            for (i, &g) in erasable.iter().enumerate() {
                if combination & (1 << i) != 0 {
                    bits |= 1 << g;
                }
            }
            let present: BTreeSet<usize> = (0..groups.len())
                .filter(|&g| bits & (1 << g) != 0)
                .flat_map(|g| groups[g].members.iter().copied())
                .collect();
            let procedure = Procedure {
                vertices: vertices.iter().copied().filter(|v| present.contains(v)).collect(),
            };
            procedures.insert(bits, procedure);
        }

        tracing::info!(
            network = %network.id(),
            vertices = vertices.len(),
            groups = groups.len(),
            signatures = procedures.len(),
            parameters = parameter_count,
            "compiled inference network"
        );

        Ok(Self {
            network,
            root,
            vertices,
            parents,
            ancestors,
            offsets,
            parameter_count,
            groups,
            procedures,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn shared_network(&self) -> Arc<Network> {
        Arc::clone(&self.network)
    }

    /// The hypothesis vertex.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Participating vertices in topological order, root first.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Parents of a participating vertex, in topological order.
    pub fn parents_of(&self, vertex: usize) -> &[usize] {
        self.parents.get(&vertex).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn groups(&self) -> &[ErasureGroup] {
        &self.groups
    }

    /// Number of signatures a procedure was compiled for.
    pub fn signature_count(&self) -> usize {
        self.procedures.len()
    }

    /// Presence signature of a record.
    pub fn signature(&self, record: &dyn Record) -> Signature {
        let observables = self.network.observables();
        let bits = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.members.iter().any(|&m| record.has(&observables[m].id)))
            .fold(0u64, |bits, (g, _)| bits | (1 << g));
        Signature {
            bits,
            len: self.groups.len(),
        }
    }

    /// Check that a query's evidence has a compiled procedure.
    pub fn check_query(&self, query: &dyn Record) -> NetworkResult<Signature> {
        let signature = self.signature(query);
        if self.procedures.contains_key(&signature.bits) {
            Ok(signature)
        } else {
            Err(NetworkError::UnboundSignature {
                signature: self.describe(signature),
            })
        }
    }

    fn describe(&self, signature: Signature) -> String {
        let observables = self.network.observables();
        let missing: Vec<&str> = self
            .groups
            .iter()
            .enumerate()
            .filter(|(g, group)| !group.erasable && !signature.is_present(*g))
            .map(|(_, group)| observables[group.start].id.as_str())
            .collect();
        format!("{signature} (missing {})", missing.join(", "))
    }

    /// Unpack and check a candidate's stored parameters.
    pub fn unpack(&self, candidate: &Classifier) -> StoreResult<Parameters> {
        let id = candidate.identifier().unwrap_or("(unidentified)");
        let bytes = candidate
            .parameters()
            .ok_or_else(|| StoreError::MissingParameters { id: id.to_string() })?;
        Parameters::unpack(id, bytes, self.parameter_count)
    }

    /// Offset of a vertex's conditional table in the parameter layout.
    pub fn offset(&self, vertex: usize) -> Option<usize> {
        self.offsets.get(&vertex).copied()
    }

    /// Probability that `query` and `candidate` describe the same record.
    pub fn evaluate(
        &self,
        query: &dyn Record,
        candidate: &Classifier,
        parameters: &Parameters,
    ) -> EvalResult<Inference> {
        let combined = self.signature(query).intersect(self.signature(candidate));
        let Some(procedure) = self.procedures.get(&combined.bits) else {
            let observables = self.network.observables();
            let group = self
                .groups
                .iter()
                .enumerate()
                .filter(|(g, group)| !group.erasable && !combined.is_present(*g))
                .map(|(_, group)| observables[group.start].id.clone())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(EvalError::MissingGroup {
                id: candidate.identifier().unwrap_or("(unidentified)").to_string(),
                group,
            });
        };

        let observables = self.network.observables();
        let phonetic = self.network.phonetic();
        let mut observed: HashMap<usize, bool> = HashMap::new();
        for &v in &procedure.vertices {
            let observable = &observables[v];
            let left = query.values_of(&observable.id);
            let right = candidate.values_of(&observable.id);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let agree = observable.equivalence.any_equivalent(&left, &right, phonetic)?;
            observed.insert(v, agree);
        }

        let mut relevant: BTreeSet<usize> = observed.keys().copied().collect();
        for v in observed.keys() {
            relevant.extend(self.ancestors[v].iter().copied());
        }
        let ordered: Vec<usize> = self
            .vertices
            .iter()
            .copied()
            .filter(|v| relevant.contains(v))
            .collect();
        let hidden: Vec<usize> = ordered
            .iter()
            .copied()
            .filter(|v| !observed.contains_key(v))
            .collect();

        let prior = parameters.prior();
        let with_h = prior * self.marginal(true, &ordered, &hidden, &observed, parameters);
        let without_h = (1.0 - prior) * self.marginal(false, &ordered, &hidden, &observed, parameters);
        Ok(Inference::from_joint(prior, with_h, without_h))
    }

    /// P(observed | root = hypothesis), summing out the hidden vertices.
    fn marginal(
        &self,
        hypothesis: bool,
        ordered: &[usize],
        hidden: &[usize],
        observed: &HashMap<usize, bool>,
        parameters: &Parameters,
    ) -> f64 {
        let mut state: HashMap<usize, bool> = observed.clone();
        state.insert(self.root, hypothesis);
        let mut total = 0.0;
        for assignment in 0u64..(1 << hidden.len()) {
            for (i, &v) in hidden.iter().enumerate() {
                state.insert(v, assignment & (1 << i) != 0);
            }
            let mut product = 1.0;
            for &v in ordered {
                let index = self.parents_of(v)
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| state.get(*p).copied().unwrap_or(false))
                    .fold(0usize, |index, (j, _)| index | (1 << j));
                let Some(offset) = self.offset(v) else {
                    continue;
                };
                let p = parameters.entry(offset, index);
                product *= if state.get(&v).copied().unwrap_or(false) { p } else { 1.0 - p };
                if product == 0.0 {
                    break;
                }
            }
            total += product;
        }
        total
    }
}
