//! Horizon analysis of the dependency DAG.
//!
//! Walking forward from a vertex, a descendant reached through its only
//! incoming edge belongs to the vertex's *interior*: its influence can be
//! folded into the vertex's own term. A descendant with two or more incoming
//! edges is where independent evidence reconverges; it goes on the *horizon*
//! and the walk stops there.

use std::collections::{BTreeSet, VecDeque};

use super::Network;

/// Interior and horizon of one vertex, as observable ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Horizon {
    pub horizon: BTreeSet<String>,
    pub interior: BTreeSet<String>,
}

impl Horizon {
    pub fn is_empty(&self) -> bool {
        self.horizon.is_empty() && self.interior.is_empty()
    }
}

/// Vertex-index form of the analysis, used by the inference compiler.
pub(crate) fn horizon_vertices(network: &Network, start: usize) -> (BTreeSet<usize>, BTreeSet<usize>) {
    let mut horizon = BTreeSet::new();
    let mut interior = BTreeSet::new();
    let mut queue: VecDeque<usize> = network.children(start).into();
    while let Some(v) = queue.pop_front() {
        if interior.contains(&v) || horizon.contains(&v) {
            continue;
        }
        if network.parents(v).len() > 1 {
            horizon.insert(v);
        } else {
            interior.insert(v);
            queue.extend(network.children(v));
        }
    }
    (horizon, interior)
}

/// Compute the horizon of `vertex`. Deterministic for a given graph.
pub fn compute_horizon(network: &Network, vertex: usize) -> Horizon {
    let (horizon, interior) = horizon_vertices(network, vertex);
    let name = |v: usize| network.observables()[v].id.clone();
    Horizon {
        horizon: horizon.into_iter().map(name).collect(),
        interior: interior.into_iter().map(name).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;
    use crate::network::observable::Observable;
    use crate::value::ValueType;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn diamond() -> Network {
        NetworkBuilder::new("diamond", "T")
            .observable(Observable::new("A", ValueType::Text))
            .observable(Observable::new("B", ValueType::Text))
            .observable(Observable::new("C", ValueType::Text))
            .observable(Observable::new("D", ValueType::Text))
            .edge("A", "B")
            .edge("A", "C")
            .edge("B", "D")
            .edge("C", "D")
            .build()
            .unwrap()
    }

    #[test]
    fn diamond_root_sees_convergence() {
        let h = diamond().horizon("A").unwrap();
        assert_eq!(h.horizon, set(&["D"]));
        assert_eq!(h.interior, set(&["B", "C"]));
    }

    #[test]
    fn diamond_branch_has_empty_interior() {
        let h = diamond().horizon("B").unwrap();
        assert_eq!(h.horizon, set(&["D"]));
        assert!(h.interior.is_empty());
    }

    #[test]
    fn terminal_vertices_have_empty_horizon() {
        let net = diamond();
        assert!(net.horizon("D").unwrap().is_empty());
    }

    #[test]
    fn traversal_stops_at_horizon() {
        // A -> B -> D -> E, A -> C -> D: E lies past the convergence point.
        let net = NetworkBuilder::new("tail", "T")
            .observable(Observable::new("A", ValueType::Text))
            .observable(Observable::new("B", ValueType::Text))
            .observable(Observable::new("C", ValueType::Text))
            .observable(Observable::new("D", ValueType::Text))
            .observable(Observable::new("E", ValueType::Text))
            .edge("A", "B")
            .edge("A", "C")
            .edge("B", "D")
            .edge("C", "D")
            .edge("D", "E")
            .build()
            .unwrap();
        let h = net.horizon("A").unwrap();
        assert_eq!(h.horizon, set(&["D"]));
        assert_eq!(h.interior, set(&["B", "C"]));
        let from_d = net.horizon("D").unwrap();
        assert_eq!(from_d.interior, set(&["E"]));
        assert!(from_d.horizon.is_empty());
    }

    #[test]
    fn chains_are_fully_interior() {
        let net = NetworkBuilder::new("chain", "T")
            .observable(Observable::new("A", ValueType::Text))
            .observable(Observable::new("B", ValueType::Text))
            .observable(Observable::new("C", ValueType::Text))
            .edge("A", "B")
            .edge("B", "C")
            .build()
            .unwrap();
        let h = net.horizon("A").unwrap();
        assert!(h.horizon.is_empty());
        assert_eq!(h.interior, set(&["B", "C"]));
    }
}
