//! The dependency graph (DG): `edges[a]` is the set of operators that
//! consume one of `a`'s outputs (spec.md §3, §5). Backed by `IndexMap`/
//! `IndexSet` rather than their `std::collections::Hash*` counterparts —
//! spec.md §5 requires iteration order to be a deterministic function of
//! insertion order wherever it can affect clustering, and a `HashMap`'s
//! iteration order is randomized per-process.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};
use crate::graph::OperatorId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    edges: IndexMap<OperatorId, IndexSet<OperatorId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_node(&mut self, id: OperatorId) {
        self.edges.entry(id).or_default();
    }

    /// Records that `to` depends on `from` (consumes one of its outputs).
    pub fn add_edge(&mut self, from: OperatorId, to: OperatorId) {
        self.ensure_node(to);
        self.edges.entry(from).or_default().insert(to);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.edges.keys().copied()
    }

    pub fn dependents(&self, id: OperatorId) -> Option<&IndexSet<OperatorId>> {
        self.edges.get(&id)
    }

    /// Kahn's algorithm, processing ready nodes in the order they were
    /// inserted rather than any hash order, so the result is a pure
    /// function of how the graph was built.
    pub fn topo_sort(&self) -> OptResult<Vec<OperatorId>> {
        let mut in_degree: IndexMap<OperatorId, usize> =
            self.edges.keys().map(|&n| (n, 0)).collect();
        for deps in self.edges.values() {
            for &d in deps {
                *in_degree.entry(d).or_insert(0) += 1;
            }
        }

        let mut ready: Vec<OperatorId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&n, _)| n)
            .collect();
        let mut order = Vec::with_capacity(self.edges.len());

        while let Some(n) = ready.pop() {
            order.push(n);
            if let Some(deps) = self.edges.get(&n) {
                for &d in deps {
                    let deg = in_degree.get_mut(&d).expect("node registered above");
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(d);
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            return Err(OptError::CyclicGraph);
        }
        Ok(order)
    }

    /// Per-node set of all transitive descendants, used for the
    /// independence check in the merge sweep. `topo_order` must be a
    /// valid topological order of this graph (the caller already
    /// computed one for bucketing, so this avoids recomputing it).
    pub fn transitive_closure(
        &self,
        topo_order: &[OperatorId],
    ) -> IndexMap<OperatorId, IndexSet<OperatorId>> {
        let mut closure: IndexMap<OperatorId, IndexSet<OperatorId>> = IndexMap::new();
        for &node in topo_order.iter().rev() {
            let mut desc = IndexSet::new();
            if let Some(children) = self.edges.get(&node) {
                for &c in children {
                    desc.insert(c);
                    if let Some(cd) = closure.get(&c) {
                        desc.extend(cd.iter().copied());
                    }
                }
            }
            closure.insert(node, desc);
        }
        closure
    }

    /// Rewrites every edge `a -> b` as `rep(a) -> rep(b)` (identity for
    /// operators absent from `reps`), dropping self-loops produced by
    /// operators that merged with each other (spec.md §5, "Ordering
    /// guarantees").
    pub fn rewrite(&self, reps: &IndexMap<OperatorId, OperatorId>) -> DependencyGraph {
        let rep_of = |id: OperatorId| *reps.get(&id).unwrap_or(&id);
        let mut new_edges: IndexMap<OperatorId, IndexSet<OperatorId>> = IndexMap::new();
        for (&from, tos) in &self.edges {
            let new_from = rep_of(from);
            let entry = new_edges.entry(new_from).or_default();
            for &to in tos {
                let new_to = rep_of(to);
                if new_to != new_from {
                    entry.insert(new_to);
                }
            }
        }
        for &new_id in reps.values() {
            new_edges.entry(new_id).or_default();
        }
        DependencyGraph { edges: new_edges }
    }
}
