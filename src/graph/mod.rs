//! The computation graph: operators, their dependency structure, and the
//! signal index a model builder hands off to the optimizer (spec.md §3,
//! §6 "External interfaces").

pub mod builder;
pub mod dependency;
pub mod optimizer;

pub use builder::GraphBuilder;
pub use dependency::DependencyGraph;
pub use optimizer::MergeOptimizer;

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::operator::Operator;
use crate::signal::{SignalArena, SignalId};

/// Stable index into a model's operator arena. Like [`crate::signal::SignalId`],
/// never reused: a merge allocates a fresh id for the fused operator
/// rather than overwriting one of its constituents'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(pub usize);

/// Opaque handle for whatever object owns a group of named signals (an
/// ensemble, a connection, a probe, ...). The model builder that mints
/// these is an external collaborator; this crate only needs the handle
/// to key `Model::sig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub usize);

/// The graph handed to and returned from the optimizer: an append-only
/// arena of operators, the live subset of it that actually participates
/// in the current topology, the dependency graph over that subset, the
/// signal arena every operator's signal ids index into, and the
/// `owner -> name -> signal` index consumers use to look up a named
/// signal after optimization rewrites it (spec.md §6).
///
/// `Serialize`/`Deserialize` so a model can round-trip to JSON the same
/// way the tensor-graph sibling module's own `Graph` does in
/// `examples/graph_persistence.rs` — useful for caching an optimized
/// graph between simulator runs without rebuilding it from the front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    operators: Vec<Operator>,
    live: IndexSet<OperatorId>,
    dg: DependencyGraph,
    pub signals: SignalArena,
    pub sig: HashMap<OwnerId, IndexMap<String, SignalId>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id.0]
    }

    pub fn dg(&self) -> &DependencyGraph {
        &self.dg
    }

    pub fn live_operators(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.live.iter().copied()
    }

    pub fn operator_count(&self) -> usize {
        self.live.len()
    }

    /// Appends a new operator to the arena and marks it live. Used both
    /// for initial graph construction and, internally by the optimizer,
    /// for fused/rewritten replacements.
    pub fn push_operator(&mut self, op: Operator) -> OperatorId {
        let id = OperatorId(self.operators.len());
        self.operators.push(op);
        self.live.insert(id);
        self.dg.ensure_node(id);
        id
    }

    /// Records that `to` consumes one of `from`'s outputs.
    pub fn add_dependency(&mut self, from: OperatorId, to: OperatorId) {
        self.dg.add_edge(from, to);
    }

    pub fn named_signal(&self, owner: OwnerId, name: &str) -> Option<SignalId> {
        self.sig.get(&owner).and_then(|m| m.get(name)).copied()
    }

    pub fn set_named_signal(&mut self, owner: OwnerId, name: impl Into<String>, id: SignalId) {
        self.sig.entry(owner).or_default().insert(name.into(), id);
    }

    /// Serializes the whole model (operators, live set, DG, signal arena,
    /// named-signal index) to pretty JSON, the same
    /// `serde_json::to_string_pretty` call `examples/graph_persistence.rs`
    /// makes on its own graph.
    pub fn to_json(&self) -> crate::error::OptResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::error::OptError::Serde(e.to_string()))
    }

    /// Inverse of [`Model::to_json`].
    pub fn from_json(s: &str) -> crate::error::OptResult<Self> {
        serde_json::from_str(s).map_err(|e| crate::error::OptError::Serde(e.to_string()))
    }

    /// Applies operator replacements produced by a pass: rewrites the DG
    /// and the live set through `reps` (identity for anything absent).
    pub(crate) fn apply_operator_replacements(&mut self, reps: &IndexMap<OperatorId, OperatorId>) {
        self.dg = self.dg.rewrite(reps);
        self.live = self.live.iter().map(|&id| *reps.get(&id).unwrap_or(&id)).collect();
    }

    /// Applies signal replacements to `model.sig` so downstream
    /// consumers resolve named signals to their post-merge views
    /// (spec.md §4.3 step 10).
    pub(crate) fn apply_signal_replacements(
        &mut self,
        reps: &crate::signal::merge::SignalReplacements,
    ) {
        for owner_sigs in self.sig.values_mut() {
            for id in owner_sigs.values_mut() {
                if let Some(&new_id) = reps.get(id) {
                    *id = new_id;
                }
            }
        }
    }
}
