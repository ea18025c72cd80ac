//! Stand-in for the original's object-identity check on a neuron type
//! instance (`self.neurons == other.neurons` in
//! `original_source/nengo/builder/neurons.py`'s `SimNeurons.can_merge`).
//!
//! Rust has no ambient object identity to lean on, so instances are
//! interned in a registry and compared by the resulting stable id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeuronModelId(pub usize);

/// Interns neuron model descriptions so two [`crate::operator::kinds::SimNeurons`]
/// operators can cheaply compare "same neuron model instance" by id rather
/// than by deep-equality of a model struct on every `can_merge` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeuronModelRegistry {
    names: Vec<String>,
}

impl NeuronModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new, distinct neuron model instance and returns its id.
    /// Two calls with the same `name` still produce two distinct ids —
    /// this mirrors `is` identity, not name equality: two neuron
    /// populations configured identically are still different instances.
    pub fn register(&mut self, name: impl Into<String>) -> NeuronModelId {
        let id = NeuronModelId(self.names.len());
        self.names.push(name.into());
        id
    }

    pub fn name(&self, id: NeuronModelId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
