//! Minimal ergonomic construction helper for assembling a [`Model`] by
//! hand, the role `GraphBuilder` in this codebase's tensor-graph sibling
//! module (`val`/`param`/`matmul`/... in `dsl.rs`) played for that graph.
//! Tests and demos use this rather than poking `Model` fields directly.

use std::collections::HashMap;

use crate::error::OptResult;
use crate::graph::{Model, OperatorId, OwnerId};
use crate::operator::Operator;
use crate::signal::{Buffer, DType, SignalId};

#[derive(Debug, Default)]
pub struct GraphBuilder {
    model: Model,
    next_owner: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn new_owner(&mut self) -> OwnerId {
        let id = OwnerId(self.next_owner);
        self.next_owner += 1;
        id
    }

    pub fn base_signal(&mut self, name: impl Into<String>, buffer: Buffer, readonly: bool) -> SignalId {
        self.model.signals.push_base(name, buffer, readonly)
    }

    /// Convenience for the common case: a fresh contiguous `f64` base of
    /// `shape`, zero-filled.
    pub fn zeros_f64(&mut self, name: impl Into<String>, shape: &[usize]) -> SignalId {
        let arr = ndarray::ArrayD::zeros(shape.to_vec());
        self.base_signal(name, Buffer::F64(arr), false)
    }

    pub fn full_view(&mut self, name: impl Into<String>, base: SignalId) -> OptResult<SignalId> {
        self.model.signals.push_full_view(name, base)
    }

    pub fn slice(
        &mut self,
        base: SignalId,
        axis: usize,
        range: std::ops::Range<usize>,
    ) -> OptResult<SignalId> {
        self.model.signals.slice_axis(base, axis, range)
    }

    pub fn dtype_of(&self, id: SignalId) -> OptResult<DType> {
        Ok(self.model.signals.get(id)?.dtype())
    }

    pub fn add_operator(&mut self, op: Operator) -> OperatorId {
        self.model.push_operator(op)
    }

    pub fn depend(&mut self, from: OperatorId, to: OperatorId) {
        self.model.add_dependency(from, to);
    }

    pub fn set_named_signal(&mut self, owner: OwnerId, name: impl Into<String>, id: SignalId) {
        self.model.set_named_signal(owner, name, id);
    }

    /// Wires dependency edges purely from signal overlap: an operator
    /// that sets/incs/updates a signal another operator reads/updates
    /// must run first. Operators with no such relationship stay
    /// mutually independent, which is exactly what the merge sweep's
    /// independence check needs.
    pub fn infer_dependencies(&mut self) {
        let ids: Vec<OperatorId> = self.model.live_operators().collect();
        let mut producers: HashMap<SignalId, Vec<OperatorId>> = HashMap::new();
        for &id in &ids {
            let op = self.model.operator(id);
            for sig in op.sets().into_iter().chain(op.incs()).chain(op.updates()) {
                producers.entry(sig).or_default().push(id);
            }
        }
        for &id in &ids {
            let op = self.model.operator(id);
            for sig in op.reads().into_iter().chain(op.updates()) {
                if let Some(prods) = producers.get(&sig) {
                    for &p in prods {
                        if p != id {
                            self.model.add_dependency(p, id);
                        }
                    }
                }
            }
        }
    }
}
