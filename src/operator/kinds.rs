//! The four pre-enumerated built-in operator kinds (spec.md §4.2), each
//! carrying its own signal slots and kind-local `can_merge` parameters.
//!
//! Merging is a slot-wise `merge_signals_or_views` over the cluster: the
//! first element of `others` fills slot N of `self`'s layout with the
//! corresponding slot N of every operator in the cluster, concatenated
//! along axis 0 — these operators are modeled on one-dimensional
//! per-neuron vectors (`J`, `output`, per-state arrays), matching
//! `original_source/nengo/builder/neurons.py`'s `SimNeurons` and the
//! sibling element-wise/dot-product operators it is merged alongside in
//! `original_source/nengo/builder/optimizer.py`.

use serde::{Deserialize, Serialize};

use crate::error::OptResult;
use crate::operator::neuron_model::NeuronModelId;
use crate::signal::merge::{merge_signals_or_views, SignalReplacements};
use crate::signal::{SignalArena, SignalId};

const MERGE_AXIS: usize = 0;

/// `y += a * b`, elementwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementwiseInc {
    pub a: SignalId,
    pub b: SignalId,
    pub y: SignalId,
}

impl ElementwiseInc {
    pub fn sets(&self) -> Vec<SignalId> {
        vec![]
    }
    pub fn incs(&self) -> Vec<SignalId> {
        vec![self.y]
    }
    pub fn reads(&self) -> Vec<SignalId> {
        vec![self.a, self.b]
    }
    pub fn updates(&self) -> Vec<SignalId> {
        vec![]
    }

    pub fn can_merge(&self, _other: &ElementwiseInc) -> bool {
        true
    }

    pub fn merge(
        &self,
        others: &[&ElementwiseInc],
        arena: &mut SignalArena,
        replacements: &mut SignalReplacements,
    ) -> OptResult<ElementwiseInc> {
        let mut a_ids = vec![self.a];
        let mut b_ids = vec![self.b];
        let mut y_ids = vec![self.y];
        for o in others {
            a_ids.push(o.a);
            b_ids.push(o.b);
            y_ids.push(o.y);
        }
        Ok(ElementwiseInc {
            a: merge_signals_or_views(arena, &a_ids, MERGE_AXIS, replacements)?,
            b: merge_signals_or_views(arena, &b_ids, MERGE_AXIS, replacements)?,
            y: merge_signals_or_views(arena, &y_ids, MERGE_AXIS, replacements)?,
        })
    }
}

/// Copies (or, if `inc`, adds) `src` into `dst`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlicedCopy {
    pub src: SignalId,
    pub dst: SignalId,
    pub inc: bool,
}

impl SlicedCopy {
    pub fn sets(&self) -> Vec<SignalId> {
        if self.inc {
            vec![]
        } else {
            vec![self.dst]
        }
    }
    pub fn incs(&self) -> Vec<SignalId> {
        if self.inc {
            vec![self.dst]
        } else {
            vec![]
        }
    }
    pub fn reads(&self) -> Vec<SignalId> {
        vec![self.src]
    }
    pub fn updates(&self) -> Vec<SignalId> {
        vec![]
    }

    pub fn can_merge(&self, other: &SlicedCopy) -> bool {
        self.inc == other.inc
    }

    pub fn merge(
        &self,
        others: &[&SlicedCopy],
        arena: &mut SignalArena,
        replacements: &mut SignalReplacements,
    ) -> OptResult<SlicedCopy> {
        let mut src_ids = vec![self.src];
        let mut dst_ids = vec![self.dst];
        for o in others {
            src_ids.push(o.src);
            dst_ids.push(o.dst);
        }
        Ok(SlicedCopy {
            src: merge_signals_or_views(arena, &src_ids, MERGE_AXIS, replacements)?,
            dst: merge_signals_or_views(arena, &dst_ids, MERGE_AXIS, replacements)?,
            inc: self.inc,
        })
    }
}

/// `y += A @ x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotInc {
    pub a: SignalId,
    pub x: SignalId,
    pub y: SignalId,
}

impl DotInc {
    pub fn sets(&self) -> Vec<SignalId> {
        vec![]
    }
    pub fn incs(&self) -> Vec<SignalId> {
        vec![self.y]
    }
    pub fn reads(&self) -> Vec<SignalId> {
        vec![self.a, self.x]
    }
    pub fn updates(&self) -> Vec<SignalId> {
        vec![]
    }

    pub fn can_merge(&self, _other: &DotInc) -> bool {
        true
    }

    pub fn merge(
        &self,
        others: &[&DotInc],
        arena: &mut SignalArena,
        replacements: &mut SignalReplacements,
    ) -> OptResult<DotInc> {
        let mut a_ids = vec![self.a];
        let mut x_ids = vec![self.x];
        let mut y_ids = vec![self.y];
        for o in others {
            a_ids.push(o.a);
            x_ids.push(o.x);
            y_ids.push(o.y);
        }
        Ok(DotInc {
            a: merge_signals_or_views(arena, &a_ids, MERGE_AXIS, replacements)?,
            x: merge_signals_or_views(arena, &x_ids, MERGE_AXIS, replacements)?,
            y: merge_signals_or_views(arena, &y_ids, MERGE_AXIS, replacements)?,
        })
    }
}

/// One step of a neuron population's nonlinearity: reads `j` (input
/// current), writes `output` and zero or more persistent `states`
/// (e.g. refractory time, adaptation level). Grounded directly on
/// `SimNeurons` in `original_source/nengo/builder/neurons.py`:
/// `sets=[output]+states, incs=[], reads=[J], updates=[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimNeurons {
    pub model: NeuronModelId,
    pub j: SignalId,
    pub output: SignalId,
    pub states: Vec<SignalId>,
}

impl SimNeurons {
    pub fn sets(&self) -> Vec<SignalId> {
        let mut v = vec![self.output];
        v.extend(self.states.iter().copied());
        v
    }
    pub fn incs(&self) -> Vec<SignalId> {
        vec![]
    }
    pub fn reads(&self) -> Vec<SignalId> {
        vec![self.j]
    }
    pub fn updates(&self) -> Vec<SignalId> {
        vec![]
    }

    /// `self.neurons == other.neurons` in the original: same neuron
    /// model instance, and (since merging zips state lists positionally)
    /// the same number of state signals.
    pub fn can_merge(&self, other: &SimNeurons) -> bool {
        self.model == other.model && self.states.len() == other.states.len()
    }

    pub fn merge(
        &self,
        others: &[&SimNeurons],
        arena: &mut SignalArena,
        replacements: &mut SignalReplacements,
    ) -> OptResult<SimNeurons> {
        let mut j_ids = vec![self.j];
        let mut output_ids = vec![self.output];
        for o in others {
            j_ids.push(o.j);
            output_ids.push(o.output);
        }
        let merged_j = merge_signals_or_views(arena, &j_ids, MERGE_AXIS, replacements)?;
        let merged_output = merge_signals_or_views(arena, &output_ids, MERGE_AXIS, replacements)?;

        let mut merged_states = Vec::with_capacity(self.states.len());
        for state_idx in 0..self.states.len() {
            let mut ids = vec![self.states[state_idx]];
            for o in others {
                ids.push(o.states[state_idx]);
            }
            merged_states.push(merge_signals_or_views(arena, &ids, MERGE_AXIS, replacements)?);
        }

        Ok(SimNeurons {
            model: self.model,
            j: merged_j,
            output: merged_output,
            states: merged_states,
        })
    }
}
