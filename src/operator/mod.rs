//! Operator Model (spec.md §4.2): the closed set of built-in operator
//! kinds as a tagged union, plus a `Custom` escape hatch for kinds
//! outside the pre-enumerated set (spec.md §9, "Dynamic dispatch on
//! operator kind").

pub mod custom;
pub mod kinds;
pub mod neuron_model;

pub use custom::CustomOperator;
pub use kinds::{DotInc, ElementwiseInc, SimNeurons, SlicedCopy};
pub use neuron_model::{NeuronModelId, NeuronModelRegistry};

use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};
use crate::signal::merge::SignalReplacements;
use crate::signal::{SignalArena, SignalId};

/// Discriminant used for kind-bucketing in the optimizer driver and for
/// the heuristic pass order in [`crate::config::OptimizerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    ElementwiseInc,
    SlicedCopy,
    DotInc,
    SimNeurons,
    Custom,
}

/// A node in the operator graph. Built-in kinds are plain structs
/// carrying their signal slots directly; `Custom` boxes a
/// [`CustomOperator`] trait object for extension kinds, serialized via
/// `typetag` the same way the kept-for-reference `Operation` trait in
/// this codebase's tensor-graph sibling module was.
#[derive(Debug, Serialize, Deserialize)]
pub enum Operator {
    ElementwiseInc(ElementwiseInc),
    SlicedCopy(SlicedCopy),
    DotInc(DotInc),
    SimNeurons(SimNeurons),
    Custom(Box<dyn CustomOperator>),
}

impl Clone for Operator {
    fn clone(&self) -> Self {
        match self {
            Operator::ElementwiseInc(o) => Operator::ElementwiseInc(o.clone()),
            Operator::SlicedCopy(o) => Operator::SlicedCopy(o.clone()),
            Operator::DotInc(o) => Operator::DotInc(o.clone()),
            Operator::SimNeurons(o) => Operator::SimNeurons(o.clone()),
            Operator::Custom(o) => Operator::Custom(o.clone()),
        }
    }
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::ElementwiseInc(_) => OperatorKind::ElementwiseInc,
            Operator::SlicedCopy(_) => OperatorKind::SlicedCopy,
            Operator::DotInc(_) => OperatorKind::DotInc,
            Operator::SimNeurons(_) => OperatorKind::SimNeurons,
            Operator::Custom(_) => OperatorKind::Custom,
        }
    }

    pub fn sets(&self) -> Vec<SignalId> {
        match self {
            Operator::ElementwiseInc(o) => o.sets(),
            Operator::SlicedCopy(o) => o.sets(),
            Operator::DotInc(o) => o.sets(),
            Operator::SimNeurons(o) => o.sets(),
            Operator::Custom(_) => vec![],
        }
    }

    pub fn incs(&self) -> Vec<SignalId> {
        match self {
            Operator::ElementwiseInc(o) => o.incs(),
            Operator::SlicedCopy(o) => o.incs(),
            Operator::DotInc(o) => o.incs(),
            Operator::SimNeurons(o) => o.incs(),
            Operator::Custom(_) => vec![],
        }
    }

    pub fn reads(&self) -> Vec<SignalId> {
        match self {
            Operator::ElementwiseInc(o) => o.reads(),
            Operator::SlicedCopy(o) => o.reads(),
            Operator::DotInc(o) => o.reads(),
            Operator::SimNeurons(o) => o.reads(),
            Operator::Custom(_) => vec![],
        }
    }

    pub fn updates(&self) -> Vec<SignalId> {
        match self {
            Operator::ElementwiseInc(o) => o.updates(),
            Operator::SlicedCopy(o) => o.updates(),
            Operator::DotInc(o) => o.updates(),
            Operator::SimNeurons(o) => o.updates(),
            Operator::Custom(_) => vec![],
        }
    }

    /// The ordered `sets ++ incs ++ reads ++ updates` signature used for
    /// view-index matching (spec.md §3, §4.2).
    pub fn all_signals(&self) -> Vec<SignalId> {
        if let Operator::Custom(o) = self {
            return o.all_signals();
        }
        let mut v = self.sets();
        v.extend(self.incs());
        v.extend(self.reads());
        v.extend(self.updates());
        v
    }

    pub fn supports_merge(&self) -> bool {
        match self {
            Operator::Custom(o) => o.supports_merge(),
            _ => true,
        }
    }

    /// Kind equivalence plus kind-local parameter equality. Does not
    /// consult signal contents at all — the optimizer layers the
    /// view/stride/sequentiality checks on top using `all_signals`.
    pub fn can_merge(&self, other: &Operator) -> bool {
        match (self, other) {
            (Operator::ElementwiseInc(a), Operator::ElementwiseInc(b)) => a.can_merge(b),
            (Operator::SlicedCopy(a), Operator::SlicedCopy(b)) => a.can_merge(b),
            (Operator::DotInc(a), Operator::DotInc(b)) => a.can_merge(b),
            (Operator::SimNeurons(a), Operator::SimNeurons(b)) => a.can_merge(b),
            (Operator::Custom(a), Operator::Custom(b)) => a.can_merge(b.as_ref()),
            _ => false,
        }
    }

    /// Fuses `self` with `others` (all of the same kind, already
    /// confirmed `can_merge`-compatible and sequential by the caller),
    /// producing the fused operator plus the signal replacement map
    /// accumulated across every merged slot.
    pub fn merge(
        &self,
        others: &[&Operator],
        arena: &mut SignalArena,
    ) -> OptResult<(Operator, SignalReplacements)> {
        let mut replacements = SignalReplacements::new();
        let fused = match self {
            Operator::ElementwiseInc(a) => {
                let peers = downcast_all(others, |o| match o {
                    Operator::ElementwiseInc(x) => Some(x),
                    _ => None,
                })?;
                Operator::ElementwiseInc(a.merge(&peers, arena, &mut replacements)?)
            }
            Operator::SlicedCopy(a) => {
                let peers = downcast_all(others, |o| match o {
                    Operator::SlicedCopy(x) => Some(x),
                    _ => None,
                })?;
                Operator::SlicedCopy(a.merge(&peers, arena, &mut replacements)?)
            }
            Operator::DotInc(a) => {
                let peers = downcast_all(others, |o| match o {
                    Operator::DotInc(x) => Some(x),
                    _ => None,
                })?;
                Operator::DotInc(a.merge(&peers, arena, &mut replacements)?)
            }
            Operator::SimNeurons(a) => {
                let peers = downcast_all(others, |o| match o {
                    Operator::SimNeurons(x) => Some(x),
                    _ => None,
                })?;
                Operator::SimNeurons(a.merge(&peers, arena, &mut replacements)?)
            }
            Operator::Custom(a) => {
                let peers = downcast_all(others, |o| match o {
                    Operator::Custom(x) => Some(x.as_ref()),
                    _ => None,
                })?;
                Operator::Custom(a.merge(&peers, arena, &mut replacements)?)
            }
        };
        Ok((fused, replacements))
    }
}

fn downcast_all<'a, T>(
    others: &[&'a Operator],
    f: impl Fn(&'a Operator) -> Option<T>,
) -> OptResult<Vec<T>> {
    others
        .iter()
        .map(|&o| f(o).ok_or_else(|| OptError::Unmergeable("merge cluster has mixed kinds".into())))
        .collect()
}
