//! Extension point for operator kinds outside the pre-enumerated closed
//! set (spec.md §9, "Dynamic dispatch on operator kind": tagged variants
//! for the built-ins, a small trait for extension kinds).

use std::fmt::Debug;

use crate::error::OptResult;
use crate::signal::{SignalArena, SignalId};
use crate::signal::merge::SignalReplacements;

/// A user-defined operator kind, registered with [`typetag`] so it can
/// round-trip through the same `Operator` serialization as the built-in
/// kinds.
#[typetag::serde(tag = "custom_kind")]
pub trait CustomOperator: Debug + Send + Sync {
    /// The ordered `sets ++ incs ++ reads ++ updates` signature used for
    /// view-index matching during clustering.
    fn all_signals(&self) -> Vec<SignalId>;

    /// Whether this kind ever participates in merges at all.
    fn supports_merge(&self) -> bool {
        true
    }

    /// Kind-local compatibility check; the optimizer has already
    /// confirmed `other` carries the same `custom_kind` tag before this
    /// is called.
    fn can_merge(&self, other: &dyn CustomOperator) -> bool;

    /// Fuses `self` with `others`, consuming/replacing signals through
    /// `arena` and recording the per-signal replacement in the returned
    /// map, the same contract as the built-in kinds' `merge`.
    fn merge(
        &self,
        others: &[&dyn CustomOperator],
        arena: &mut SignalArena,
        replacements: &mut SignalReplacements,
    ) -> OptResult<Box<dyn CustomOperator>>;

    /// Boxed-clone hook so `Operator` (which holds `Box<dyn CustomOperator>`
    /// in its `Custom` variant) can implement `Clone` without requiring
    /// `CustomOperator: Sized`.
    fn clone_box(&self) -> Box<dyn CustomOperator>;
}

impl Clone for Box<dyn CustomOperator> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}
