use thiserror::Error;

/// Errors surfaced at the crate's fallible API boundaries.
///
/// Most of the merge optimizer's internal rejections are not errors at
/// all (see the `compatible`/`can_merge` family of predicates, which just
/// return `false`) — this type only covers the cases spec.md §7 classes
/// as genuine invariant violations or configuration mistakes.
#[derive(Error, Debug)]
pub enum OptError {
    #[error("shapes incompatible: expected {expected:?}, found {found:?}")]
    IncompatibleShapes {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("signal {0:?} is a view; operation requires a base signal")]
    NotABase(crate::signal::SignalId),
    #[error("signal {0:?} is a base signal; operation requires a view")]
    NotAView(crate::signal::SignalId),
    #[error("cannot merge: {0}")]
    Unmergeable(String),
    #[error("views are not sequential: gap between offset {prev_end} and {next_offset}")]
    NonSequentialViews { prev_end: isize, next_offset: isize },
    #[error("signal arena has no entry for id {0:?}")]
    UnknownSignal(crate::signal::SignalId),
    #[error("operator references unknown operator id {0:?}")]
    UnknownOperator(crate::graph::OperatorId),
    #[error("dependency graph contains a cycle")]
    CyclicGraph,
    #[error("config error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

pub type OptResult<T> = Result<T, OptError>;
