use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};
use crate::operator::OperatorKind;

/// Runtime knobs for the merge optimizer.
///
/// The optimizer's algorithm (spec.md §4.3) is fully specified without any
/// of these — they exist so embedding applications can tune pass limits
/// or logging verbosity without recompiling, the same way a caller would
/// reach for a `figment`/`toml`-backed config struct elsewhere in this
/// codebase's ecosystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Hard cap on the number of passes, independent of the fixpoint
    /// check. A safety valve, not part of the termination contract:
    /// the driver is expected to converge well under this in practice.
    pub max_passes: usize,

    /// The order in which operator kinds are tried within a pass. The
    /// heuristic order from spec.md §4.3 is the default; callers may
    /// reorder it, though that only changes pass count, never the final
    /// fused graph's correctness.
    pub heuristic_order: Vec<OperatorKind>,

    /// Emit a `tracing::debug!` histogram of operator counts by kind at
    /// the start of every pass.
    pub log_kind_histograms: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_passes: 256,
            heuristic_order: vec![
                OperatorKind::ElementwiseInc,
                OperatorKind::SlicedCopy,
                OperatorKind::DotInc,
                OperatorKind::SimNeurons,
            ],
            log_kind_histograms: true,
        }
    }
}

impl OptimizerConfig {
    pub fn from_toml_str(s: &str) -> OptResult<Self> {
        toml::from_str(s).map_err(|e| OptError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> OptResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OptError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_matches_spec_heuristic() {
        let cfg = OptimizerConfig::default();
        assert_eq!(
            cfg.heuristic_order,
            vec![
                OperatorKind::ElementwiseInc,
                OperatorKind::SlicedCopy,
                OperatorKind::DotInc,
                OperatorKind::SimNeurons,
            ]
        );
    }

    #[test]
    fn overrides_max_passes_from_toml() {
        let cfg = OptimizerConfig::from_toml_str("max_passes = 4\n").unwrap();
        assert_eq!(cfg.max_passes, 4);
        assert!(cfg.log_kind_histograms);
    }
}
