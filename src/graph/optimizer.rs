//! The merge optimizer driver (spec.md §4.3) — the ~50% component. Ported
//! from `OpMergeOptimizer` in `original_source/nengo/builder/optimizer.py`:
//! `optimize` / `_perform_single_pass` / `_perform_merges` /
//! `_perform_merges_for_subset` / `_merge` / `_update_dg` /
//! `_get_sig_view_replacements` / `_replace_op_signals`, restructured
//! around explicit arenas and index remaps instead of in-place attribute
//! rewriting.

use std::time::Instant;

use indexmap::{IndexMap, IndexSet};

use crate::config::OptimizerConfig;
use crate::error::OptResult;
use crate::graph::{Model, OperatorId};
use crate::operator::{Operator, OperatorKind};
use crate::signal::merge::{rewrite_view_onto_new_base, SignalReplacements};
use crate::signal::SignalId;

/// Drives the multi-pass fusion sweep over a [`Model`], in place.
pub struct MergeOptimizer {
    config: OptimizerConfig,
}

impl MergeOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(OptimizerConfig::default())
    }

    /// Alternates views-only and non-view passes (spec.md §4.3) until a
    /// round of the two in sequence fails to shrink the live operator
    /// count, or `max_passes` is hit. Returns the number of passes run.
    ///
    /// The source's driver toggles `only_merge_ops_with_view` based on
    /// whether the *previous* pass was productive; this restates that as
    /// a fixed-order round (views pass, then non-view pass) repeated
    /// until unproductive, which satisfies the same "alternate until no
    /// progress" contract (spec.md §9 Open Question) without depending
    /// on which mode happens to run first.
    pub fn optimize(&self, model: &mut Model) -> OptResult<usize> {
        let mut passes = 0;
        loop {
            let size_before_round = model.operator_count();

            self.run_pass(model, true)?;
            passes += 1;
            if passes >= self.config.max_passes {
                break;
            }

            self.run_pass(model, false)?;
            passes += 1;
            if passes >= self.config.max_passes {
                break;
            }

            if model.operator_count() >= size_before_round {
                break;
            }
        }
        Ok(passes)
    }

    fn run_pass(&self, model: &mut Model, views_only: bool) -> OptResult<bool> {
        let t0 = Instant::now();
        let before = model.operator_count();
        let span = tracing::info_span!("merge_pass", views_only);
        let _enter = span.enter();

        let topo = model.dg().topo_sort()?;
        let closure = model.dg().transitive_closure(&topo);

        let mut buckets: IndexMap<OperatorKind, Vec<OperatorId>> = IndexMap::new();
        for &id in &topo {
            let op = model.operator(id);
            if !op.supports_merge() {
                continue;
            }
            let has_view = view_slot_indices(model, op)?.len() > 0;
            if views_only && !has_view {
                continue;
            }
            if !views_only && has_view {
                continue;
            }
            buckets.entry(op.kind()).or_default().push(id);
        }

        if self.config.log_kind_histograms {
            for (kind, ops) in &buckets {
                tracing::debug!(?kind, count = ops.len(), "operator kind histogram");
            }
        }

        let mut op_replacements: IndexMap<OperatorId, OperatorId> = IndexMap::new();
        let mut sig_replacements: SignalReplacements = SignalReplacements::new();
        let mut poisoned: IndexSet<OperatorId> = IndexSet::new();

        let all_bucketed_ops: Vec<OperatorId> = buckets.values().flatten().copied().collect();

        let mut seen_kinds: IndexSet<OperatorKind> = IndexSet::new();
        let ordered_kinds: Vec<OperatorKind> = self
            .config
            .heuristic_order
            .iter()
            .copied()
            .chain(buckets.keys().copied())
            .collect();

        let mut any_kind_produced = false;
        for kind in ordered_kinds {
            if !seen_kinds.insert(kind) {
                continue;
            }
            let Some(ops) = buckets.get(&kind) else {
                continue;
            };
            let mut ops: Vec<OperatorId> = ops.iter().copied().filter(|id| !poisoned.contains(id)).collect();
            ops.sort_by_key(|&id| first_view_offset(model, id).unwrap_or(0));

            let produced = perform_merges_for_kind(
                model,
                &ops,
                &all_bucketed_ops,
                &closure,
                &mut poisoned,
                &mut op_replacements,
                &mut sig_replacements,
            )?;
            if produced {
                any_kind_produced = true;
            }

            if !views_only && produced {
                // "if not only_merge_ops_with_view and len(opr) > 0: break"
                break;
            }
        }

        apply_replacements(model, &mut op_replacements, &mut sig_replacements)?;

        let after = model.operator_count();
        tracing::info!(
            before,
            after,
            duration_ms = t0.elapsed().as_secs_f64() * 1000.0,
            "merge pass complete"
        );

        Ok(any_kind_produced)
    }
}

fn view_slot_indices(model: &Model, op: &Operator) -> OptResult<Vec<usize>> {
    let mut out = Vec::new();
    for (i, sid) in op.all_signals().into_iter().enumerate() {
        if model.signals.get(sid)?.is_view() {
            out.push(i);
        }
    }
    Ok(out)
}

fn first_view_offset(model: &Model, id: OperatorId) -> OptResult<isize> {
    let op = model.operator(id);
    for sid in op.all_signals() {
        let s = model.signals.get(sid)?;
        if s.is_view() {
            return Ok(s.offset_bytes());
        }
    }
    Ok(0)
}

/// End (offset + size*itemsize) of the first view signal in `op`'s
/// signature, or its start offset if it has no view (so the break
/// condition below degenerates to a no-op for base-only operators).
fn first_view_end_offset(model: &Model, id: OperatorId) -> OptResult<isize> {
    let op = model.operator(id);
    for sid in op.all_signals() {
        let s = model.signals.get(sid)?;
        if s.is_view() {
            return Ok(s.offset_bytes() + s.size() as isize * s.itemsize() as isize);
        }
    }
    Ok(0)
}

fn mutually_independent(
    closure: &IndexMap<OperatorId, IndexSet<OperatorId>>,
    a: OperatorId,
    b: OperatorId,
) -> bool {
    let a_desc = closure.get(&a).map(|s| s.contains(&b)).unwrap_or(false);
    let b_desc = closure.get(&b).map(|s| s.contains(&a)).unwrap_or(false);
    !a_desc && !b_desc
}

/// View indices must match positionally, and at each such index dtype,
/// base, and strides must agree (spec.md §4.3 step 6).
fn matches_at_view_slots(
    model: &Model,
    a: &Operator,
    b: &Operator,
    a_view_idx: &[usize],
) -> OptResult<bool> {
    let b_view_idx = view_slot_indices(model, b)?;
    if a_view_idx != b_view_idx {
        return Ok(false);
    }
    let a_sigs = a.all_signals();
    let b_sigs = b.all_signals();
    for &idx in a_view_idx {
        let sa = model.signals.get(a_sigs[idx])?;
        let sb = model.signals.get(b_sigs[idx])?;
        if sa.dtype() != sb.dtype() {
            return Ok(false);
        }
        if model.signals.base_id(a_sigs[idx])? != model.signals.base_id(b_sigs[idx])? {
            return Ok(false);
        }
        if sa.strides_bytes() != sb.strides_bytes() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Zips `tail`'s and `candidate`'s signal slots: base/base is always
/// fine, view/view must be exactly adjacent byte ranges on the same
/// base with the same strides, and a mixed base/view pair in the same
/// slot breaks sequentiality outright (spec.md §4.3 step 6).
fn is_sequential(model: &Model, tail: &Operator, candidate: &Operator) -> OptResult<bool> {
    let tail_sigs = tail.all_signals();
    let cand_sigs = candidate.all_signals();
    if tail_sigs.len() != cand_sigs.len() {
        return Ok(false);
    }
    for (&t, &c) in tail_sigs.iter().zip(cand_sigs.iter()) {
        let ts = model.signals.get(t)?;
        let cs = model.signals.get(c)?;
        match (ts.is_view(), cs.is_view()) {
            (false, false) => continue,
            (true, true) => {
                if model.signals.base_id(t)? != model.signals.base_id(c)? {
                    return Ok(false);
                }
                if ts.strides_bytes() != cs.strides_bytes() {
                    return Ok(false);
                }
                let tail_end = ts.offset_bytes() + ts.size() as isize * ts.itemsize() as isize;
                if tail_end != cs.offset_bytes() {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Sweeps `ops` (already sorted by first-view offset) left to right,
/// greedily growing clusters of mutually independent, positionally
/// compatible, sequentially-laid-out operators, and fuses every cluster
/// of size >= 2 (spec.md §4.3 steps 5-6).
///
/// Poisoning after a successful merge is scanned over `all_ops`, every
/// operator bucketed for this pass across *all* kinds, not just this
/// kind's own `ops` slice: signal ids are shared across operator kinds
/// as the normal output of `infer_dependencies`, so a cluster fused here
/// can just as well poison an operator waiting in a different kind's
/// bucket later in the same pass.
fn perform_merges_for_kind(
    model: &mut Model,
    ops: &[OperatorId],
    all_ops: &[OperatorId],
    closure: &IndexMap<OperatorId, IndexSet<OperatorId>>,
    poisoned: &mut IndexSet<OperatorId>,
    op_replacements: &mut IndexMap<OperatorId, OperatorId>,
    sig_replacements: &mut SignalReplacements,
) -> OptResult<bool> {
    let mut produced = false;
    let mut consumed: IndexSet<OperatorId> = IndexSet::new();

    for i in 0..ops.len() {
        let op1_id = ops[i];
        if consumed.contains(&op1_id) || poisoned.contains(&op1_id) {
            continue;
        }
        let op1 = model.operator(op1_id).clone();
        if op1.all_signals().is_empty() {
            // Spec.md §8: "operators with empty all_signals never merge
            // (no sequentiality condition to satisfy)" — the zip-based
            // sequentiality check below is vacuously true on an empty
            // signature, so this case needs an explicit guard rather than
            // falling out of the general logic.
            continue;
        }
        let view_idx = view_slot_indices(model, &op1)?;
        let cluster_first_view_end = first_view_end_offset(model, op1_id)?;

        let mut cluster: Vec<OperatorId> = vec![op1_id];
        let mut tail = op1.clone();

        for &op2_id in ops.iter().skip(i + 1) {
            if consumed.contains(&op2_id) || poisoned.contains(&op2_id) {
                continue;
            }
            let op2 = model.operator(op2_id).clone();
            if op2.all_signals().is_empty() {
                continue;
            }

            if !op1.can_merge(&op2) {
                continue;
            }
            if !matches_at_view_slots(model, &op1, &op2, &view_idx)? {
                continue;
            }
            if !cluster.iter().all(|&m| mutually_independent(closure, m, op2_id)) {
                continue;
            }

            if is_sequential(model, &tail, &op2)? {
                cluster.push(op2_id);
                tail = op2;
                consumed.insert(op2_id);
                continue;
            }

            let op2_offset = first_view_offset(model, op2_id)?;
            if !view_idx.is_empty() && op2_offset > cluster_first_view_end {
                break;
            }
        }

        if cluster.len() < 2 {
            continue;
        }

        let cluster_ops: Vec<Operator> = cluster.iter().map(|&id| model.operator(id).clone()).collect();
        let peers: Vec<&Operator> = cluster_ops[1..].iter().collect();
        let (fused, merge_sig_reps) = cluster_ops[0].merge(&peers, &mut model.signals)?;
        let fused_id = model.push_operator(fused);

        let involved: IndexSet<SignalId> = cluster_ops.iter().flat_map(|o| o.all_signals()).collect();
        for &old in &cluster {
            op_replacements.insert(old, fused_id);
        }
        for (old_sig, new_sig) in merge_sig_reps {
            sig_replacements.insert(old_sig, new_sig);
        }

        for &other_id in all_ops {
            if cluster.contains(&other_id) || consumed.contains(&other_id) || poisoned.contains(&other_id) {
                continue;
            }
            let other = model.operator(other_id);
            if other.all_signals().iter().any(|s| involved.contains(s)) {
                poisoned.insert(other_id);
            }
        }

        consumed.insert(op1_id);
        produced = true;
    }

    Ok(produced)
}

/// Rebuilds `op` with every signal id present in `map` replaced. Custom
/// operators opt out: rewriting an opaque trait object's internal slots
/// positionally isn't possible without extending `CustomOperator` with
/// its own rewrite hook, so a custom operator that outlives a pass
/// unchanged keeps its original signal ids (fine, since a custom
/// operator can only appear in `op_replacements` with the identity
/// mapping in that case — this crate never merges across `Custom`
/// boundaries into a third kind).
fn rewrite_operator_signals(op: &Operator, map: &SignalReplacements) -> Operator {
    let r = |id: SignalId| *map.get(&id).unwrap_or(&id);
    match op {
        Operator::ElementwiseInc(o) => Operator::ElementwiseInc(crate::operator::ElementwiseInc {
            a: r(o.a),
            b: r(o.b),
            y: r(o.y),
        }),
        Operator::SlicedCopy(o) => Operator::SlicedCopy(crate::operator::SlicedCopy {
            src: r(o.src),
            dst: r(o.dst),
            inc: o.inc,
        }),
        Operator::DotInc(o) => Operator::DotInc(crate::operator::DotInc {
            a: r(o.a),
            x: r(o.x),
            y: r(o.y),
        }),
        Operator::SimNeurons(o) => Operator::SimNeurons(crate::operator::SimNeurons {
            model: o.model,
            j: r(o.j),
            output: r(o.output),
            states: o.states.iter().map(|&s| r(s)).collect(),
        }),
        Operator::Custom(_) => op.clone(),
    }
}

/// Steps 7-10 of spec.md §4.3: propagates view-rewrite replacements to
/// every surviving operator that references a merged base but wasn't
/// itself part of a cluster, rebuilds any touched operator as a new
/// arena entry, then rewrites the DG, live set, and `model.sig` through
/// the accumulated replacement maps.
fn apply_replacements(
    model: &mut Model,
    op_replacements: &mut IndexMap<OperatorId, OperatorId>,
    sig_replacements: &mut SignalReplacements,
) -> OptResult<()> {
    let mut base_remap: IndexMap<SignalId, SignalId> = IndexMap::new();
    for (&old, &new) in sig_replacements.iter() {
        if let Ok(old_sig) = model.signals.get(old) {
            if !old_sig.is_view() {
                base_remap.insert(old, model.signals.base_id(new)?);
            }
        }
    }

    let live_ids: Vec<OperatorId> = model.live_operators().collect();
    for id in live_ids {
        if op_replacements.contains_key(&id) {
            continue;
        }
        let op = model.operator(id).clone();
        let mut local: SignalReplacements = SignalReplacements::new();

        for sid in op.all_signals() {
            if let Some(&new_sid) = sig_replacements.get(&sid) {
                local.insert(sid, new_sid);
                continue;
            }
            let old_base = model.signals.base_id(sid)?;
            if let Some(&new_base) = base_remap.get(&old_base) {
                let rewritten = rewrite_view_onto_new_base(&mut model.signals, sid, new_base)?;
                sig_replacements.insert(sid, rewritten);
                local.insert(sid, rewritten);
            }
        }

        if local.is_empty() {
            op_replacements.insert(id, id);
        } else {
            let rewritten_op = rewrite_operator_signals(&op, &local);
            let new_id = model.push_operator(rewritten_op);
            op_replacements.insert(id, new_id);
        }
    }

    model.apply_operator_replacements(op_replacements);
    model.apply_signal_replacements(sig_replacements);
    Ok(())
}
