//! Concatenation and compatibility predicates (spec.md §4.1), ported
//! directly from `Signal.merge_signals` / `Signal.merge_views` /
//! `Signal.merge_signals_or_views` / `Signal.compatible` in
//! `original_source/nengo/builder/signal.py`.

use indexmap::IndexMap;

use crate::error::{OptError, OptResult};
use crate::signal::{Buffer, DType, Signal, SignalArena, SignalId};

/// Maps a pre-merge signal to the view that replaces it in every
/// surviving operator. Uses `IndexMap` (not `HashMap`) for the same
/// reason the dependency graph does: spec.md §5 requires deterministic
/// iteration wherever iteration order can affect clustering, and the
/// driver iterates `sig_replacements` while rewriting operator signal
/// lists.
pub type SignalReplacements = IndexMap<SignalId, SignalId>;

/// `Signal.compatible`: true iff every signal in `ids` has the same
/// rank, the same shape on every axis but `axis`, the same dtype, and —
/// for views — the same base and strides.
pub fn compatible(arena: &SignalArena, ids: &[SignalId], axis: usize) -> OptResult<bool> {
    if ids.is_empty() {
        return Ok(true);
    }
    let first = arena.get(ids[0])?;
    for &id in &ids[1..] {
        let s = arena.get(id)?;
        if s.ndim() != first.ndim() {
            return Ok(false);
        }
        if !shapes_match_except_axis(first.shape(), s.shape(), axis) {
            return Ok(false);
        }
        if s.dtype() != first.dtype() {
            return Ok(false);
        }
        if s.is_view() {
            if !first.is_view() || !arena.base_equal(id, ids[0])? {
                return Ok(false);
            }
            if s.strides_bytes() != first.strides_bytes() {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn shapes_match_except_axis(a: &[usize], b: &[usize], axis: usize) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .enumerate()
        .all(|(i, (x, y))| i == axis || x == y)
}

fn check_signals_mergeable(arena: &SignalArena, ids: &[SignalId], axis: usize) -> OptResult<()> {
    if ids.is_empty() {
        return Err(OptError::Unmergeable("no signals to merge".into()));
    }
    for &id in ids {
        if arena.get(id)?.is_view() {
            return Err(OptError::Unmergeable(
                "merge_signals cannot merge views".into(),
            ));
        }
    }
    let first = arena.get(ids[0])?;
    for &id in &ids[1..] {
        let s = arena.get(id)?;
        if s.ndim() != first.ndim() {
            return Err(OptError::Unmergeable(
                "signals must have the same number of dimensions".into(),
            ));
        }
        if !shapes_match_except_axis(first.shape(), s.shape(), axis) {
            return Err(OptError::Unmergeable(
                "signals must have same shape except on concatenation axis".into(),
            ));
        }
        if s.dtype() != first.dtype() {
            return Err(OptError::Unmergeable("signals must share a dtype".into()));
        }
    }
    Ok(())
}

fn concat_buffers(buffers: &[&Buffer], axis: usize) -> OptResult<Buffer> {
    let dtype = buffers[0].dtype();
    match dtype {
        DType::F32 => {
            let views: Vec<_> = buffers
                .iter()
                .map(|b| match b {
                    Buffer::F32(a) => a.view(),
                    _ => unreachable!("dtype checked by check_signals_mergeable"),
                })
                .collect();
            let merged = ndarray::concatenate(ndarray::Axis(axis), &views)
                .map_err(|e| OptError::Unmergeable(e.to_string()))?;
            Ok(Buffer::F32(merged))
        }
        DType::F64 => {
            let views: Vec<_> = buffers
                .iter()
                .map(|b| match b {
                    Buffer::F64(a) => a.view(),
                    _ => unreachable!("dtype checked by check_signals_mergeable"),
                })
                .collect();
            let merged = ndarray::concatenate(ndarray::Axis(axis), &views)
                .map_err(|e| OptError::Unmergeable(e.to_string()))?;
            Ok(Buffer::F64(merged))
        }
    }
}

/// `Signal.merge_signals`: concatenates a sequence of *base* signals
/// along `axis` into one new base, recording `old -> view` in
/// `replacements` for each input. Fails if any input is a view.
pub fn merge_signals(
    arena: &mut SignalArena,
    ids: &[SignalId],
    axis: usize,
    replacements: &mut SignalReplacements,
) -> OptResult<SignalId> {
    check_signals_mergeable(arena, ids, axis)?;

    let mut names = Vec::with_capacity(ids.len());
    let mut buffers = Vec::with_capacity(ids.len());
    let mut readonly = true;
    for &id in ids {
        let s = arena.get(id)?;
        names.push(s.name().to_string());
        readonly &= s.readonly();
        match s {
            Signal::Base { buffer, .. } => buffers.push(buffer),
            Signal::View { .. } => unreachable!("checked above"),
        }
    }
    let merged_buffer = concat_buffers(&buffers, axis)?;
    let merged_name = format!("merged<{}>", names.join(", "));
    let merged_id = arena.push_base(merged_name, merged_buffer, readonly);

    let mut start = 0usize;
    for &id in ids {
        let s = arena.get(id)?.clone();
        let size = s.shape()[axis];
        let view_id = arena.slice_axis(merged_id, axis, start..start + size)?;
        replacements.insert(id, view_id);
        start += size;
    }

    Ok(merged_id)
}

/// `Signal.merge_views`: requires every input to already be a view
/// sharing a base, dtype, rank, strides and non-concat-axis shape, with
/// **exactly sequential** byte ranges; produces one view spanning the
/// combined range with the same strides. No data is copied — this is
/// purely an index-arithmetic operation.
///
/// Records `old -> merged_view` in `replacements` for every input, the
/// same contract `merge_signals` honors for bases, so a caller that
/// threads the accumulated map into `model.sig` (spec.md §4.3 step 10)
/// sees every pre-merge view — not just pre-merge bases — resolve to its
/// post-merge replacement.
pub fn merge_views(
    arena: &mut SignalArena,
    ids: &[SignalId],
    axis: usize,
    replacements: &mut SignalReplacements,
) -> OptResult<SignalId> {
    if ids.iter().any(|&id| !matches!(arena.get(id), Ok(s) if s.is_view())) {
        return Err(OptError::Unmergeable(
            "merge_views cannot merge non-views".into(),
        ));
    }

    let first = arena.get(ids[0])?.clone();
    let base0 = arena.base_id(ids[0])?;
    let mut expect_offset = first.offset_bytes();
    let mut total_axis_size = 0usize;
    let mut readonly = true;

    for &id in ids {
        let s = arena.get(id)?.clone();
        if arena.base_id(id)? != base0 {
            return Err(OptError::Unmergeable(
                "signals must share the same base".into(),
            ));
        }
        if s.dtype() != first.dtype() {
            return Err(OptError::Unmergeable("signals must have same dtype".into()));
        }
        if s.ndim() != first.ndim() {
            return Err(OptError::Unmergeable(
                "signals must have the same number of dimensions".into(),
            ));
        }
        if s.strides_bytes() != first.strides_bytes() {
            return Err(OptError::Unmergeable(
                "signals must have equal strides".into(),
            ));
        }
        if !shapes_match_except_axis(first.shape(), s.shape(), axis) {
            return Err(OptError::Unmergeable(
                "signals must have same shape except on concatenation axis".into(),
            ));
        }
        if s.offset_bytes() != expect_offset {
            return Err(OptError::NonSequentialViews {
                prev_end: expect_offset,
                next_offset: s.offset_bytes(),
            });
        }
        readonly &= s.readonly();
        total_axis_size += s.shape()[axis];
        expect_offset = s.offset_bytes() + s.size() as isize * s.itemsize() as isize;
    }

    let mut shape = first.shape().to_vec();
    shape[axis] = total_axis_size;
    let base_name = arena.get(base0)?.name().to_string();

    let merged_id = arena.push_view(
        base_name,
        base0,
        first.dtype(),
        shape,
        first.strides_bytes(),
        first.offset_bytes(),
        readonly,
    )?;

    for &id in ids {
        replacements.insert(id, merged_id);
    }

    Ok(merged_id)
}

/// `Signal.merge_signals_or_views`: dispatches to [`merge_signals`] when
/// every input is a base, to [`merge_views`] when every input is a view,
/// and fails on a mixed list.
pub fn merge_signals_or_views(
    arena: &mut SignalArena,
    ids: &[SignalId],
    axis: usize,
    replacements: &mut SignalReplacements,
) -> OptResult<SignalId> {
    let mut all_views = true;
    let mut any_views = false;
    for &id in ids {
        if arena.get(id)?.is_view() {
            any_views = true;
        } else {
            all_views = false;
        }
    }
    if all_views {
        merge_views(arena, ids, axis, replacements)
    } else if !any_views {
        merge_signals(arena, ids, axis, replacements)
    } else {
        Err(OptError::Unmergeable(
            "cannot merge mixed views and non-views".into(),
        ))
    }
}

/// View-replacement propagation rule (spec.md §4.1, `_get_sig_view_replacements`
/// in `original_source/nengo/builder/optimizer.py`): rewrites a view whose
/// base has been merged so it addresses the new base directly.
///
/// `new_offset = old_offset + (new_base_offset if new_base is itself a view else 0)`;
/// `new_strides[i] = old_strides[i] / old_base_strides[i] * new_base_strides[i]`
/// (integer division), with axes beyond the new base's rank padded with a
/// stride multiplier of `1` (the `zip_longest(..., fillvalue=1)` in the
/// original).
pub fn rescale_strides(
    old_strides: &[isize],
    old_base_strides: &[isize],
    new_base_strides: &[isize],
) -> Vec<isize> {
    let len = old_strides.len().max(old_base_strides.len()).max(new_base_strides.len());
    let at = |v: &[isize], i: usize| -> isize { *v.get(i).unwrap_or(&1) };
    (0..len)
        .map(|i| at(old_strides, i) / at(old_base_strides, i) * at(new_base_strides, i))
        .take(old_strides.len())
        .collect()
}

/// Rewrites `view` so it points directly at `new_base` (which replaced
/// `view`'s previous base), applying [`rescale_strides`] and folding the
/// new base's own offset in if `new_base` is itself a view (i.e. the
/// replacement chain collapses to the ultimate base, preserving the
/// "view chains have length <= 1" invariant from spec.md §8).
pub fn rewrite_view_onto_new_base(
    arena: &mut SignalArena,
    view: SignalId,
    new_base: SignalId,
) -> OptResult<SignalId> {
    let v = arena.get(view)?.clone();
    let old_base = arena.base_id(view)?;
    let old_base_strides = arena.get(old_base)?.strides_bytes();

    let (ultimate_base, mut offset, base_strides) = {
        let nb = arena.get(new_base)?.clone();
        if nb.is_view() {
            let ultimate = arena.base_id(new_base)?;
            (ultimate, nb.offset_bytes(), nb.strides_bytes())
        } else {
            (new_base, 0, nb.strides_bytes())
        }
    };
    offset += v.offset_bytes();

    let strides = rescale_strides(&v.strides_bytes(), &old_base_strides, &base_strides);

    arena.push_view(
        v.name().to_string(),
        ultimate_base,
        v.dtype(),
        v.shape().to_vec(),
        strides,
        offset,
        v.readonly(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Buffer;
    use ndarray::array;

    fn base(arena: &mut SignalArena, name: &str, data: Vec<f32>, shape: &[usize]) -> SignalId {
        let a = ndarray::ArrayD::from_shape_vec(shape.to_vec(), data).unwrap();
        arena.push_base(name, Buffer::F32(a), false)
    }

    #[test]
    fn merge_signals_concatenates_and_replaces() {
        let mut arena = SignalArena::new();
        let a = base(&mut arena, "a", vec![1.0, 2.0], &[2]);
        let b = base(&mut arena, "b", vec![3.0, 4.0], &[2]);

        let mut reps = SignalReplacements::new();
        let merged = merge_signals(&mut arena, &[a, b], 0, &mut reps).unwrap();

        assert_eq!(arena.get(merged).unwrap().shape(), &[4]);
        let view_a = reps[&a];
        let view_b = reps[&b];
        assert_eq!(
            arena.read_elements(view_a).unwrap(),
            array![1.0f64, 2.0].into_dyn()
        );
        assert_eq!(
            arena.read_elements(view_b).unwrap(),
            array![3.0f64, 4.0].into_dyn()
        );
    }

    #[test]
    fn merge_views_requires_strict_adjacency() {
        let mut arena = SignalArena::new();
        let base_id = base(&mut arena, "buf", (0..8).map(|x| x as f32).collect(), &[8]);
        let v0 = arena.slice_axis(base_id, 0, 0..4).unwrap();
        let v1 = arena.slice_axis(base_id, 0, 4..8).unwrap();
        let mut reps = SignalReplacements::new();
        let merged = merge_views(&mut arena, &[v0, v1], 0, &mut reps).unwrap();
        assert_eq!(arena.get(merged).unwrap().shape(), &[8]);
        assert_eq!(reps[&v0], merged);
        assert_eq!(reps[&v1], merged);

        // a gap between byte ranges must fail
        let g0 = arena.slice_axis(base_id, 0, 0..2).unwrap();
        let g1 = arena.slice_axis(base_id, 0, 4..6).unwrap();
        assert!(merge_views(&mut arena, &[g0, g1], 0, &mut reps).is_err());
    }

    #[test]
    fn merge_signals_or_views_rejects_mixed_input() {
        let mut arena = SignalArena::new();
        let b = base(&mut arena, "b", vec![1.0, 2.0], &[2]);
        let v = arena.slice_axis(b, 0, 0..1).unwrap();
        let mut reps = SignalReplacements::new();
        assert!(merge_signals_or_views(&mut arena, &[b, v], 0, &mut reps).is_err());
    }

    #[test]
    fn compatible_requires_matching_dtype_and_shape() {
        let mut arena = SignalArena::new();
        let a = base(&mut arena, "a", vec![1.0, 2.0], &[2]);
        let b = base(&mut arena, "b", vec![1.0, 2.0, 3.0], &[3]);
        assert!(compatible(&arena, &[a, b], 0).unwrap());

        let c = base(&mut arena, "c", vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        assert!(!compatible(&arena, &[a, c], 0).unwrap());
    }
}
