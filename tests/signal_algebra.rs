use axon_opt::signal::merge::{compatible, merge_signals, merge_views, rescale_strides, SignalReplacements};
use axon_opt::signal::{Buffer, SignalArena};
use ndarray::array;

fn f64_base(arena: &mut SignalArena, name: &str, data: Vec<f64>) -> axon_opt::SignalId {
    arena.push_base(name, Buffer::F64(ndarray::ArrayD::from_shape_vec(vec![data.len()], data).unwrap()), false)
}

#[test]
fn slice_then_read_matches_indexing_the_base() {
    let mut arena = SignalArena::new();
    let base = f64_base(&mut arena, "x", vec![1.0, 2.0, 3.0, 4.0, 5.0]);

    let view = arena.slice_axis(base, 0, 1..4).unwrap();
    let read = arena.read_elements(view).unwrap();

    assert_eq!(read, array![2.0, 3.0, 4.0].into_dyn());
}

#[test]
fn merging_bases_then_reading_replacements_preserves_values() {
    let mut arena = SignalArena::new();
    let a = f64_base(&mut arena, "a", vec![1.0, 2.0]);
    let b = f64_base(&mut arena, "b", vec![3.0, 4.0]);
    let c = f64_base(&mut arena, "c", vec![5.0]);

    let mut reps = SignalReplacements::new();
    let merged = merge_signals(&mut arena, &[a, b, c], 0, &mut reps).unwrap();

    assert_eq!(arena.get(merged).unwrap().shape(), &[5]);
    assert_eq!(arena.read_elements(reps[&a]).unwrap(), array![1.0, 2.0].into_dyn());
    assert_eq!(arena.read_elements(reps[&b]).unwrap(), array![3.0, 4.0].into_dyn());
    assert_eq!(arena.read_elements(reps[&c]).unwrap(), array![5.0].into_dyn());
}

#[test]
fn merge_signals_rejects_a_view_input() {
    let mut arena = SignalArena::new();
    let base = f64_base(&mut arena, "x", vec![1.0, 2.0, 3.0, 4.0]);
    let view = arena.slice_axis(base, 0, 0..2).unwrap();

    let mut reps = SignalReplacements::new();
    assert!(merge_signals(&mut arena, &[base, view], 0, &mut reps).is_err());
}

#[test]
fn adjacent_views_merge_but_gapped_views_do_not() {
    let mut arena = SignalArena::new();
    let base = f64_base(&mut arena, "x", (0..8).map(|v| v as f64).collect());

    let left = arena.slice_axis(base, 0, 0..4).unwrap();
    let right = arena.slice_axis(base, 0, 4..8).unwrap();
    let mut reps = SignalReplacements::new();
    let merged = merge_views(&mut arena, &[left, right], 0, &mut reps).unwrap();
    assert_eq!(arena.get(merged).unwrap().shape(), &[8]);
    assert_eq!(reps[&left], merged);
    assert_eq!(reps[&right], merged);

    let gap_left = arena.slice_axis(base, 0, 0..2).unwrap();
    let gap_right = arena.slice_axis(base, 0, 3..5).unwrap();
    assert!(merge_views(&mut arena, &[gap_left, gap_right], 0, &mut reps).is_err());
}

#[test]
fn compatible_checks_rank_shape_and_dtype() {
    let mut arena = SignalArena::new();
    let a = f64_base(&mut arena, "a", vec![1.0, 2.0]);
    let b = f64_base(&mut arena, "b", vec![3.0, 4.0, 5.0]);
    assert!(compatible(&arena, &[a, b], 0).unwrap());

    let c = arena.push_base(
        "c",
        Buffer::F32(ndarray::ArrayD::from_shape_vec(vec![2], vec![1.0f32, 2.0]).unwrap()),
        false,
    );
    assert!(!compatible(&arena, &[a, c], 0).unwrap());
}

#[test]
fn rescale_strides_pads_shorter_rank_with_one() {
    // A view one axis shallower than its base, concatenated into a base
    // with one more leading axis than the old base: the extra axis gets
    // a stride multiplier of 1, matching `zip_longest(fillvalue=1)`.
    let old_strides = vec![8];
    let old_base_strides = vec![8];
    let new_base_strides = vec![16, 8];
    let rescaled = rescale_strides(&old_strides, &old_base_strides, &new_base_strides);
    assert_eq!(rescaled, vec![8]);
}

#[test]
fn view_of_view_is_structurally_rejected() {
    let mut arena = SignalArena::new();
    let base = f64_base(&mut arena, "x", vec![1.0, 2.0, 3.0, 4.0]);
    let view = arena.slice_axis(base, 0, 0..2).unwrap();
    let dtype = arena.get(view).unwrap().dtype();

    let err = arena.push_view("nested", view, dtype, vec![1], vec![8], 0, false);
    assert!(err.is_err());
}
