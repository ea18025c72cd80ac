//! Signal & View Algebra (spec.md §4.1).
//!
//! A [`Signal`] is either a *base* — it owns a contiguous backing
//! [`Buffer`] — or a *view*, a typed, strided window into another
//! signal's buffer. Signals live in a [`SignalArena`] and are referenced
//! by the stable [`SignalId`] index rather than by pointer, per the
//! arena design in spec.md §9: replacements produced by a merge are index
//! remaps, not in-place mutation of existing signals.

pub mod arena;
pub mod merge;

pub use arena::{Signal, SignalArena, SignalId};

use serde::{Deserialize, Serialize};

/// Element type carried by a signal's backing buffer.
///
/// The original Nengo signals are always NumPy `float64`; the retrieval
/// pack's own tensor type is `f32`. Rather than generalize over an open
/// numeric trait (which the spec's "element type" attribute technically
/// allows but no concrete operator in the pre-enumerated set needs), this
/// closed two-variant enum covers both precedents and keeps the
/// `dtype`-equality checks in `compatible`/`can_merge` meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    pub fn itemsize(self) -> usize {
        match self {
            DType::F32 => std::mem::size_of::<f32>(),
            DType::F64 => std::mem::size_of::<f64>(),
        }
    }
}

/// Owned backing storage for a base signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Buffer {
    F32(ndarray::ArrayD<f32>),
    F64(ndarray::ArrayD<f64>),
}

impl Buffer {
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Buffer::F32(a) => a.shape(),
            Buffer::F64(a) => a.shape(),
        }
    }

    /// Total element count of the buffer (not of any view onto it).
    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(a) => a.len(),
            Buffer::F64(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat element access as `f64` regardless of underlying dtype, for
    /// the strided-read helper in [`arena`]. Values are widened, never
    /// narrowed, so this never loses precision for `F32` data.
    pub(crate) fn flat_f64(&self, index: usize) -> f64 {
        match self {
            Buffer::F32(a) => a.as_slice().expect("base buffers are contiguous")[index] as f64,
            Buffer::F64(a) => a.as_slice().expect("base buffers are contiguous")[index],
        }
    }

    /// Default C-order (row-major) strides in bytes for this buffer's
    /// shape, matching what a freshly created base signal reports.
    pub fn default_strides_bytes(&self) -> Vec<isize> {
        default_strides_bytes(self.shape(), self.dtype().itemsize())
    }
}

/// Row-major strides in bytes for a shape, given an item size.
pub fn default_strides_bytes(shape: &[usize], itemsize: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = itemsize as isize;
    for i in (0..shape.len()).rev() {
        strides[i] = acc;
        acc *= shape[i] as isize;
    }
    strides
}
