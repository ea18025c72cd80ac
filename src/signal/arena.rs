use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};
use crate::signal::{default_strides_bytes, Buffer, DType};

/// Stable index into a [`SignalArena`]. Replacements produced by a merge
/// are recorded as `SignalId -> SignalId` remaps rather than mutation of
/// the signal a caller already holds an id for — ids, once allocated,
/// are never reused or invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub usize);

/// A signal: either a base (owns a buffer) or a view (borrows a slab of
/// another signal's buffer). See spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Signal {
    Base {
        name: String,
        buffer: Buffer,
        readonly: bool,
    },
    View {
        name: String,
        base: SignalId,
        dtype: DType,
        shape: Vec<usize>,
        strides_bytes: Vec<isize>,
        offset_bytes: isize,
        readonly: bool,
    },
}

impl Signal {
    pub fn name(&self) -> &str {
        match self {
            Signal::Base { name, .. } => name,
            Signal::View { name, .. } => name,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Signal::View { .. })
    }

    pub fn readonly(&self) -> bool {
        match self {
            Signal::Base { readonly, .. } => *readonly,
            Signal::View { readonly, .. } => *readonly,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Signal::Base { buffer, .. } => buffer.dtype(),
            Signal::View { dtype, .. } => *dtype,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Signal::Base { buffer, .. } => buffer.shape(),
            Signal::View { shape, .. } => shape,
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn itemsize(&self) -> usize {
        self.dtype().itemsize()
    }

    /// Strides in bytes. Bases report the default row-major strides for
    /// their shape (they always own freshly allocated, contiguous data).
    pub fn strides_bytes(&self) -> Vec<isize> {
        match self {
            Signal::Base { buffer, .. } => buffer.default_strides_bytes(),
            Signal::View { strides_bytes, .. } => strides_bytes.clone(),
        }
    }

    /// Offset in bytes from the base buffer's origin. Always zero for a
    /// base (it is its own origin).
    pub fn offset_bytes(&self) -> isize {
        match self {
            Signal::Base { .. } => 0,
            Signal::View { offset_bytes, .. } => *offset_bytes,
        }
    }

    pub fn elemoffset(&self) -> isize {
        self.offset_bytes() / self.itemsize() as isize
    }

    pub fn elemstrides(&self) -> Vec<isize> {
        let itemsize = self.itemsize() as isize;
        self.strides_bytes().iter().map(|s| s / itemsize).collect()
    }
}

/// Owning store of every signal ever created during building and
/// optimization. Operators and the dependency graph reference signals
/// only by [`SignalId`]; nothing outside this module holds a live
/// reference into a signal's buffer, sidestepping the aliasing hazard
/// spec.md §5 calls out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalArena {
    signals: Vec<Signal>,
}

impl SignalArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, id: SignalId) -> OptResult<&Signal> {
        self.signals.get(id.0).ok_or(OptError::UnknownSignal(id))
    }

    /// Allocates a new base signal owning `buffer`.
    pub fn push_base(&mut self, name: impl Into<String>, buffer: Buffer, readonly: bool) -> SignalId {
        let id = SignalId(self.signals.len());
        self.signals.push(Signal::Base {
            name: name.into(),
            buffer,
            readonly,
        });
        id
    }

    /// Allocates a new view into `base`. Fails (`OptError::NotABase`) if
    /// `base` does not itself refer to a base signal — the structural
    /// enforcement of "views of views are disallowed" from spec.md §3.
    #[allow(clippy::too_many_arguments)]
    pub fn push_view(
        &mut self,
        name: impl Into<String>,
        base: SignalId,
        dtype: DType,
        shape: Vec<usize>,
        strides_bytes: Vec<isize>,
        offset_bytes: isize,
        readonly: bool,
    ) -> OptResult<SignalId> {
        if self.get(base)?.is_view() {
            return Err(OptError::NotABase(base));
        }
        let id = SignalId(self.signals.len());
        self.signals.push(Signal::View {
            name: name.into(),
            base,
            dtype,
            shape,
            strides_bytes,
            offset_bytes,
            readonly,
        });
        Ok(id)
    }

    /// Convenience: allocate a row-major view over the whole of `base`,
    /// with `base`'s own shape and default strides. Used when a merge
    /// wants to hand back "the same data, now addressed as a view."
    pub fn push_full_view(&mut self, name: impl Into<String>, base: SignalId) -> OptResult<SignalId> {
        let b = self.get(base)?;
        let dtype = b.dtype();
        let shape = b.shape().to_vec();
        let strides = b.strides_bytes();
        self.push_view(name, base, dtype, shape, strides, 0, b.readonly())
    }

    /// The ultimate base of `id`: `id` itself if it is already a base,
    /// otherwise the (necessarily base) signal it views.
    pub fn base_id(&self, id: SignalId) -> OptResult<SignalId> {
        match self.get(id)? {
            Signal::Base { .. } => Ok(id),
            Signal::View { base, .. } => Ok(*base),
        }
    }

    /// True iff `a` and `b` are views (or bases) of the same base signal.
    pub fn base_equal(&self, a: SignalId, b: SignalId) -> OptResult<bool> {
        Ok(self.base_id(a)? == self.base_id(b)?)
    }

    /// Materializes the elements denoted by a signal (base or view) by
    /// walking `shape`/`strides_bytes`/`offset_bytes` over the ultimate
    /// base's flat buffer. This is a safe, allocation-based substitute
    /// for NumPy's buffer-protocol aliasing (see SPEC_FULL.md §3.1): it
    /// never takes a raw pointer into the base's data, so it has none of
    /// the live-aliasing hazards the original ad hoc two-pass rewrite
    /// exists to manage.
    pub fn read_elements(&self, id: SignalId) -> OptResult<ndarray::ArrayD<f64>> {
        let signal = self.get(id)?;
        let shape = signal.shape().to_vec();
        let strides = signal.strides_bytes();
        let offset = signal.offset_bytes();
        let itemsize = signal.itemsize() as isize;

        let base_id = self.base_id(id)?;
        let buffer = match self.get(base_id)? {
            Signal::Base { buffer, .. } => buffer,
            Signal::View { .. } => unreachable!("base_id always resolves to a Base"),
        };

        let total: usize = shape.iter().product();
        let mut out = Vec::with_capacity(total);
        let mut multi_index = vec![0usize; shape.len()];
        for _ in 0..total {
            let mut byte_off = offset;
            for (idx, stride) in multi_index.iter().zip(strides.iter()) {
                byte_off += *idx as isize * stride;
            }
            let flat = (byte_off / itemsize) as usize;
            out.push(buffer.flat_f64(flat));

            // odometer increment, row-major (last axis fastest)
            for axis in (0..shape.len()).rev() {
                multi_index[axis] += 1;
                if multi_index[axis] < shape[axis] {
                    break;
                }
                multi_index[axis] = 0;
            }
        }

        Ok(ndarray::ArrayD::from_shape_vec(shape, out)
            .expect("element count matches shape by construction"))
    }

    /// Returns a view into `id` selecting `range` along `axis`, the
    /// arena-based analogue of Python's `Signal.__getitem__`/slicing.
    /// Used by tests exercising the round-trip properties of spec.md §8.
    pub fn slice_axis(
        &mut self,
        id: SignalId,
        axis: usize,
        range: std::ops::Range<usize>,
    ) -> OptResult<SignalId> {
        let signal = self.get(id)?.clone();
        let base = self.base_id(id)?;
        let mut shape = signal.shape().to_vec();
        let strides = signal.strides_bytes();
        let start = range.start;
        shape[axis] = range.end - range.start;
        let offset = signal.offset_bytes() + start as isize * strides[axis];
        let name = format!("{}[{}:{}]", signal.name(), range.start, range.end);
        self.push_view(
            name,
            base,
            signal.dtype(),
            shape,
            strides,
            offset,
            signal.readonly(),
        )
    }
}

/// Default strides a fresh base signal of this shape/dtype would report,
/// exposed for callers building synthetic views in tests.
pub fn base_strides_bytes(shape: &[usize], dtype: DType) -> Vec<isize> {
    default_strides_bytes(shape, dtype.itemsize())
}
