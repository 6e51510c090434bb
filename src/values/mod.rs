//! Value tensors of shape `batch_shape + grid_shape`, stored flat in
//! row-major order, plus the layout helpers used by the discretizer and the
//! ADI sweeps.

use serde::{Deserialize, Serialize};

use crate::core::SolverError;
use crate::grid::Grid;

/// Dense value tensor over a batch of grids.
///
/// The batch dimensions are arbitrary and act independently: every scheme and
/// discretizer operation applies per batch element. Internally the batch
/// shape collapses to its product; the spatial part keeps the full grid
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueGrid {
    batch_shape: Vec<usize>,
    grid_shape: Vec<usize>,
    data: Vec<f64>,
}

impl ValueGrid {
    /// Wraps flat row-major data of shape `batch_shape + grid_shape`.
    pub fn new(
        batch_shape: Vec<usize>,
        grid_shape: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self, SolverError> {
        let expected: usize =
            batch_shape.iter().product::<usize>() * grid_shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(SolverError::ShapeMismatch(format!(
                "value data has {} entries, shape {:?}+{:?} needs {}",
                data.len(),
                batch_shape,
                grid_shape,
                expected
            )));
        }
        Ok(Self {
            batch_shape,
            grid_shape,
            data,
        })
    }

    /// Evaluates `f` at every grid point; no batch dimensions.
    pub fn from_grid_fn<F>(grid: &Grid, mut f: F) -> Self
    where
        F: FnMut(&[f64]) -> f64,
    {
        let shape = grid.shape();
        let len = grid.num_points();
        let mut coords = vec![0.0_f64; grid.dim()];
        let mut index = vec![0_usize; grid.dim()];
        let mut data = Vec::with_capacity(len);
        for linear in 0..len {
            unravel_index(linear, &shape, &mut index);
            for (k, &i) in index.iter().enumerate() {
                coords[k] = grid.axis(k)[i];
            }
            data.push(f(&coords));
        }
        Self {
            batch_shape: Vec::new(),
            grid_shape: shape,
            data,
        }
    }

    /// Evaluates `f(batch_index, point)` over a batch of grids.
    pub fn from_batched_fn<F>(batch_shape: &[usize], grid: &Grid, mut f: F) -> Self
    where
        F: FnMut(usize, &[f64]) -> f64,
    {
        let shape = grid.shape();
        let glen = grid.num_points();
        let batch: usize = batch_shape.iter().product();
        let mut coords = vec![0.0_f64; grid.dim()];
        let mut index = vec![0_usize; grid.dim()];
        let mut data = Vec::with_capacity(batch * glen);
        for b in 0..batch {
            for linear in 0..glen {
                unravel_index(linear, &shape, &mut index);
                for (k, &i) in index.iter().enumerate() {
                    coords[k] = grid.axis(k)[i];
                }
                data.push(f(b, &coords));
            }
        }
        Self {
            batch_shape: batch_shape.to_vec(),
            grid_shape: shape,
            data,
        }
    }

    /// Batch dimensions, possibly empty.
    #[inline]
    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// Spatial dimensions.
    #[inline]
    pub fn grid_shape(&self) -> &[usize] {
        &self.grid_shape
    }

    /// Full shape `batch_shape + grid_shape`.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.batch_shape.clone();
        shape.extend_from_slice(&self.grid_shape);
        shape
    }

    /// Product of the batch dimensions (1 for an empty batch shape).
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_shape.iter().product()
    }

    /// Number of points per batch element.
    #[inline]
    pub fn grid_len(&self) -> usize {
        self.grid_shape.iter().product()
    }

    /// Flat row-major storage.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable flat storage.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Value at a flat batch index and a spatial multi-index.
    pub fn at(&self, batch_index: usize, point: &[usize]) -> f64 {
        let strides = row_major_strides(&self.grid_shape);
        let offset: usize = point.iter().zip(&strides).map(|(&i, &s)| i * s).sum();
        self.data[batch_index * self.grid_len() + offset]
    }

    /// Copies out the interior, one point trimmed from each face of every
    /// axis, laid out `[batch, m_1, ..., m_dim]`.
    pub(crate) fn extract_interior(&self) -> Vec<f64> {
        let batch = self.batch_size();
        let glen = self.grid_len();
        let dim = self.grid_shape.len();
        let mshape: Vec<usize> = self.grid_shape.iter().map(|&n| n - 2).collect();
        let mlen: usize = mshape.iter().product();
        let gstrides = row_major_strides(&self.grid_shape);

        let mut out = vec![0.0_f64; batch * mlen];
        let mut index = vec![0_usize; dim];
        for b in 0..batch {
            let src_base = b * glen;
            let dst_base = b * mlen;
            for linear in 0..mlen {
                unravel_index(linear, &mshape, &mut index);
                let mut src = src_base;
                for (k, &i) in index.iter().enumerate() {
                    src += (i + 1) * gstrides[k];
                }
                out[dst_base + linear] = self.data[src];
            }
        }
        out
    }
}

/// Row-major strides for a shape.
pub(crate) fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1_usize; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * shape[k + 1];
    }
    strides
}

/// Decodes a linear row-major index into a multi-index.
#[inline]
pub(crate) fn unravel_index(mut linear: usize, shape: &[usize], out: &mut [usize]) {
    for k in (0..shape.len()).rev() {
        out[k] = linear % shape[k];
        linear /= shape[k];
    }
}

/// Permutes `[batch, s_0, .., s_{d-1}]` data so that `axis` becomes the
/// innermost (contiguous) dimension: `[batch, s_0, .., s_{axis-1}, s_{axis+1},
/// .., s_{d-1}, s_axis]`. `dst` must have `src.len()` capacity in length.
pub(crate) fn rotate_axis_last(
    src: &[f64],
    batch: usize,
    shape: &[usize],
    axis: usize,
    dst: &mut [f64],
) {
    debug_assert_eq!(src.len(), dst.len());
    let n = shape[axis];
    let pre: usize = shape[..axis].iter().product();
    let post: usize = shape[axis + 1..].iter().product();
    let glen = pre * n * post;
    for b in 0..batch {
        let base = b * glen;
        for p in 0..pre {
            for q in 0..post {
                let src_col = base + p * n * post + q;
                let dst_row = base + (p * post + q) * n;
                for k in 0..n {
                    dst[dst_row + k] = src[src_col + k * post];
                }
            }
        }
    }
}

/// Inverse of [`rotate_axis_last`].
pub(crate) fn rotate_axis_back(
    src: &[f64],
    batch: usize,
    shape: &[usize],
    axis: usize,
    dst: &mut [f64],
) {
    debug_assert_eq!(src.len(), dst.len());
    let n = shape[axis];
    let pre: usize = shape[..axis].iter().product();
    let post: usize = shape[axis + 1..].iter().product();
    let glen = pre * n * post;
    for b in 0..batch {
        let base = b * glen;
        for p in 0..pre {
            for q in 0..post {
                let dst_col = base + p * n * post + q;
                let src_row = base + (p * post + q) * n;
                for k in 0..n {
                    dst[dst_col + k * post] = src[src_row + k];
                }
            }
        }
    }
}
