//! Robin boundary conditions and their ghost-point closures.
//!
//! Each face of each axis carries a condition `alpha V + beta dV/dn = gamma`
//! with the outward-normal derivative approximated by a three-point one-sided
//! formula that is second-order accurate on nonuniform spacing. The closure
//! expresses the face value as `V0 = xi1 V1 + xi2 V2 + eta` in terms of the
//! two nearest interior points; the discretizer folds these coefficients into
//! the interior operator, and after a step the same formula restores the face
//! values.

use std::sync::Arc;

use crate::coefficients::{Coefficient, resolve};
use crate::core::SolverError;
use crate::grid::Grid;
use crate::values::{ValueGrid, row_major_strides, unravel_index};

/// The `(alpha, beta, gamma)` triple returned by a boundary callable.
///
/// Each value must broadcast to `batch_shape + grid_shape_without_axis`
/// under the scalar / face / batch+face tiers.
#[derive(Debug, Clone)]
pub struct BoundaryValues {
    pub alpha: Coefficient,
    pub beta: Coefficient,
    pub gamma: Coefficient,
}

/// Boundary callable for one face, invoked at `(t, grid)`.
pub type BoundaryFn = Arc<dyn Fn(f64, &Grid) -> BoundaryValues + Send + Sync>;

/// The pair of boundary conditions on one axis.
#[derive(Clone)]
pub struct BoundarySpec {
    pub lower: BoundaryFn,
    pub upper: BoundaryFn,
}

impl BoundarySpec {
    pub fn new(lower: BoundaryFn, upper: BoundaryFn) -> Self {
        Self { lower, upper }
    }
}

impl std::fmt::Debug for BoundarySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundarySpec").finish_non_exhaustive()
    }
}

/// Dirichlet condition `V = value`, i.e. `(alpha, beta, gamma) = (1, 0, value)`.
pub fn dirichlet<F>(value: F) -> BoundaryFn
where
    F: Fn(f64, &Grid) -> Coefficient + Send + Sync + 'static,
{
    Arc::new(move |t, grid| BoundaryValues {
        alpha: Coefficient::Scalar(1.0),
        beta: Coefficient::Scalar(0.0),
        gamma: value(t, grid),
    })
}

/// Neumann condition `dV/dn = value`, i.e. `(alpha, beta, gamma) = (0, 1, value)`.
pub fn neumann<F>(value: F) -> BoundaryFn
where
    F: Fn(f64, &Grid) -> Coefficient + Send + Sync + 'static,
{
    Arc::new(move |t, grid| BoundaryValues {
        alpha: Coefficient::Scalar(0.0),
        beta: Coefficient::Scalar(1.0),
        gamma: value(t, grid),
    })
}

/// General Robin condition from a callable returning the full triple.
pub fn robin<F>(f: F) -> BoundaryFn
where
    F: Fn(f64, &Grid) -> BoundaryValues + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Lower,
    Upper,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }
}

/// Ghost-point coefficients for every point of one face:
/// `V_face = xi1 V_1 + xi2 V_2 + eta`, flattened `[batch, face]` with the
/// face shape being the full grid shape without the face's axis.
#[derive(Debug, Clone)]
pub(crate) struct FaceClosure {
    pub xi1: Vec<f64>,
    pub xi2: Vec<f64>,
    pub eta: Vec<f64>,
}

/// Evaluates one face's boundary callable at `t` and converts it to closure
/// coefficients using the spacings of the two cells nearest the face.
pub(crate) fn face_closure(
    t: f64,
    grid: &Grid,
    axis: usize,
    side: Side,
    bc: &BoundaryFn,
    batch: usize,
) -> Result<FaceClosure, SolverError> {
    let x = grid.axis(axis);
    let n = x.len();
    let m = n - 2;
    let face_len = grid.num_points() / n;

    let (d0, d1) = match side {
        Side::Lower => (x[1] - x[0], x[2] - x[1]),
        Side::Upper => (x[n - 1] - x[n - 2], x[n - 2] - x[n - 3]),
    };

    let values = bc(t, grid);
    let alpha = resolve(Some(&values.alpha), batch, face_len, "boundary alpha")?;
    let beta = resolve(Some(&values.beta), batch, face_len, "boundary beta")?;
    let gamma = resolve(Some(&values.gamma), batch, face_len, "boundary gamma")?;

    let len = batch * face_len;
    let mut xi1 = vec![0.0_f64; len];
    let mut xi2 = vec![0.0_f64; len];
    let mut eta = vec![0.0_f64; len];

    for b in 0..batch {
        for p in 0..face_len {
            let a = alpha.at(b, p, face_len);
            let bb = beta.at(b, p, face_len);
            let g = gamma.at(b, p, face_len);
            if a == 0.0 && bb == 0.0 {
                return Err(SolverError::MalformedBoundary(format!(
                    "alpha and beta both vanish on the {} face of axis {axis}",
                    side.label()
                )));
            }
            if bb != 0.0 && m < 2 {
                return Err(SolverError::UndersizedGrid(format!(
                    "axis {axis} has {n} points; derivative boundary conditions need at least 4"
                )));
            }
            let kappa = a * d0 * d1 * (d0 + d1) + bb * d1 * (2.0 * d0 + d1);
            if kappa == 0.0 || !kappa.is_finite() {
                return Err(SolverError::MalformedBoundary(format!(
                    "closure denominator vanishes on the {} face of axis {axis}",
                    side.label()
                )));
            }
            let i = b * face_len + p;
            xi1[i] = bb * (d0 + d1) * (d0 + d1) / kappa;
            xi2[i] = -bb * d0 * d0 / kappa;
            eta[i] = g * d0 * d1 * (d0 + d1) / kappa;
        }
    }

    Ok(FaceClosure { xi1, xi2, eta })
}

/// Rebuilds the full-shape value grid from the advanced interior values,
/// restoring every face through its closure at time `t`.
///
/// Axes expand one at a time in index order; a later axis's formula reads
/// values already expanded along earlier axes, so corner points take the last
/// axis's closure.
pub(crate) fn reconstruct_full(
    t: f64,
    grid: &Grid,
    boundaries: &[BoundarySpec],
    batch_shape: &[usize],
    batch: usize,
    interior: &[f64],
) -> Result<ValueGrid, SolverError> {
    let dim = grid.dim();
    let full_shape = grid.shape();

    let mut extents = grid.interior_shape();
    let mut cur = interior.to_vec();
    let mut idx = vec![0_usize; dim];
    let mut face_coords = vec![0_usize; dim.saturating_sub(1)];

    for axis in 0..dim {
        let lower = face_closure(t, grid, axis, Side::Lower, &boundaries[axis].lower, batch)?;
        let upper = face_closure(t, grid, axis, Side::Upper, &boundaries[axis].upper, batch)?;

        let m = extents[axis];
        let expanded = m + 2;
        let mut new_extents = extents.clone();
        new_extents[axis] = expanded;
        let old_glen: usize = extents.iter().product();
        let new_glen: usize = new_extents.iter().product();
        let new_strides = row_major_strides(&new_extents);
        let mut next = vec![0.0_f64; batch * new_glen];

        for b in 0..batch {
            let src_base = b * old_glen;
            let dst_base = b * new_glen;
            for linear in 0..old_glen {
                unravel_index(linear, &extents, &mut idx);
                let mut dst = dst_base;
                for (k, &i) in idx.iter().enumerate() {
                    let coord = if k == axis { i + 1 } else { i };
                    dst += coord * new_strides[k];
                }
                next[dst] = cur[src_base + linear];
            }
        }

        let face_extents: Vec<usize> = extents
            .iter()
            .enumerate()
            .filter_map(|(k, &e)| (k != axis).then_some(e))
            .collect();
        let face_count: usize = face_extents.iter().product();
        let full_face_shape: Vec<usize> = full_shape
            .iter()
            .enumerate()
            .filter_map(|(k, &e)| (k != axis).then_some(e))
            .collect();
        let full_face_strides = row_major_strides(&full_face_shape);
        let face_len: usize = full_face_shape.iter().product();
        let ax_stride = new_strides[axis];

        for b in 0..batch {
            for face_linear in 0..face_count {
                unravel_index(face_linear, &face_extents, &mut face_coords);
                let mut base = b * new_glen;
                let mut full_face_idx = 0_usize;
                let mut c = 0_usize;
                for k in 0..dim {
                    if k == axis {
                        continue;
                    }
                    let coord = face_coords[c];
                    base += coord * new_strides[k];
                    // Axes before `axis` are already expanded, so their
                    // coordinates are full-grid; later axes are still
                    // interior and sit one point in.
                    let full_coord = if k < axis { coord } else { coord + 1 };
                    full_face_idx += full_coord * full_face_strides[c];
                    c += 1;
                }
                let ci = b * face_len + full_face_idx;

                let v1 = next[base + ax_stride];
                let v2 = if m >= 2 { next[base + 2 * ax_stride] } else { 0.0 };
                next[base] = lower.xi1[ci] * v1 + lower.xi2[ci] * v2 + lower.eta[ci];

                let v1 = next[base + m * ax_stride];
                let v2 = if m >= 2 {
                    next[base + (m - 1) * ax_stride]
                } else {
                    0.0
                };
                next[base + (expanded - 1) * ax_stride] =
                    upper.xi1[ci] * v1 + upper.xi2[ci] * v2 + upper.eta[ci];
            }
        }

        cur = next;
        extents = new_extents;
    }

    ValueGrid::new(batch_shape.to_vec(), full_shape, cur)
}
