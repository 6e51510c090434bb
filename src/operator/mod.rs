//! Spatial discretization: the PDE plus its boundary closures become, per
//! axis, three diagonal tensors and an affine term acting on the interior.
//!
//! The operator is never materialized. With `L = -(D d2 + mu d1 + r)` the
//! semidiscrete equation reads `dV/dt = L V + b`, so every scheme formula
//! holds with a signed time step and backward marching needs no special
//! casing. Cross-derivative terms form a separate stencil that is only ever
//! applied, never inverted.

pub mod tridiagonal;

use crate::boundary::{BoundarySpec, Side, face_closure};
use crate::coefficients::EvaluatedCoefficients;
use crate::core::SolverError;
use crate::grid::Grid;
use crate::values::{row_major_strides, unravel_index};

/// Second- and first-derivative stencil weights at one interior position of
/// a possibly nonuniform axis.
#[derive(Debug, Clone, Copy)]
struct StencilWeights {
    d1m: f64,
    d10: f64,
    d1p: f64,
    d2m: f64,
    d20: f64,
    d2p: f64,
}

fn stencil_weights(x: &[f64]) -> Vec<StencilWeights> {
    let m = x.len() - 2;
    let mut weights = Vec::with_capacity(m);
    for k in 0..m {
        let h_m = x[k + 1] - x[k];
        let h_p = x[k + 2] - x[k + 1];
        weights.push(StencilWeights {
            d1m: -h_p / (h_m * (h_m + h_p)),
            d10: (h_p - h_m) / (h_m * h_p),
            d1p: h_m / (h_p * (h_m + h_p)),
            d2m: 2.0 / (h_m * (h_m + h_p)),
            d20: -2.0 / (h_m * h_p),
            d2p: 2.0 / (h_p * (h_m + h_p)),
        });
    }
    weights
}

/// One axis-aligned operator over the interior, boundary closures folded in.
///
/// Layout is axis-innermost: `rows * m` entries where `m` is the interior
/// length of the axis and the rows run over the batch and the interior of
/// every other axis, in order. This is exactly the layout the batched
/// tridiagonal kernels consume.
#[derive(Debug, Clone)]
pub(crate) struct AxisOperator {
    pub sub: Vec<f64>,
    pub diag: Vec<f64>,
    pub sup: Vec<f64>,
    /// Affine term from the boundary closures; nonzero only adjacent to the
    /// faces.
    pub b: Vec<f64>,
    pub rows: usize,
    pub m: usize,
}

impl AxisOperator {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.rows * self.m
    }
}

/// Builds the tridiagonal operator of one axis at time `t`.
///
/// `reaction_fraction` is 1 in one dimension and `1/dim` in several, so the
/// zeroth-order term splits evenly across the axis operators.
pub(crate) fn assemble_axis(
    t: f64,
    grid: &Grid,
    axis: usize,
    coeffs: &EvaluatedCoefficients,
    bc: &BoundarySpec,
    batch: usize,
    reaction_fraction: f64,
) -> Result<AxisOperator, SolverError> {
    let dim = grid.dim();
    let x = grid.axis(axis);
    let n = x.len();
    let m = n - 2;
    let glen = grid.num_points();
    let full_shape = grid.shape();
    let gstrides = row_major_strides(&full_shape);

    let other_axes: Vec<usize> = (0..dim).filter(|&k| k != axis).collect();
    let other_extents: Vec<usize> = other_axes.iter().map(|&k| full_shape[k] - 2).collect();
    let other_rows: usize = other_extents.iter().product();
    let rows = batch * other_rows;

    let full_face_shape: Vec<usize> = other_axes.iter().map(|&k| full_shape[k]).collect();
    let face_strides = row_major_strides(&full_face_shape);
    let face_len: usize = full_face_shape.iter().product();

    let weights = stencil_weights(x);
    let diffusion = coeffs.diffusion_entry(axis, axis);
    let drift = &coeffs.drift[axis];
    let reaction = &coeffs.reaction;

    let lower = face_closure(t, grid, axis, Side::Lower, &bc.lower, batch)?;
    let upper = face_closure(t, grid, axis, Side::Upper, &bc.upper, batch)?;

    let len = rows * m;
    let mut sub = vec![0.0_f64; len];
    let mut diag = vec![0.0_f64; len];
    let mut sup = vec![0.0_f64; len];
    let mut b = vec![0.0_f64; len];

    let mut oidx = vec![0_usize; other_axes.len()];
    for row in 0..rows {
        let batch_index = row / other_rows;
        unravel_index(row % other_rows, &other_extents, &mut oidx);

        let mut point_base = 0_usize;
        let mut face_idx = 0_usize;
        for (c, &k) in other_axes.iter().enumerate() {
            point_base += (oidx[c] + 1) * gstrides[k];
            face_idx += (oidx[c] + 1) * face_strides[c];
        }

        let rbase = row * m;
        for k in 0..m {
            let point = point_base + (k + 1) * gstrides[axis];
            let d = diffusion.at(batch_index, point, glen);
            let mu = drift.at(batch_index, point, glen);
            let r = reaction.at(batch_index, point, glen) * reaction_fraction;
            let w = weights[k];
            sub[rbase + k] = -(d * w.d2m + mu * w.d1m);
            diag[rbase + k] = -(d * w.d20 + mu * w.d10 + r);
            sup[rbase + k] = -(d * w.d2p + mu * w.d1p);
        }

        // Eliminate the ghost points through the face closures.
        let ci = batch_index * face_len + face_idx;
        let l_lo = sub[rbase];
        diag[rbase] += lower.xi1[ci] * l_lo;
        if m > 1 {
            sup[rbase] += lower.xi2[ci] * l_lo;
        }
        b[rbase] += lower.eta[ci] * l_lo;
        sub[rbase] = 0.0;

        let last = rbase + m - 1;
        let l_hi = sup[last];
        diag[last] += upper.xi1[ci] * l_hi;
        if m > 1 {
            sub[last] += upper.xi2[ci] * l_hi;
        }
        b[last] += upper.eta[ci] * l_hi;
        sup[last] = 0.0;
    }

    Ok(AxisOperator {
        sub,
        diag,
        sup,
        b,
        rows,
        m,
    })
}

/// Accumulates the mixed-derivative operator: `out += M v` on the interior
/// in canonical `[batch, m_1, .., m_dim]` layout.
///
/// Each pair (p, q) with p < q contributes its symmetry-doubled upper-triangle
/// coefficient through the 4-point cross stencil. Corner neighbors outside
/// the interior contribute zero; the operator is applied explicitly only.
pub(crate) fn apply_mixed(
    coeffs: &EvaluatedCoefficients,
    grid: &Grid,
    batch: usize,
    v: &[f64],
    out: &mut [f64],
) {
    let dim = grid.dim();
    if dim < 2 {
        return;
    }
    let glen = grid.num_points();
    let full_shape = grid.shape();
    let gstrides = row_major_strides(&full_shape);
    let mshape = grid.interior_shape();
    let istrides = row_major_strides(&mshape);
    let mlen: usize = mshape.iter().product();

    let mut idx = vec![0_usize; dim];
    for p in 0..dim {
        for q in p + 1..dim {
            let coeff = coeffs.diffusion_entry(p, q);
            if coeff.is_zero() {
                continue;
            }
            let dx_p = grid.axis(p)[1] - grid.axis(p)[0];
            let dx_q = grid.axis(q)[1] - grid.axis(q)[0];
            // symmetry-doubled coefficient, negated like the axis operators
            let scale = -2.0 / (4.0 * dx_p * dx_q);
            let sp = istrides[p];
            let sq = istrides[q];
            let mp = mshape[p];
            let mq = mshape[q];

            for b in 0..batch {
                let vbase = b * mlen;
                for linear in 0..mlen {
                    unravel_index(linear, &mshape, &mut idx);
                    let ip = idx[p];
                    let iq = idx[q];
                    let here = vbase + linear;

                    let up_p = ip + 1 < mp;
                    let dn_p = ip >= 1;
                    let up_q = iq + 1 < mq;
                    let dn_q = iq >= 1;

                    let vpp = if up_p && up_q { v[here + sp + sq] } else { 0.0 };
                    let vpm = if up_p && dn_q { v[here + sp - sq] } else { 0.0 };
                    let vmp = if dn_p && up_q { v[here - sp + sq] } else { 0.0 };
                    let vmm = if dn_p && dn_q { v[here - sp - sq] } else { 0.0 };

                    let mut point = 0_usize;
                    for (k, &i) in idx.iter().enumerate() {
                        point += (i + 1) * gstrides[k];
                    }
                    out[here] += scale
                        * coeff.at(b, point, glen)
                        * (vpp - vpm - vmp + vmm);
                }
            }
        }
    }
}
