//! PDE coefficient callables and their per-time resolution.
//!
//! Users supply callables for the second-, first-, and zeroth-order terms of
//! the equation. A whole callable may be absent, an individual entry may be
//! absent (`None`), and every returned value may be a scalar or a tensor.
//! All three absences mean zero; the operator assembly never branches on
//! which one occurred.

use std::sync::Arc;

use crate::core::SolverError;
use crate::grid::Grid;

/// One coefficient value: a scalar broadcast over all points, or a flat
/// row-major field.
///
/// A field must match either the grid shape or `batch_shape + grid_shape`;
/// any other length is a fatal [`SolverError::ShapeMismatch`]. Partial
/// (batch-only) shapes are rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficient {
    Scalar(f64),
    Field(Vec<f64>),
}

/// Second-order term: a `dim x dim` container of optional entries. Only the
/// upper triangle (i <= j) is read; the matrix is assumed symmetric and the
/// lower triangle may hold anything.
pub type SecondOrderCoeffFn =
    Arc<dyn Fn(f64, &Grid) -> Vec<Vec<Option<Coefficient>>> + Send + Sync>;

/// First-order term: a length-`dim` container of optional entries.
pub type FirstOrderCoeffFn = Arc<dyn Fn(f64, &Grid) -> Vec<Option<Coefficient>> + Send + Sync>;

/// Zeroth-order term.
pub type ZerothOrderCoeffFn = Arc<dyn Fn(f64, &Grid) -> Option<Coefficient> + Send + Sync>;

/// The three coefficient callables of a linear parabolic equation. Any of
/// them may be absent, meaning that term is identically zero.
#[derive(Clone, Default)]
pub struct CoefficientSet {
    pub second_order: Option<SecondOrderCoeffFn>,
    pub first_order: Option<FirstOrderCoeffFn>,
    pub zeroth_order: Option<ZerothOrderCoeffFn>,
}

impl std::fmt::Debug for CoefficientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoefficientSet")
            .field("second_order", &self.second_order.is_some())
            .field("first_order", &self.first_order.is_some())
            .field("zeroth_order", &self.zeroth_order.is_some())
            .finish()
    }
}

impl CoefficientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the second-order coefficient callable.
    pub fn with_second_order<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &Grid) -> Vec<Vec<Option<Coefficient>>> + Send + Sync + 'static,
    {
        self.second_order = Some(Arc::new(f));
        self
    }

    /// Sets the first-order coefficient callable.
    pub fn with_first_order<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &Grid) -> Vec<Option<Coefficient>> + Send + Sync + 'static,
    {
        self.first_order = Some(Arc::new(f));
        self
    }

    /// Sets the zeroth-order coefficient callable.
    pub fn with_zeroth_order<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &Grid) -> Option<Coefficient> + Send + Sync + 'static,
    {
        self.zeroth_order = Some(Arc::new(f));
        self
    }

    /// Invokes the callables at time `t` and validates every returned entry
    /// against the accepted broadcast tiers. Called once per time point a
    /// scheme needs, not once per axis.
    pub(crate) fn evaluate(
        &self,
        t: f64,
        grid: &Grid,
        batch: usize,
    ) -> Result<EvaluatedCoefficients, SolverError> {
        let dim = grid.dim();
        let glen = grid.num_points();

        let mut diffusion = Vec::with_capacity(dim * dim);
        diffusion.resize_with(dim * dim, || ResolvedCoeff::Zero);
        if let Some(second_order) = &self.second_order {
            let matrix = second_order(t, grid);
            if matrix.len() != dim {
                return Err(SolverError::ShapeMismatch(format!(
                    "second-order container has {} rows, expected {dim}",
                    matrix.len()
                )));
            }
            for (i, row) in matrix.iter().enumerate() {
                if row.len() != dim {
                    return Err(SolverError::ShapeMismatch(format!(
                        "second-order row {i} has {} entries, expected {dim}",
                        row.len()
                    )));
                }
                // Upper triangle only; the lower triangle is ignored.
                for (j, entry) in row.iter().enumerate().skip(i) {
                    diffusion[i * dim + j] =
                        resolve(entry.as_ref(), batch, glen, "second-order coefficient")?;
                }
            }
        }

        let mut drift = Vec::with_capacity(dim);
        drift.resize_with(dim, || ResolvedCoeff::Zero);
        if let Some(first_order) = &self.first_order {
            let vector = first_order(t, grid);
            if vector.len() != dim {
                return Err(SolverError::ShapeMismatch(format!(
                    "first-order container has {} entries, expected {dim}",
                    vector.len()
                )));
            }
            for (j, entry) in vector.iter().enumerate() {
                drift[j] = resolve(entry.as_ref(), batch, glen, "first-order coefficient")?;
            }
        }

        let reaction = match &self.zeroth_order {
            Some(zeroth_order) => resolve(
                zeroth_order(t, grid).as_ref(),
                batch,
                glen,
                "zeroth-order coefficient",
            )?,
            None => ResolvedCoeff::Zero,
        };

        Ok(EvaluatedCoefficients {
            dim,
            diffusion,
            drift,
            reaction,
        })
    }
}

/// A coefficient entry normalized to one of the accepted broadcast tiers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResolvedCoeff {
    Zero,
    Scalar(f64),
    /// One value per grid point, shared across the batch.
    PerGrid(Vec<f64>),
    /// One value per (batch element, grid point).
    PerPoint(Vec<f64>),
}

impl ResolvedCoeff {
    /// Value at a flat batch index and flat grid-point index.
    #[inline]
    pub(crate) fn at(&self, batch_index: usize, point: usize, grid_len: usize) -> f64 {
        match self {
            Self::Zero => 0.0,
            Self::Scalar(v) => *v,
            Self::PerGrid(field) => field[point],
            Self::PerPoint(field) => field[batch_index * grid_len + point],
        }
    }

    #[inline]
    pub(crate) fn is_zero(&self) -> bool {
        matches!(self, Self::Zero) || matches!(self, Self::Scalar(v) if *v == 0.0)
    }
}

/// All coefficients of the equation resolved at one time point.
#[derive(Debug, Clone)]
pub(crate) struct EvaluatedCoefficients {
    pub dim: usize,
    /// `dim*dim` row-major; only entries with i <= j are populated.
    pub diffusion: Vec<ResolvedCoeff>,
    pub drift: Vec<ResolvedCoeff>,
    pub reaction: ResolvedCoeff,
}

impl EvaluatedCoefficients {
    #[inline]
    pub(crate) fn diffusion_entry(&self, i: usize, j: usize) -> &ResolvedCoeff {
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        &self.diffusion[lo * self.dim + hi]
    }
}

/// Normalizes an optional coefficient to a [`ResolvedCoeff`], enforcing the
/// scalar / grid / batch+grid broadcast tiers.
pub(crate) fn resolve(
    entry: Option<&Coefficient>,
    batch: usize,
    target_len: usize,
    what: &str,
) -> Result<ResolvedCoeff, SolverError> {
    match entry {
        None => Ok(ResolvedCoeff::Zero),
        Some(Coefficient::Scalar(v)) => Ok(ResolvedCoeff::Scalar(*v)),
        Some(Coefficient::Field(field)) => {
            if field.len() == target_len {
                Ok(ResolvedCoeff::PerGrid(field.clone()))
            } else if field.len() == batch * target_len {
                Ok(ResolvedCoeff::PerPoint(field.clone()))
            } else if field.len() == 1 {
                Ok(ResolvedCoeff::Scalar(field[0]))
            } else {
                Err(SolverError::ShapeMismatch(format!(
                    "{what} field has {} entries, expected 1, {target_len} or {}",
                    field.len(),
                    batch * target_len
                )))
            }
        }
    }
}
