//! Coordinate grids: one strictly increasing coordinate array per axis.

use serde::{Deserialize, Serialize};

use crate::core::SolverError;

/// Relative tolerance for the per-axis uniform-spacing check used by
/// multidimensional discretizations.
const UNIFORM_SPACING_RTOL: f64 = 1.0e-8;

/// Rectangular coordinate grid.
///
/// Holds one 1-D coordinate array per axis. A one-dimensional grid may be
/// arbitrarily nonuniform; multidimensional grids must be uniform along each
/// axis (spacings may differ across axes), which is validated where the
/// multidimensional discretization is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    axes: Vec<Vec<f64>>,
}

impl Grid {
    /// Builds a grid from explicit per-axis coordinate arrays.
    ///
    /// Each axis must hold at least three finite, strictly increasing
    /// coordinates.
    pub fn from_axes(axes: Vec<Vec<f64>>) -> Result<Self, SolverError> {
        if axes.is_empty() {
            return Err(SolverError::InvalidInput(
                "grid must have at least one axis".to_string(),
            ));
        }
        for (j, axis) in axes.iter().enumerate() {
            if axis.len() < 3 {
                return Err(SolverError::UndersizedGrid(format!(
                    "axis {j} has {} points, need at least 3",
                    axis.len()
                )));
            }
            if axis
                .windows(2)
                .any(|w| !w[0].is_finite() || !w[1].is_finite() || w[1] <= w[0])
            {
                return Err(SolverError::NonMonotoneGrid(format!(
                    "axis {j} is not finite and strictly increasing"
                )));
            }
        }
        Ok(Self { axes })
    }

    /// Builds a uniformly spaced grid, one `(lower, upper, points)` triple per
    /// axis.
    pub fn uniform(lower: &[f64], upper: &[f64], points: &[usize]) -> Result<Self, SolverError> {
        if lower.len() != upper.len() || lower.len() != points.len() {
            return Err(SolverError::InvalidInput(
                "uniform grid bounds and point counts must have equal lengths".to_string(),
            ));
        }
        let mut axes = Vec::with_capacity(lower.len());
        for ((&lo, &hi), &n) in lower.iter().zip(upper).zip(points) {
            if !lo.is_finite() || !hi.is_finite() || hi <= lo {
                return Err(SolverError::InvalidInput(format!(
                    "uniform axis bounds must be finite with lower < upper, got [{lo}, {hi}]"
                )));
            }
            if n < 3 {
                return Err(SolverError::UndersizedGrid(format!(
                    "uniform axis has {n} points, need at least 3"
                )));
            }
            let step = (hi - lo) / (n - 1) as f64;
            let mut axis = Vec::with_capacity(n);
            for i in 0..n {
                axis.push(lo + step * i as f64);
            }
            // Pin the endpoint so boundary lookups are exact.
            axis[n - 1] = hi;
            axes.push(axis);
        }
        Self::from_axes(axes)
    }

    /// Builds a log-uniformly spaced grid, one `(lower, upper, points)`
    /// triple per axis; bounds must be positive.
    pub fn log_uniform(
        lower: &[f64],
        upper: &[f64],
        points: &[usize],
    ) -> Result<Self, SolverError> {
        if lower.len() != upper.len() || lower.len() != points.len() {
            return Err(SolverError::InvalidInput(
                "log-uniform grid bounds and point counts must have equal lengths".to_string(),
            ));
        }
        let mut axes = Vec::with_capacity(lower.len());
        for ((&lo, &hi), &n) in lower.iter().zip(upper).zip(points) {
            if !(lo.is_finite() && hi.is_finite() && 0.0 < lo && lo < hi) {
                return Err(SolverError::InvalidInput(format!(
                    "log-uniform axis bounds must be finite with 0 < lower < upper, got [{lo}, {hi}]"
                )));
            }
            if n < 3 {
                return Err(SolverError::UndersizedGrid(format!(
                    "log-uniform axis has {n} points, need at least 3"
                )));
            }
            let log_lo = lo.ln();
            let log_step = (hi.ln() - log_lo) / (n - 1) as f64;
            let mut axis = Vec::with_capacity(n);
            for i in 0..n {
                axis.push((log_lo + log_step * i as f64).exp());
            }
            axis[0] = lo;
            axis[n - 1] = hi;
            axes.push(axis);
        }
        Self::from_axes(axes)
    }

    /// Number of spatial dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// Coordinate array of one axis.
    #[inline]
    pub fn axis(&self, j: usize) -> &[f64] {
        &self.axes[j]
    }

    /// All coordinate arrays.
    #[inline]
    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }

    /// Full grid shape `(n_1, ..., n_dim)`.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Vec::len).collect()
    }

    /// Shape of the interior, one point trimmed from each face.
    pub fn interior_shape(&self) -> Vec<usize> {
        self.axes.iter().map(|axis| axis.len() - 2).collect()
    }

    /// Total number of grid points.
    pub fn num_points(&self) -> usize {
        self.axes.iter().map(Vec::len).product()
    }

    /// Total number of interior points.
    pub fn num_interior_points(&self) -> usize {
        self.axes.iter().map(|axis| axis.len() - 2).product()
    }

    /// Checks that every axis is uniformly spaced up to rounding tolerance.
    pub(crate) fn require_uniform_axes(&self) -> Result<(), SolverError> {
        for (j, axis) in self.axes.iter().enumerate() {
            let step = axis[1] - axis[0];
            for w in axis.windows(2) {
                let h = w[1] - w[0];
                if (h - step).abs() > UNIFORM_SPACING_RTOL * step.abs() {
                    return Err(SolverError::NonUniformMultidim(format!(
                        "axis {j} spacing varies from {step} to {h}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_grid_hits_endpoints() {
        let grid = Grid::uniform(&[0.0], &[2.0], &[5]).unwrap();
        assert_eq!(grid.dim(), 1);
        assert_eq!(grid.shape(), vec![5]);
        assert_eq!(grid.axis(0)[0], 0.0);
        assert_eq!(grid.axis(0)[4], 2.0);
        assert!((grid.axis(0)[2] - 1.0).abs() < 1.0e-15);
    }

    #[test]
    fn log_uniform_grid_is_increasing_and_pinned() {
        let grid = Grid::log_uniform(&[1.0], &[100.0], &[11]).unwrap();
        let axis = grid.axis(0);
        assert_eq!(axis[0], 1.0);
        assert_eq!(axis[10], 100.0);
        assert!(axis.windows(2).all(|w| w[1] > w[0]));
        assert!((axis[5] - 10.0).abs() < 1.0e-9);
    }

    #[test]
    fn rejects_non_monotone_axis() {
        let err = Grid::from_axes(vec![vec![0.0, 2.0, 1.0, 3.0]]).unwrap_err();
        assert!(matches!(err, SolverError::NonMonotoneGrid(_)));
    }

    #[test]
    fn rejects_undersized_axis() {
        let err = Grid::from_axes(vec![vec![0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, SolverError::UndersizedGrid(_)));
    }

    #[test]
    fn uniformity_check_accepts_uniform_and_rejects_graded() {
        let uniform = Grid::uniform(&[0.0, 0.0], &[1.0, 2.0], &[11, 21]).unwrap();
        assert!(uniform.require_uniform_axes().is_ok());

        let graded = Grid::from_axes(vec![
            vec![0.0, 0.1, 0.3, 0.7, 1.5],
            (0..5).map(|i| i as f64).collect(),
        ])
        .unwrap();
        let err = graded.require_uniform_axes().unwrap_err();
        assert!(matches!(err, SolverError::NonUniformMultidim(_)));
    }

    #[test]
    fn interior_shape_trims_each_axis() {
        let grid = Grid::uniform(&[0.0, 0.0], &[1.0, 1.0], &[5, 7]).unwrap();
        assert_eq!(grid.interior_shape(), vec![3, 5]);
        assert_eq!(grid.num_interior_points(), 15);
    }
}
