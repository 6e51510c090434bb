//! Time-marching schemes.
//!
//! Every scheme advances the interior values by composing the batched
//! tridiagonal matmul/solve kernels with the boundary closure pre/post
//! passes, and is written in terms of a signed time step so backward and
//! forward marching share the same code paths.

pub mod douglas_adi;
pub mod explicit;
pub mod extrapolation;
pub mod implicit;
pub mod oscillation_damped;
pub mod weighted;

pub use douglas_adi::DouglasAdiScheme;
pub use explicit::ExplicitScheme;
pub use extrapolation::ExtrapolationScheme;
pub use implicit::ImplicitScheme;
pub use oscillation_damped::OscillationDampedScheme;
pub use weighted::{CrankNicolsonScheme, WeightedThetaScheme};

use crate::boundary::reconstruct_full;
use crate::core::{SolverError, StepContext, StepOutput};

/// Shared step preamble: the value tensor must match the grid, and there
/// must be one boundary pair per axis.
pub(crate) fn validate_step(ctx: &StepContext<'_>, scheme: &str) -> Result<(), SolverError> {
    if ctx.values.grid_shape() != ctx.grid.shape().as_slice() {
        return Err(SolverError::ShapeMismatch(format!(
            "{scheme}: value grid shape {:?} does not match grid shape {:?}",
            ctx.values.grid_shape(),
            ctx.grid.shape()
        )));
    }
    if ctx.boundaries.len() != ctx.grid.dim() {
        return Err(SolverError::InvalidInput(format!(
            "{scheme}: got {} boundary pairs for {} axes",
            ctx.boundaries.len(),
            ctx.grid.dim()
        )));
    }
    Ok(())
}

pub(crate) fn require_one_dim(ctx: &StepContext<'_>, scheme: &str) -> Result<(), SolverError> {
    if ctx.grid.dim() != 1 {
        return Err(SolverError::InvalidInput(format!(
            "{scheme} handles one spatial dimension; use the Douglas ADI scheme for {} axes",
            ctx.grid.dim()
        )));
    }
    Ok(())
}

/// Shared step epilogue: restore the faces at the advanced time and package
/// the output. In-tree schemes never replace the grid within a step.
pub(crate) fn finish_step(
    t_new: f64,
    ctx: &StepContext<'_>,
    interior: &[f64],
) -> Result<StepOutput, SolverError> {
    let values = reconstruct_full(
        t_new,
        ctx.grid,
        ctx.boundaries,
        ctx.values.batch_shape(),
        ctx.values.batch_size(),
        interior,
    )?;
    Ok(StepOutput {
        time: t_new,
        grid: ctx.grid.clone(),
        values,
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::f64::consts::PI;

    use crate::boundary::{BoundarySpec, dirichlet};
    use crate::coefficients::{Coefficient, CoefficientSet};
    use crate::grid::Grid;
    use crate::values::ValueGrid;

    /// Heat equation fixture on [0, pi]: terminal sin(x), homogeneous
    /// Dirichlet walls, unit diffusion.
    pub(crate) fn heat_fixture(points: usize) -> (Grid, ValueGrid, CoefficientSet, Vec<BoundarySpec>) {
        let grid = Grid::uniform(&[0.0], &[PI], &[points]).unwrap();
        let values = ValueGrid::from_grid_fn(&grid, |x| x[0].sin());
        let coeffs = CoefficientSet::new()
            .with_second_order(|_, _| vec![vec![Some(Coefficient::Scalar(1.0))]]);
        let bcs = vec![BoundarySpec::new(
            dirichlet(|_, _| Coefficient::Scalar(0.0)),
            dirichlet(|_, _| Coefficient::Scalar(0.0)),
        )];
        (grid, values, coeffs, bcs)
    }

    pub(crate) fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(&x, &y)| (x - y).abs())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{heat_fixture, max_abs_diff};
    use super::*;
    use crate::core::TimeMarchingScheme;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn step_with(
        scheme: &mut dyn TimeMarchingScheme,
        ctx: StepContext<'_>,
    ) -> crate::core::StepOutput {
        scheme.step(ctx).expect("step")
    }

    #[test]
    fn one_dimensional_schemes_reject_two_axes() {
        let grid = crate::grid::Grid::uniform(&[0.0, 0.0], &[1.0, 1.0], &[5, 5]).unwrap();
        let values = crate::values::ValueGrid::from_grid_fn(&grid, |_| 1.0);
        let coeffs = crate::coefficients::CoefficientSet::new();
        let bc = || {
            crate::boundary::BoundarySpec::new(
                crate::boundary::dirichlet(|_, _| crate::coefficients::Coefficient::Scalar(0.0)),
                crate::boundary::dirichlet(|_, _| crate::coefficients::Coefficient::Scalar(0.0)),
            )
        };
        let bcs = vec![bc(), bc()];
        let ctx = StepContext {
            time: 1.0,
            time_step: -0.1,
            grid: &grid,
            values: &values,
            coefficients: &coeffs,
            boundaries: &bcs,
        };
        let err = CrankNicolsonScheme::new().step(ctx).unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)));
    }

    #[test]
    fn schemes_preserve_value_shape() {
        let (grid, values, coeffs, bcs) = heat_fixture(21);
        let ctx = StepContext {
            time: 0.1,
            time_step: -0.01,
            grid: &grid,
            values: &values,
            coefficients: &coeffs,
            boundaries: &bcs,
        };
        let schemes: Vec<Box<dyn TimeMarchingScheme>> = vec![
            Box::new(ExplicitScheme::new()),
            Box::new(ImplicitScheme::new()),
            Box::new(WeightedThetaScheme::new(0.3)),
            Box::new(CrankNicolsonScheme::new()),
            Box::new(ExtrapolationScheme::new()),
            Box::new(DouglasAdiScheme::new(0.5)),
        ];
        for mut scheme in schemes {
            let out = step_with(scheme.as_mut(), ctx);
            assert_eq!(out.values.shape(), values.shape(), "{}", scheme.name());
            assert!((out.time - 0.09).abs() < 1.0e-12);
        }
    }

    #[test]
    fn scheme_output_is_linear_in_the_values() {
        let (grid, values, coeffs, bcs) = heat_fixture(17);
        let scaled = crate::values::ValueGrid::new(
            vec![],
            grid.shape(),
            values.data().iter().map(|&v| 2.5 * v).collect(),
        )
        .unwrap();
        let base_ctx = StepContext {
            time: 0.2,
            time_step: -0.02,
            grid: &grid,
            values: &values,
            coefficients: &coeffs,
            boundaries: &bcs,
        };
        let scaled_ctx = StepContext {
            values: &scaled,
            ..base_ctx
        };
        // gamma = 0, so stepping commutes with scaling
        let out1 = step_with(&mut CrankNicolsonScheme::new(), base_ctx);
        let out2 = step_with(&mut CrankNicolsonScheme::new(), scaled_ctx);
        let rescaled: Vec<f64> = out1.values.data().iter().map(|&v| 2.5 * v).collect();
        assert!(max_abs_diff(&rescaled, out2.values.data()) < 1.0e-12);
    }

    #[test]
    fn batch_elements_evolve_independently() {
        let (grid, _, coeffs, bcs) = heat_fixture(17);
        let mut rng = StdRng::seed_from_u64(2024);
        let batched = crate::values::ValueGrid::from_batched_fn(&[3], &grid, |b, x| {
            (b as f64 + 1.0) * x[0].sin() + rng.random_range(-0.1..0.1)
        });
        let ctx = StepContext {
            time: 0.3,
            time_step: -0.05,
            grid: &grid,
            values: &batched,
            coefficients: &coeffs,
            boundaries: &bcs,
        };
        let out = step_with(&mut ImplicitScheme::new(), ctx);

        // step each batch element alone and compare
        let glen = grid.num_points();
        for b in 0..3 {
            let single = crate::values::ValueGrid::new(
                vec![],
                grid.shape(),
                batched.data()[b * glen..(b + 1) * glen].to_vec(),
            )
            .unwrap();
            let single_ctx = StepContext {
                values: &single,
                ..ctx
            };
            let single_out = step_with(&mut ImplicitScheme::new(), single_ctx);
            assert!(
                max_abs_diff(
                    single_out.values.data(),
                    &out.values.data()[b * glen..(b + 1) * glen]
                ) < 1.0e-13,
                "batch element {b} diverged"
            );
        }
    }
}
