//! Backward-Euler stepping: one tridiagonal solve per step.

use crate::core::{SolverError, StepContext, StepOutput, TimeMarchingScheme};
use crate::operator::assemble_axis;
use crate::operator::tridiagonal::tridiagonal_solve;
use crate::scheme::{finish_step, require_one_dim, validate_step};

/// Implicit scheme `(I - dt L') V' = V + dt b'`, with the operator evaluated
/// at the advanced time. Unconditionally stable, first-order in `dt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitScheme;

impl ImplicitScheme {
    pub fn new() -> Self {
        Self
    }
}

impl TimeMarchingScheme for ImplicitScheme {
    fn name(&self) -> &'static str {
        "implicit"
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutput, SolverError> {
        validate_step(&ctx, self.name())?;
        require_one_dim(&ctx, self.name())?;

        let dt = ctx.time_step;
        let t_new = ctx.time + dt;
        let batch = ctx.values.batch_size();
        let v = ctx.values.extract_interior();

        let coeffs = ctx.coefficients.evaluate(t_new, ctx.grid, batch)?;
        let op = assemble_axis(t_new, ctx.grid, 0, &coeffs, &ctx.boundaries[0], batch, 1.0)?;

        let rhs: Vec<f64> = v
            .iter()
            .zip(&op.b)
            .map(|(&vi, &bi)| vi + dt * bi)
            .collect();
        let lhs_sub: Vec<f64> = op.sub.iter().map(|&s| -dt * s).collect();
        let lhs_diag: Vec<f64> = op.diag.iter().map(|&d| 1.0 - dt * d).collect();
        let lhs_sup: Vec<f64> = op.sup.iter().map(|&s| -dt * s).collect();

        let mut advanced = vec![0.0_f64; v.len()];
        tridiagonal_solve(&lhs_sub, &lhs_diag, &lhs_sup, &rhs, &mut advanced, op.m)?;

        finish_step(t_new, &ctx, &advanced)
    }
}
