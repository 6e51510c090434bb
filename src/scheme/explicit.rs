//! Forward-Euler stepping: one tridiagonal matmul per step.

use crate::core::{SolverError, StepContext, StepOutput, TimeMarchingScheme};
use crate::operator::assemble_axis;
use crate::operator::tridiagonal::tridiagonal_matmul;
use crate::scheme::{finish_step, require_one_dim, validate_step};

/// Explicit scheme `V' = (I + dt L) V + dt b`.
///
/// One matmul per step; only stable while `|dt|` stays below the usual
/// diffusion and advection limits. The solver does not check them; the step
/// size is the caller's responsibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitScheme;

impl ExplicitScheme {
    pub fn new() -> Self {
        Self
    }
}

impl TimeMarchingScheme for ExplicitScheme {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutput, SolverError> {
        validate_step(&ctx, self.name())?;
        require_one_dim(&ctx, self.name())?;

        let dt = ctx.time_step;
        let batch = ctx.values.batch_size();
        let v = ctx.values.extract_interior();

        let coeffs = ctx.coefficients.evaluate(ctx.time, ctx.grid, batch)?;
        let op = assemble_axis(ctx.time, ctx.grid, 0, &coeffs, &ctx.boundaries[0], batch, 1.0)?;

        let mut lv = vec![0.0_f64; v.len()];
        tridiagonal_matmul(&op.sub, &op.diag, &op.sup, &v, &mut lv, op.m)?;

        let advanced: Vec<f64> = v
            .iter()
            .zip(lv.iter().zip(&op.b))
            .map(|(&vi, (&li, &bi))| vi + dt * (li + bi))
            .collect();

        finish_step(ctx.time + dt, &ctx, &advanced)
    }
}
