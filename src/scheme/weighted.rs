//! Weighted implicit-explicit stepping and its Crank-Nicolson midpoint form.

use crate::core::{SolverError, StepContext, StepOutput, TimeMarchingScheme};
use crate::operator::assemble_axis;
use crate::operator::tridiagonal::{tridiagonal_matmul, tridiagonal_solve};
use crate::scheme::{finish_step, require_one_dim, validate_step};

/// Theta scheme
/// `(I - (1-theta) dt L') V' = (I + theta dt L) V + theta dt b + (1-theta) dt b'`.
///
/// `theta = 1` is the explicit scheme, `theta = 0` the implicit one; interior
/// values are first-order in `dt` except at `theta = 1/2`.
#[derive(Debug, Clone, Copy)]
pub struct WeightedThetaScheme {
    theta: f64,
}

impl WeightedThetaScheme {
    pub fn new(theta: f64) -> Self {
        Self { theta }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }
}

impl TimeMarchingScheme for WeightedThetaScheme {
    fn name(&self) -> &'static str {
        "weighted_theta"
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutput, SolverError> {
        validate_step(&ctx, self.name())?;
        require_one_dim(&ctx, self.name())?;
        if !self.theta.is_finite() || !(0.0..=1.0).contains(&self.theta) {
            return Err(SolverError::InvalidInput(format!(
                "theta must lie in [0, 1], got {}",
                self.theta
            )));
        }

        let theta = self.theta;
        let dt = ctx.time_step;
        let t_new = ctx.time + dt;
        let batch = ctx.values.batch_size();
        let v = ctx.values.extract_interior();

        let coeffs_old = ctx.coefficients.evaluate(ctx.time, ctx.grid, batch)?;
        let op_old = assemble_axis(ctx.time, ctx.grid, 0, &coeffs_old, &ctx.boundaries[0], batch, 1.0)?;
        let coeffs_new = ctx.coefficients.evaluate(t_new, ctx.grid, batch)?;
        let op_new = assemble_axis(t_new, ctx.grid, 0, &coeffs_new, &ctx.boundaries[0], batch, 1.0)?;

        let mut lv = vec![0.0_f64; v.len()];
        tridiagonal_matmul(&op_old.sub, &op_old.diag, &op_old.sup, &v, &mut lv, op_old.m)?;

        let rhs: Vec<f64> = v
            .iter()
            .enumerate()
            .map(|(i, &vi)| {
                vi + theta * dt * (lv[i] + op_old.b[i]) + (1.0 - theta) * dt * op_new.b[i]
            })
            .collect();

        let w = (1.0 - theta) * dt;
        let lhs_sub: Vec<f64> = op_new.sub.iter().map(|&s| -w * s).collect();
        let lhs_diag: Vec<f64> = op_new.diag.iter().map(|&d| 1.0 - w * d).collect();
        let lhs_sup: Vec<f64> = op_new.sup.iter().map(|&s| -w * s).collect();

        let mut advanced = vec![0.0_f64; v.len()];
        tridiagonal_solve(&lhs_sub, &lhs_diag, &lhs_sup, &rhs, &mut advanced, op_new.m)?;

        finish_step(t_new, &ctx, &advanced)
    }
}

/// Crank-Nicolson with the operator and affine term evaluated once at the
/// midpoint: `(I - dt/2 L_mid) V' = (I + dt/2 L_mid) V + dt b_mid`.
/// Second-order in `dt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrankNicolsonScheme;

impl CrankNicolsonScheme {
    pub fn new() -> Self {
        Self
    }
}

impl TimeMarchingScheme for CrankNicolsonScheme {
    fn name(&self) -> &'static str {
        "crank_nicolson"
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutput, SolverError> {
        validate_step(&ctx, self.name())?;
        require_one_dim(&ctx, self.name())?;

        let dt = ctx.time_step;
        let t_mid = ctx.time + 0.5 * dt;
        let batch = ctx.values.batch_size();
        let v = ctx.values.extract_interior();

        let coeffs = ctx.coefficients.evaluate(t_mid, ctx.grid, batch)?;
        let op = assemble_axis(t_mid, ctx.grid, 0, &coeffs, &ctx.boundaries[0], batch, 1.0)?;

        let mut lv = vec![0.0_f64; v.len()];
        tridiagonal_matmul(&op.sub, &op.diag, &op.sup, &v, &mut lv, op.m)?;

        let half = 0.5 * dt;
        let rhs: Vec<f64> = v
            .iter()
            .enumerate()
            .map(|(i, &vi)| vi + half * lv[i] + dt * op.b[i])
            .collect();
        let lhs_sub: Vec<f64> = op.sub.iter().map(|&s| -half * s).collect();
        let lhs_diag: Vec<f64> = op.diag.iter().map(|&d| 1.0 - half * d).collect();
        let lhs_sup: Vec<f64> = op.sup.iter().map(|&s| -half * s).collect();

        let mut advanced = vec![0.0_f64; v.len()];
        tridiagonal_solve(&lhs_sub, &lhs_diag, &lhs_sup, &rhs, &mut advanced, op.m)?;

        finish_step(ctx.time + dt, &ctx, &advanced)
    }
}
