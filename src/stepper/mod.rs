//! Backward time-stepping driver.
//!
//! The driver owns the outer time loop: it asks the step-size policy for the
//! next `dt`, derives its sign from the direction of the interval, clamps the
//! final step onto the end time, and hands one step at a time to the scheme.
//! The scheme may replace the coordinate grid between steps; within a step
//! the grid is invariant.

use std::sync::Arc;

use crate::boundary::BoundarySpec;
use crate::coefficients::{Coefficient, CoefficientSet};
use crate::core::{
    DiagKey, Diagnostics, SolveResult, SolverError, StepContext, TimeMarchingScheme,
};
use crate::grid::Grid;
use crate::values::ValueGrid;

/// Step-size policy: exactly one of a fixed step count, a fixed step
/// magnitude, or a callable queried at the current time. The sign of the
/// step is always derived from the interval, never from the policy.
#[derive(Clone)]
pub enum TimeStep {
    NumSteps(usize),
    Fixed(f64),
    Callable(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for TimeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NumSteps(n) => f.debug_tuple("NumSteps").field(n).finish(),
            Self::Fixed(dt) => f.debug_tuple("Fixed").field(dt).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl TimeStep {
    /// Unsigned step magnitude proposed for time `t` over a span of
    /// magnitude `span_abs`.
    fn raw(&self, t: f64, span_abs: f64) -> f64 {
        match self {
            Self::NumSteps(n) => {
                if *n == 0 {
                    0.0
                } else {
                    span_abs / *n as f64
                }
            }
            Self::Fixed(dt) => *dt,
            Self::Callable(f) => f(t),
        }
    }
}

/// Configured solver; build one with [`PdeSolver::builder`].
pub struct PdeSolver {
    start_time: f64,
    end_time: f64,
    grid: Grid,
    values: ValueGrid,
    time_step: TimeStep,
    coefficients: CoefficientSet,
    boundaries: Vec<BoundarySpec>,
    scheme: Box<dyn TimeMarchingScheme>,
    check_finite: bool,
}

impl std::fmt::Debug for PdeSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdeSolver")
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("grid", &self.grid)
            .field("values", &self.values)
            .field("time_step", &self.time_step)
            .field("coefficients", &self.coefficients)
            .field("boundaries", &self.boundaries)
            .field("check_finite", &self.check_finite)
            .finish()
    }
}

impl PdeSolver {
    /// Starts a solver builder.
    pub fn builder() -> PdeSolverBuilder {
        PdeSolverBuilder::default()
    }

    /// Marches the values from the start time to the end time and returns
    /// the final state.
    pub fn solve(self) -> Result<SolveResult, SolverError> {
        let PdeSolver {
            start_time,
            end_time,
            mut grid,
            mut values,
            time_step,
            coefficients,
            boundaries,
            mut scheme,
            check_finite,
        } = self;

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert(DiagKey::Dim, grid.dim() as f64);
        diagnostics.insert(DiagKey::BatchSize, values.batch_size() as f64);
        diagnostics.insert(DiagKey::GridPoints, grid.num_points() as f64);

        let span = end_time - start_time;
        if span == 0.0 {
            diagnostics.insert(DiagKey::NumSteps, 0.0);
            scheme.report(&mut diagnostics);
            return Ok(SolveResult {
                values,
                grid,
                time: start_time,
                steps_taken: 0,
                diagnostics,
            });
        }

        let sign = span.signum();
        let span_abs = span.abs();
        let tolerance = span_abs * 1.0e-10 + 1.0e-14;

        let mut t = start_time;
        let mut steps_taken = 0_usize;
        let mut last_dt = 0.0_f64;

        loop {
            let raw = time_step.raw(t, span_abs);
            if !raw.is_finite() || raw == 0.0 {
                return Err(SolverError::NoProgress(format!(
                    "step-size policy returned {raw} at t = {t}"
                )));
            }
            let mut dt = sign * raw.abs();
            if (t + dt - end_time) * sign > 0.0 {
                dt = end_time - t;
            }

            let ctx = StepContext {
                time: t,
                time_step: dt,
                grid: &grid,
                values: &values,
                coefficients: &coefficients,
                boundaries: &boundaries,
            };
            let out = scheme.step(ctx)?;
            if out.time == t {
                return Err(SolverError::NoProgress(format!(
                    "scheme `{}` did not advance time from t = {t}",
                    scheme.name()
                )));
            }

            t = out.time;
            grid = out.grid;
            values = out.values;
            last_dt = dt;
            steps_taken += 1;

            if check_finite && values.data().iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NumericalInstability(format!(
                    "non-finite values after step {steps_taken} at t = {t}"
                )));
            }
            if (t - end_time).abs() <= tolerance {
                break;
            }
        }

        diagnostics.insert(DiagKey::NumSteps, steps_taken as f64);
        diagnostics.insert(DiagKey::LastTimeStep, last_dt);
        scheme.report(&mut diagnostics);

        Ok(SolveResult {
            values,
            grid,
            time: t,
            steps_taken,
            diagnostics,
        })
    }
}

/// Builder for [`PdeSolver`].
#[derive(Default)]
pub struct PdeSolverBuilder {
    start_time: Option<f64>,
    end_time: Option<f64>,
    grid: Option<Grid>,
    values: Option<ValueGrid>,
    time_step: Option<TimeStep>,
    time_step_forms: u8,
    coefficients: CoefficientSet,
    boundaries: Option<Vec<BoundarySpec>>,
    scheme: Option<Box<dyn TimeMarchingScheme>>,
    check_finite: bool,
}

impl PdeSolverBuilder {
    pub fn start_time(mut self, t: f64) -> Self {
        self.start_time = Some(t);
        self
    }

    pub fn end_time(mut self, t: f64) -> Self {
        self.end_time = Some(t);
        self
    }

    pub fn grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn values(mut self, values: ValueGrid) -> Self {
        self.values = Some(values);
        self
    }

    /// Fixed number of equal steps across the interval.
    pub fn num_steps(mut self, n: usize) -> Self {
        self.time_step = Some(TimeStep::NumSteps(n));
        self.time_step_forms += 1;
        self
    }

    /// Fixed step magnitude; the last step is clamped onto the end time.
    pub fn time_step(mut self, dt: f64) -> Self {
        self.time_step = Some(TimeStep::Fixed(dt));
        self.time_step_forms += 1;
        self
    }

    /// Step magnitude queried from a callable at the current time.
    pub fn time_step_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.time_step = Some(TimeStep::Callable(Arc::new(f)));
        self.time_step_forms += 1;
        self
    }

    /// Replaces the whole coefficient set at once.
    pub fn coefficients(mut self, coefficients: CoefficientSet) -> Self {
        self.coefficients = coefficients;
        self
    }

    pub fn second_order_coeff_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &Grid) -> Vec<Vec<Option<Coefficient>>> + Send + Sync + 'static,
    {
        self.coefficients.second_order = Some(Arc::new(f));
        self
    }

    pub fn first_order_coeff_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &Grid) -> Vec<Option<Coefficient>> + Send + Sync + 'static,
    {
        self.coefficients.first_order = Some(Arc::new(f));
        self
    }

    pub fn zeroth_order_coeff_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &Grid) -> Option<Coefficient> + Send + Sync + 'static,
    {
        self.coefficients.zeroth_order = Some(Arc::new(f));
        self
    }

    /// One boundary pair per axis, in axis order.
    pub fn boundary_conditions(mut self, boundaries: Vec<BoundarySpec>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }

    pub fn scheme<S>(mut self, scheme: S) -> Self
    where
        S: TimeMarchingScheme + 'static,
    {
        self.scheme = Some(Box::new(scheme));
        self
    }

    /// Enables the per-step non-finite check (off by default).
    pub fn check_finite(mut self, enabled: bool) -> Self {
        self.check_finite = enabled;
        self
    }

    pub fn build(self) -> Result<PdeSolver, SolverError> {
        let start_time = self
            .start_time
            .ok_or_else(|| SolverError::InvalidInput("start_time is required".to_string()))?;
        let end_time = self
            .end_time
            .ok_or_else(|| SolverError::InvalidInput("end_time is required".to_string()))?;
        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(SolverError::InvalidInput(
                "start_time and end_time must be finite".to_string(),
            ));
        }
        let grid = self
            .grid
            .ok_or_else(|| SolverError::InvalidInput("grid is required".to_string()))?;
        let values = self
            .values
            .ok_or_else(|| SolverError::InvalidInput("values are required".to_string()))?;
        if self.time_step_forms != 1 {
            return Err(SolverError::InvalidInput(format!(
                "exactly one of num_steps, time_step or time_step_fn must be given, got {}",
                self.time_step_forms
            )));
        }
        let time_step = self.time_step.expect("time step form counted above");
        let boundaries = self
            .boundaries
            .ok_or_else(|| SolverError::InvalidInput("boundary conditions are required".to_string()))?;
        if boundaries.len() != grid.dim() {
            return Err(SolverError::InvalidInput(format!(
                "got {} boundary pairs for {} axes",
                boundaries.len(),
                grid.dim()
            )));
        }
        if values.grid_shape() != grid.shape().as_slice() {
            return Err(SolverError::ShapeMismatch(format!(
                "value grid shape {:?} does not match grid shape {:?}",
                values.grid_shape(),
                grid.shape()
            )));
        }
        let scheme = self
            .scheme
            .ok_or_else(|| SolverError::InvalidInput("a time-marching scheme is required".to_string()))?;

        Ok(PdeSolver {
            start_time,
            end_time,
            grid,
            values,
            time_step,
            coefficients: self.coefficients,
            boundaries,
            scheme,
            check_finite: self.check_finite,
        })
    }
}
