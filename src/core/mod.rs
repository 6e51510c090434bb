//! Core error taxonomy, diagnostics payload, and the time-marching scheme
//! contract shared by every solver component.

use serde::{Deserialize, Serialize};

use crate::boundary::BoundarySpec;
use crate::coefficients::CoefficientSet;
use crate::grid::Grid;
use crate::values::ValueGrid;

/// Solver errors surfaced by the API.
///
/// All variants are fatal to the step in which they occur; the solver never
/// silently continues past one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverError {
    /// Coefficient or boundary tensor is not broadcastable to the required
    /// shape.
    ShapeMismatch(String),
    /// Boundary condition has alpha = beta = 0, or its closure denominator
    /// vanishes at a face point.
    MalformedBoundary(String),
    /// Multidimensional grid spacing is not uniform along some axis.
    NonUniformMultidim(String),
    /// Coordinate array is not strictly increasing.
    NonMonotoneGrid(String),
    /// Axis has too few points for the requested discretization.
    UndersizedGrid(String),
    /// Step-size policy produced a zero or non-finite time step.
    NoProgress(String),
    /// Non-finite values detected in the value grid after a step.
    NumericalInstability(String),
    /// Configuration validation error.
    InvalidInput(String),
    /// Numerical breakdown inside a linear-algebra kernel.
    NumericalError(String),
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeMismatch(msg) => write!(f, "shape mismatch: {msg}"),
            Self::MalformedBoundary(msg) => write!(f, "malformed boundary: {msg}"),
            Self::NonUniformMultidim(msg) => write!(f, "non-uniform multidim grid: {msg}"),
            Self::NonMonotoneGrid(msg) => write!(f, "non-monotone grid: {msg}"),
            Self::UndersizedGrid(msg) => write!(f, "undersized grid: {msg}"),
            Self::NoProgress(msg) => write!(f, "no progress: {msg}"),
            Self::NumericalInstability(msg) => write!(f, "numerical instability: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NumericalError(msg) => write!(f, "numerical error: {msg}"),
        }
    }
}

impl std::error::Error for SolverError {}

/// Compact key set for solver diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagKey {
    BatchSize,
    Dim,
    ExtrapolationSteps,
    GridPoints,
    LastTimeStep,
    NumSteps,
}

impl DiagKey {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BatchSize => "batch_size",
            Self::Dim => "dim",
            Self::ExtrapolationSteps => "extrapolation_steps",
            Self::GridPoints => "grid_points",
            Self::LastTimeStep => "last_time_step",
            Self::NumSteps => "num_steps",
        }
    }
}

/// Inline diagnostics storage attached to [`SolveResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: [Option<(DiagKey, f64)>; 8],
}

impl Diagnostics {
    pub const CAPACITY: usize = 8;

    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries[0].is_none()
    }

    /// Inserts a value, overwriting any previous entry under the same key.
    #[inline]
    pub fn insert(&mut self, key: DiagKey, value: f64) -> Option<f64> {
        for (entry_key, existing) in self.entries.iter_mut().flatten() {
            if *entry_key == key {
                let prev = *existing;
                *existing = value;
                return Some(prev);
            }
        }
        for entry in &mut self.entries {
            if entry.is_none() {
                *entry = Some((key, value));
                return None;
            }
        }
        panic!("diagnostics capacity exceeded ({})", Self::CAPACITY);
    }

    #[inline]
    pub fn get(&self, key: DiagKey) -> Option<f64> {
        self.entries
            .iter()
            .flatten()
            .find_map(|(entry_key, value)| (*entry_key == key).then_some(*value))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries
            .iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), *v))
    }
}

/// Immutable view of the solver state handed to a scheme for one step.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Current time.
    pub time: f64,
    /// Signed time step; negative when marching backward.
    pub time_step: f64,
    /// Coordinate grid at the current time.
    pub grid: &'a Grid,
    /// Full-shape value grid at the current time.
    pub values: &'a ValueGrid,
    /// Coefficient callables of the PDE.
    pub coefficients: &'a CoefficientSet,
    /// One boundary pair per axis.
    pub boundaries: &'a [BoundarySpec],
}

/// State produced by one scheme step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Advanced time.
    pub time: f64,
    /// Grid at the advanced time; schemes may replace it between steps.
    pub grid: Grid,
    /// Full-shape values at the advanced time.
    pub values: ValueGrid,
}

/// One-step time-marching operator.
///
/// The driver treats implementations as black boxes: given the state at
/// `ctx.time` they return the state at `ctx.time + ctx.time_step`. Plain
/// closures implement the trait, so custom schemes plug in without touching
/// the driver or the discretizer.
pub trait TimeMarchingScheme {
    /// Short identifier used in diagnostics and error messages.
    fn name(&self) -> &'static str;

    /// Advances the values by one time step.
    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutput, SolverError>;

    /// Lets a scheme append its own entries to the final diagnostics.
    fn report(&self, _diagnostics: &mut Diagnostics) {}
}

impl<F> TimeMarchingScheme for F
where
    F: FnMut(StepContext<'_>) -> Result<StepOutput, SolverError>,
{
    fn name(&self) -> &'static str {
        "custom"
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutput, SolverError> {
        self(ctx)
    }
}

/// Final solver payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// Values at the final time, full shape.
    pub values: ValueGrid,
    /// Grid at the final time.
    pub grid: Grid,
    /// Time actually reached.
    pub time: f64,
    /// Number of steps taken.
    pub steps_taken: usize,
    /// Scalar diagnostics.
    pub diagnostics: Diagnostics,
}
