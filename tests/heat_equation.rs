//! Heat-equation reference solutions on uniform and graded 1-D grids.

use std::f64::consts::PI;

use ferropde::prelude::*;

fn max_abs_error(values: &ValueGrid, exact: impl Fn(f64) -> f64, grid: &Grid) -> f64 {
    let axis = grid.axis(0);
    values
        .data()
        .iter()
        .zip(axis)
        .map(|(&v, &x)| (v - exact(x)).abs())
        .fold(0.0, f64::max)
}

fn solve_heat<S: TimeMarchingScheme + 'static>(
    grid: Grid,
    values: ValueGrid,
    horizon: f64,
    scheme: S,
    steps: usize,
) -> SolveResult {
    PdeSolver::builder()
        .start_time(horizon)
        .end_time(0.0)
        .grid(grid)
        .values(values)
        .num_steps(steps)
        .second_order_coeff_fn(|_, _| vec![vec![Some(Coefficient::Scalar(1.0))]])
        .boundary_conditions(vec![BoundarySpec::new(
            dirichlet(|_, _| Coefficient::Scalar(0.0)),
            dirichlet(|_, _| Coefficient::Scalar(0.0)),
        )])
        .scheme(scheme)
        .build()
        .expect("valid heat solver")
        .solve()
        .expect("heat solve")
}

#[test]
fn sine_mode_decays_within_a_tenth_of_a_percent() {
    let grid = Grid::uniform(&[0.0], &[PI], &[101]).unwrap();
    let terminal = ValueGrid::from_grid_fn(&grid, |x| x[0].sin());

    let result = solve_heat(grid.clone(), terminal, 0.1, CrankNicolsonScheme::new(), 100);

    let decay = (-0.1_f64).exp();
    let err = max_abs_error(&result.values, |x| decay * x.sin(), &grid);
    assert!(err < 1.0e-3, "max abs error {err}");
    assert_eq!(result.steps_taken, 100);
}

#[test]
fn dirichlet_faces_are_reproduced_exactly() {
    let grid = Grid::uniform(&[0.0], &[PI], &[51]).unwrap();
    let terminal = ValueGrid::from_grid_fn(&grid, |x| x[0].sin());
    let result = solve_heat(grid, terminal, 0.1, CrankNicolsonScheme::new(), 20);
    assert_eq!(result.values.data()[0], 0.0);
    assert_eq!(result.values.data()[50], 0.0);
}

#[test]
fn implicit_is_first_order_crank_nicolson_second_order_in_time() {
    // errors against a many-steps reference on the same grid isolate the
    // time discretization from the fixed spatial error
    let run = |use_cn: bool, steps: usize| -> ValueGrid {
        let grid = Grid::uniform(&[0.0], &[PI], &[101]).unwrap();
        let terminal = ValueGrid::from_grid_fn(&grid, |x| x[0].sin());
        let result = if use_cn {
            solve_heat(grid, terminal, 0.1, CrankNicolsonScheme::new(), steps)
        } else {
            solve_heat(grid, terminal, 0.1, ImplicitScheme::new(), steps)
        };
        result.values
    };
    let diff = |a: &ValueGrid, b: &ValueGrid| -> f64 {
        a.data()
            .iter()
            .zip(b.data())
            .map(|(&x, &y)| (x - y).abs())
            .fold(0.0, f64::max)
    };

    let reference = run(false, 512);
    let implicit_ratio = diff(&run(false, 10), &reference) / diff(&run(false, 20), &reference);
    assert!(
        (1.7..2.5).contains(&implicit_ratio),
        "implicit dt-halving ratio {implicit_ratio}, expected about 2"
    );

    let reference = run(true, 512);
    let cn_ratio = diff(&run(true, 10), &reference) / diff(&run(true, 20), &reference);
    assert!(
        (3.4..4.8).contains(&cn_ratio),
        "crank-nicolson dt-halving ratio {cn_ratio}, expected about 4"
    );
}

/// Smoothly graded geometric axis on [0, 1] with a 2:1 spacing ratio.
fn graded_axis(points: usize) -> Vec<f64> {
    let a = 2.0_f64.ln();
    let n = (points - 1) as f64;
    (0..points)
        .map(|i| ((a * i as f64 / n).exp() - 1.0) / (a.exp() - 1.0))
        .collect()
}

#[test]
fn spatial_refinement_on_graded_grid_quarters_the_error() {
    let run = |points: usize| -> f64 {
        let grid = Grid::from_axes(vec![graded_axis(points)]).unwrap();
        let terminal = ValueGrid::from_grid_fn(&grid, |x| (PI * x[0]).sin());
        let result = solve_heat(grid.clone(), terminal, 0.05, CrankNicolsonScheme::new(), 200);
        let decay = (-PI * PI * 0.05).exp();
        max_abs_error(&result.values, |x| decay * (PI * x).sin(), &grid)
    };

    let coarse = run(41);
    let fine = run(81);
    let ratio = coarse / fine;
    assert!(
        (3.0..5.2).contains(&ratio),
        "refinement ratio {ratio} (coarse {coarse}, fine {fine}), expected about 4"
    );
}

#[test]
fn neumann_walls_preserve_a_flat_profile() {
    let grid = Grid::uniform(&[0.0], &[1.0], &[41]).unwrap();
    let terminal = ValueGrid::from_grid_fn(&grid, |_| 3.0);
    let result = PdeSolver::builder()
        .start_time(0.2)
        .end_time(0.0)
        .grid(grid)
        .values(terminal)
        .num_steps(20)
        .second_order_coeff_fn(|_, _| vec![vec![Some(Coefficient::Scalar(1.0))]])
        .boundary_conditions(vec![BoundarySpec::new(
            neumann(|_, _| Coefficient::Scalar(0.0)),
            neumann(|_, _| Coefficient::Scalar(0.0)),
        )])
        .scheme(CrankNicolsonScheme::new())
        .build()
        .unwrap()
        .solve()
        .unwrap();

    for (i, &v) in result.values.data().iter().enumerate() {
        assert!((v - 3.0).abs() < 1.0e-12, "point {i} drifted to {v}");
    }
}

#[test]
fn time_dependent_dirichlet_data_is_tracked_exactly_for_quadratics() {
    // V(x, t) = x^2 - 2t satisfies dV/dt + V_xx = 0; quadratic in space and
    // linear in time, so both the stencil and the trapezoidal time average
    // are exact.
    let grid = Grid::uniform(&[0.0], &[1.0], &[21]).unwrap();
    let exact = |x: f64, t: f64| x * x - 2.0 * t;
    let terminal = ValueGrid::from_grid_fn(&grid, |x| exact(x[0], 0.5));
    let result = PdeSolver::builder()
        .start_time(0.5)
        .end_time(0.1)
        .grid(grid.clone())
        .values(terminal)
        .num_steps(40)
        .second_order_coeff_fn(|_, _| vec![vec![Some(Coefficient::Scalar(1.0))]])
        .boundary_conditions(vec![BoundarySpec::new(
            dirichlet(|t, _| Coefficient::Scalar(-2.0 * t)),
            dirichlet(|t, _| Coefficient::Scalar(1.0 - 2.0 * t)),
        )])
        .scheme(CrankNicolsonScheme::new())
        .build()
        .unwrap()
        .solve()
        .unwrap();

    let err = max_abs_error(&result.values, |x| exact(x, 0.1), &grid);
    assert!(err < 1.0e-10, "max abs error {err}");
}
