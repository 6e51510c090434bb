//! Douglas ADI reference runs: conservation under Neumann walls and the
//! order drop that mixed derivatives cost.

use ferropde::prelude::*;

#[test]
fn anisotropic_diffusion_conserves_mass_under_neumann_walls() {
    // Gaussian far from the walls; zero-flux conditions keep the integral
    // of V fixed for the continuous problem, and the discrete run must hold
    // it to one part in a million.
    let grid = Grid::uniform(&[-6.0, -6.0], &[6.0, 6.0], &[61, 61]).unwrap();
    let terminal = ValueGrid::from_grid_fn(&grid, |x| {
        (-(x[0] * x[0] + x[1] * x[1]) / (2.0 * 0.25)).exp()
    });

    let mass = |values: &ValueGrid| -> f64 {
        let (nx, ny) = (61, 61);
        let h = 0.2;
        let mut total = 0.0;
        for i in 0..nx {
            for j in 0..ny {
                let wi = if i == 0 || i == nx - 1 { 0.5 } else { 1.0 };
                let wj = if j == 0 || j == ny - 1 { 0.5 } else { 1.0 };
                total += wi * wj * values.at(0, &[i, j]);
            }
        }
        total * h * h
    };
    let initial_mass = mass(&terminal);

    let zero_flux = || {
        BoundarySpec::new(
            neumann(|_, _| Coefficient::Scalar(0.0)),
            neumann(|_, _| Coefficient::Scalar(0.0)),
        )
    };
    let result = PdeSolver::builder()
        .start_time(0.25)
        .end_time(0.0)
        .grid(grid)
        .values(terminal)
        .num_steps(25)
        .second_order_coeff_fn(|_, _| {
            vec![
                vec![Some(Coefficient::Scalar(1.0)), None],
                vec![None, Some(Coefficient::Scalar(0.25))],
            ]
        })
        .boundary_conditions(vec![zero_flux(), zero_flux()])
        .scheme(DouglasAdiScheme::new(0.5))
        .build()
        .unwrap()
        .solve()
        .unwrap();

    let final_mass = mass(&result.values);
    let drift = ((final_mass - initial_mass) / initial_mass).abs();
    assert!(
        drift < 1.0e-6,
        "mass drifted by {drift} ({initial_mass} -> {final_mass})"
    );

    // the peak must have spread out, not just survived
    let peak = result.values.at(0, &[30, 30]);
    assert!(peak < 0.9 && peak > 0.1, "peak after diffusion: {peak}");
}

const DRIFT: [f64; 3] = [0.1, -0.2, 0.15];
const REACTION: f64 = 0.05;

fn diffusion_entry(i: usize, j: usize) -> f64 {
    const D: [[f64; 3]; 3] = [
        [0.5, 0.2, 0.15],
        [0.2, 0.4, 0.1],
        [0.15, 0.1, 0.3],
    ];
    D[i][j]
}

/// Decay rate of the separable exponential solution `exp(a.x + rate*(1-t))`.
fn growth_rate(a: &[f64; 3], with_mixed: bool) -> f64 {
    let mut rate = REACTION;
    for i in 0..3 {
        rate += diffusion_entry(i, i) * a[i] * a[i] + DRIFT[i] * a[i];
        if with_mixed {
            for j in i + 1..3 {
                rate += 2.0 * diffusion_entry(i, j) * a[i] * a[j];
            }
        }
    }
    rate
}

const EXPONENT: [f64; 3] = [0.8, 0.7, 0.6];

fn exact(x: &[f64], t: f64, with_mixed: bool) -> f64 {
    let dot: f64 = EXPONENT.iter().zip(x).map(|(&a, &xi)| a * xi).sum();
    (dot + growth_rate(&EXPONENT, with_mixed) * (1.0 - t)).exp()
}

fn face_gamma(grid: &Grid, axis: usize, face_coord: f64, t: f64, with_mixed: bool) -> Coefficient {
    let other: Vec<usize> = (0..3).filter(|&k| k != axis).collect();
    let mut values = Vec::new();
    for i in 0..grid.axis(other[0]).len() {
        for j in 0..grid.axis(other[1]).len() {
            let mut x = [0.0_f64; 3];
            x[axis] = face_coord;
            x[other[0]] = grid.axis(other[0])[i];
            x[other[1]] = grid.axis(other[1])[j];
            values.push(exact(&x, t, with_mixed));
        }
    }
    Coefficient::Field(values)
}

fn solve_exponential(with_mixed: bool, steps: usize) -> SolveResult {
    let grid = Grid::uniform(&[0.0; 3], &[1.0; 3], &[11; 3]).unwrap();
    let terminal = ValueGrid::from_grid_fn(&grid, |x| exact(x, 1.0, with_mixed));

    let boundaries = (0..3)
        .map(|axis| {
            BoundarySpec::new(
                dirichlet(move |t, g: &Grid| face_gamma(g, axis, 0.0, t, with_mixed)),
                dirichlet(move |t, g: &Grid| face_gamma(g, axis, 1.0, t, with_mixed)),
            )
        })
        .collect();

    PdeSolver::builder()
        .start_time(1.0)
        .end_time(0.0)
        .grid(grid)
        .values(terminal)
        .num_steps(steps)
        .second_order_coeff_fn(move |_, _| {
            (0..3)
                .map(|i| {
                    (0..3)
                        .map(|j| {
                            if i == j || (with_mixed && i < j) {
                                Some(Coefficient::Scalar(diffusion_entry(i, j)))
                            } else {
                                None
                            }
                        })
                        .collect()
                })
                .collect()
        })
        .first_order_coeff_fn(|_, _| {
            DRIFT.iter().map(|&mu| Some(Coefficient::Scalar(mu))).collect()
        })
        .zeroth_order_coeff_fn(|_, _| Some(Coefficient::Scalar(REACTION)))
        .boundary_conditions(boundaries)
        .scheme(DouglasAdiScheme::new(0.5))
        .build()
        .expect("valid 3-d solver")
        .solve()
        .expect("3-d solve")
}

fn max_diff(a: &SolveResult, b: &SolveResult) -> f64 {
    a.values
        .data()
        .iter()
        .zip(b.values.data())
        .map(|(&x, &y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[test]
fn douglas_adi_is_first_order_with_mixed_terms_second_order_without() {
    // reference run with many steps isolates the time-discretization error
    let reference_mixed = solve_exponential(true, 64);
    let mixed_coarse = max_diff(&solve_exponential(true, 4), &reference_mixed);
    let mixed_fine = max_diff(&solve_exponential(true, 8), &reference_mixed);
    let mixed_ratio = mixed_coarse / mixed_fine;
    assert!(
        (1.5..3.0).contains(&mixed_ratio),
        "with mixed terms: dt-halving ratio {mixed_ratio}, expected about 2"
    );

    let reference_pure = solve_exponential(false, 64);
    let pure_coarse = max_diff(&solve_exponential(false, 4), &reference_pure);
    let pure_fine = max_diff(&solve_exponential(false, 8), &reference_pure);
    let pure_ratio = pure_coarse / pure_fine;
    assert!(
        (3.0..5.0).contains(&pure_ratio),
        "without mixed terms: dt-halving ratio {pure_ratio}, expected about 4"
    );
}

#[test]
fn three_dimensional_solution_tracks_the_exponential_mode() {
    let result = solve_exponential(false, 16);
    let grid = &result.grid;
    let mut worst_rel = 0.0_f64;
    for i in 0..11 {
        for j in 0..11 {
            for k in 0..11 {
                let x = [grid.axis(0)[i], grid.axis(1)[j], grid.axis(2)[k]];
                let truth = exact(&x, 0.0, false);
                let got = result.values.at(0, &[i, j, k]);
                worst_rel = worst_rel.max(((got - truth) / truth).abs());
            }
        }
    }
    assert!(worst_rel < 0.02, "worst relative error {worst_rel}");
}
