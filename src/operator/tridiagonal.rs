//! Batched tridiagonal matrix-vector multiply and solve.
//!
//! Both kernels treat their inputs as `rows` independent systems of length
//! `m`, stored contiguously. The discretizer lays every axis operator out
//! with the stepped axis innermost, so batch elements and all other spatial
//! axes become rows here. Rows are independent and run in parallel once
//! there are enough of them to pay for the fan-out.

use rayon::prelude::*;

use crate::core::SolverError;

/// Below this many rows the kernels stay serial.
const PARALLEL_MIN_ROWS: usize = 16;

/// Pivot magnitude below which the elimination is considered singular.
const PIVOT_EPS: f64 = 1.0e-14;

fn check_lengths(
    sub: &[f64],
    diag: &[f64],
    sup: &[f64],
    x: &[f64],
    out: &[f64],
    m: usize,
) -> Result<usize, SolverError> {
    if m == 0 {
        return Err(SolverError::InvalidInput(
            "tridiagonal system length must be positive".to_string(),
        ));
    }
    let len = diag.len();
    if sub.len() != len || sup.len() != len || x.len() != len || out.len() != len || len % m != 0 {
        return Err(SolverError::InvalidInput(
            "tridiagonal input lengths must match and be a multiple of the system length"
                .to_string(),
        ));
    }
    Ok(len / m)
}

/// Computes `out = T x` for every row, where `T` has diagonals
/// `(sub, diag, sup)`. `sub[0]` and `sup[m-1]` of each row are ignored.
pub fn tridiagonal_matmul(
    sub: &[f64],
    diag: &[f64],
    sup: &[f64],
    x: &[f64],
    out: &mut [f64],
    m: usize,
) -> Result<(), SolverError> {
    let rows = check_lengths(sub, diag, sup, x, out, m)?;

    let row_product = |row: usize, out_row: &mut [f64]| {
        let base = row * m;
        let sub = &sub[base..base + m];
        let diag = &diag[base..base + m];
        let sup = &sup[base..base + m];
        let x = &x[base..base + m];
        if m == 1 {
            out_row[0] = diag[0] * x[0];
            return;
        }
        out_row[0] = diag[0] * x[0] + sup[0] * x[1];
        for i in 1..m - 1 {
            out_row[i] = sub[i] * x[i - 1] + diag[i] * x[i] + sup[i] * x[i + 1];
        }
        out_row[m - 1] = sub[m - 1] * x[m - 2] + diag[m - 1] * x[m - 1];
    };

    if rows >= PARALLEL_MIN_ROWS {
        out.par_chunks_mut(m)
            .enumerate()
            .for_each(|(row, out_row)| row_product(row, out_row));
    } else {
        for (row, out_row) in out.chunks_mut(m).enumerate() {
            row_product(row, out_row);
        }
    }
    Ok(())
}

/// Solves `T out = rhs` for every row by the Thomas algorithm.
///
/// `sub[0]` and `sup[m-1]` of each row are ignored. Fails when an eliminated
/// pivot falls below [`PIVOT_EPS`] in magnitude.
pub fn tridiagonal_solve(
    sub: &[f64],
    diag: &[f64],
    sup: &[f64],
    rhs: &[f64],
    out: &mut [f64],
    m: usize,
) -> Result<(), SolverError> {
    let rows = check_lengths(sub, diag, sup, rhs, out, m)?;

    let solve_row = |row: usize,
                     out_row: &mut [f64],
                     c_star: &mut [f64],
                     d_star: &mut [f64]|
     -> Result<(), SolverError> {
        let base = row * m;
        let sub = &sub[base..base + m];
        let diag = &diag[base..base + m];
        let sup = &sup[base..base + m];
        let rhs = &rhs[base..base + m];

        let denom = diag[0];
        if denom.abs() <= PIVOT_EPS || !denom.is_finite() {
            return Err(SolverError::NumericalError(
                "tridiagonal solver singular matrix".to_string(),
            ));
        }
        c_star[0] = if m > 1 { sup[0] / denom } else { 0.0 };
        d_star[0] = rhs[0] / denom;

        for i in 1..m {
            let denom = diag[i] - sub[i] * c_star[i - 1];
            if denom.abs() <= PIVOT_EPS || !denom.is_finite() {
                return Err(SolverError::NumericalError(
                    "tridiagonal solver singular matrix".to_string(),
                ));
            }
            c_star[i] = if i < m - 1 { sup[i] / denom } else { 0.0 };
            d_star[i] = (rhs[i] - sub[i] * d_star[i - 1]) / denom;
        }

        out_row[m - 1] = d_star[m - 1];
        for i in (0..m - 1).rev() {
            out_row[i] = d_star[i] - c_star[i] * out_row[i + 1];
        }
        Ok(())
    };

    if rows >= PARALLEL_MIN_ROWS {
        out.par_chunks_mut(m).enumerate().try_for_each_init(
            || (vec![0.0_f64; m], vec![0.0_f64; m]),
            |(c_star, d_star), (row, out_row)| solve_row(row, out_row, c_star, d_star),
        )
    } else {
        let mut c_star = vec![0.0_f64; m];
        let mut d_star = vec![0.0_f64; m];
        for (row, out_row) in out.chunks_mut(m).enumerate() {
            solve_row(row, out_row, &mut c_star, &mut d_star)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dense(sub: &[f64], diag: &[f64], sup: &[f64], m: usize) -> DMatrix<f64> {
        let mut a = DMatrix::zeros(m, m);
        for i in 0..m {
            a[(i, i)] = diag[i];
            if i > 0 {
                a[(i, i - 1)] = sub[i];
            }
            if i < m - 1 {
                a[(i, i + 1)] = sup[i];
            }
        }
        a
    }

    #[test]
    fn matmul_matches_dense_product() {
        let m = 6;
        let mut rng = StdRng::seed_from_u64(7);
        let sub: Vec<f64> = (0..m).map(|_| rng.random_range(-1.0..1.0)).collect();
        let diag: Vec<f64> = (0..m).map(|_| rng.random_range(2.0..3.0)).collect();
        let sup: Vec<f64> = (0..m).map(|_| rng.random_range(-1.0..1.0)).collect();
        let x: Vec<f64> = (0..m).map(|_| rng.random_range(-5.0..5.0)).collect();

        let mut out = vec![0.0; m];
        tridiagonal_matmul(&sub, &diag, &sup, &x, &mut out, m).unwrap();

        let reference = dense(&sub, &diag, &sup, m) * DVector::from_column_slice(&x);
        for i in 0..m {
            assert!((out[i] - reference[i]).abs() < 1.0e-12);
        }
    }

    #[test]
    fn solve_matches_dense_solve_across_batched_rows() {
        let m = 9;
        let rows = 40; // above the parallel threshold
        let mut rng = StdRng::seed_from_u64(41);
        let len = rows * m;
        let sub: Vec<f64> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
        let diag: Vec<f64> = (0..len).map(|_| rng.random_range(3.0..4.0)).collect();
        let sup: Vec<f64> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
        let rhs: Vec<f64> = (0..len).map(|_| rng.random_range(-2.0..2.0)).collect();

        let mut out = vec![0.0; len];
        tridiagonal_solve(&sub, &diag, &sup, &rhs, &mut out, m).unwrap();

        for row in 0..rows {
            let base = row * m;
            let a = dense(
                &sub[base..base + m],
                &diag[base..base + m],
                &sup[base..base + m],
                m,
            );
            let b = DVector::from_column_slice(&rhs[base..base + m]);
            let reference = a.lu().solve(&b).expect("dense solve");
            for i in 0..m {
                assert!(
                    (out[base + i] - reference[i]).abs() < 1.0e-10,
                    "row {row} entry {i}: {} vs {}",
                    out[base + i],
                    reference[i]
                );
            }
        }
    }

    #[test]
    fn solve_then_matmul_round_trips() {
        let m = 12;
        let sub = vec![-1.0; m];
        let diag = vec![4.0; m];
        let sup = vec![-1.0; m];
        let rhs: Vec<f64> = (0..m).map(|i| (i as f64).sin() + 2.0).collect();

        let mut x = vec![0.0; m];
        tridiagonal_solve(&sub, &diag, &sup, &rhs, &mut x, m).unwrap();
        let mut back = vec![0.0; m];
        tridiagonal_matmul(&sub, &diag, &sup, &x, &mut back, m).unwrap();
        for i in 0..m {
            assert!((back[i] - rhs[i]).abs() < 1.0e-12);
        }
    }

    #[test]
    fn singular_system_is_reported() {
        let m = 3;
        let sub = vec![0.0, 1.0, 1.0];
        let diag = vec![0.0, 1.0, 1.0];
        let sup = vec![1.0, 1.0, 0.0];
        let rhs = vec![1.0; m];
        let mut out = vec![0.0; m];
        let err = tridiagonal_solve(&sub, &diag, &sup, &rhs, &mut out, m).unwrap_err();
        assert!(matches!(err, SolverError::NumericalError(_)));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut out = vec![0.0; 4];
        let err = tridiagonal_matmul(&[0.0; 4], &[1.0; 4], &[0.0; 3], &[1.0; 4], &mut out, 2)
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)));
    }
}
