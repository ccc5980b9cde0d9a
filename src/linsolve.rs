use crate::error::{PfError, PfResult};

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};

/// Solves the dense system `A·x = b` by LU decomposition with partial
/// pivoting.
///
/// A singular matrix surfaces as non-finite entries in the solution and is
/// reported as [`PfError::Singular`] with the given context string, never
/// papered over.
pub(crate) fn lu_solve(a: &Mat<f64>, b: &[f64], what: &str) -> PfResult<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Ok(vec![]);
    }

    let mut rhs = Mat::zeros(n, 1);
    for (i, &b) in b.iter().enumerate() {
        rhs.write(i, 0, b);
    }

    let lu = a.partial_piv_lu();
    let x = lu.solve(&rhs);

    let x: Vec<f64> = (0..n).map(|i| x.read(i, 0)).collect();
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PfError::Singular(what.to_string()));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_system() {
        // A = [[4,1,0],[1,4,1],[0,1,4]], b = [1,2,1]
        let mut a = Mat::zeros(3, 3);
        for (i, row) in [[4.0, 1.0, 0.0], [1.0, 4.0, 1.0], [0.0, 1.0, 4.0]]
            .iter()
            .enumerate()
        {
            for (j, &v) in row.iter().enumerate() {
                a.write(i, j, v);
            }
        }
        let x = lu_solve(&a, &[1.0, 2.0, 1.0], "test").unwrap();
        // residual check
        let b0 = 4.0 * x[0] + x[1];
        let b1 = x[0] + 4.0 * x[1] + x[2];
        let b2 = x[1] + 4.0 * x[2];
        assert!((b0 - 1.0).abs() < 1e-12);
        assert!((b1 - 2.0).abs() < 1e-12);
        assert!((b2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let mut a = Mat::zeros(2, 2);
        a.write(0, 0, 1.0);
        a.write(0, 1, 2.0);
        a.write(1, 0, 2.0);
        a.write(1, 1, 4.0);
        let err = lu_solve(&a, &[1.0, 1.0], "test").unwrap_err();
        assert!(matches!(err, PfError::Singular(_)));
    }

    #[test]
    fn empty_system_is_trivial() {
        let a = Mat::zeros(0, 0);
        assert!(lu_solve(&a, &[], "test").unwrap().is_empty());
    }
}
