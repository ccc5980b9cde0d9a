use crate::case::Branch;
use crate::error::{PfError, PfResult};

use num_complex::Complex64;

/// Builds the bus admittance matrix from the branch list.
///
/// For each branch the series admittance `y = 1/(r + jx)` and half the
/// line charging `b/2` are accumulated: both terms onto the two diagonal
/// entries, `-y` onto the two off-diagonal entries. The result is
/// symmetric off the diagonal and independent of branch input order.
///
/// Fails if a branch references a bus outside `1..=nb` or has zero series
/// impedance (undefined admittance).
pub fn make_ybus(nb: usize, branches: &[Branch]) -> PfResult<Vec<Vec<Complex64>>> {
    let mut y_bus = vec![vec![Complex64::new(0.0, 0.0); nb]; nb];

    for br in branches {
        if br.from_bus < 1 || br.from_bus > nb || br.to_bus < 1 || br.to_bus > nb {
            return Err(PfError::Config(format!(
                "branch {}-{} references a bus outside 1..={}",
                br.from_bus, br.to_bus, nb
            )));
        }
        if br.br_r == 0.0 && br.br_x == 0.0 {
            return Err(PfError::Config(format!(
                "branch {}-{} has zero series impedance",
                br.from_bus, br.to_bus
            )));
        }
        let (i, j) = (br.from_idx(), br.to_idx());

        let y_series = Complex64::new(br.br_r, br.br_x).inv();
        let y_shunt = Complex64::new(0.0, br.br_b / 2.0);

        y_bus[i][i] += y_series + y_shunt;
        y_bus[j][j] += y_series + y_shunt;
        y_bus[i][j] -= y_series;
        y_bus[j][i] -= y_series;
    }

    Ok(y_bus)
}

/// Nodal current injections `I = Y·V`.
pub(crate) fn ybus_mul(y_bus: &[Vec<Complex64>], v: &[Complex64]) -> Vec<Complex64> {
    y_bus
        .iter()
        .map(|row| row.iter().zip(v).map(|(y, v)| y * v).sum())
        .collect()
}

/// Calculated real and reactive power injections at every bus:
/// `S = V ⊙ conj(Y·V)`.
pub fn bus_injections(y_bus: &[Vec<Complex64>], v: &[Complex64]) -> (Vec<f64>, Vec<f64>) {
    let i_bus = ybus_mul(y_bus, v);
    let mut p = Vec::with_capacity(v.len());
    let mut q = Vec::with_capacity(v.len());
    for (v, i_bus) in v.iter().zip(&i_bus) {
        let s = v * i_bus.conj();
        p.push(s.re);
        q.push(s.im);
    }
    (p, q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{Branch, Case};

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn off_diagonal_symmetry() {
        let case = Case::ieee9();
        let y = make_ybus(9, &case.branches).unwrap();
        for i in 0..9 {
            for j in 0..9 {
                assert!(close(y[i][j], y[j][i]), "Y[{i}][{j}] != Y[{j}][{i}]");
            }
        }
    }

    #[test]
    fn independent_of_branch_order() {
        let case = Case::ieee9();
        let y = make_ybus(9, &case.branches).unwrap();
        let mut reversed = case.branches.clone();
        reversed.reverse();
        let y_rev = make_ybus(9, &reversed).unwrap();
        for i in 0..9 {
            for j in 0..9 {
                assert!(close(y[i][j], y_rev[i][j]));
            }
        }
    }

    #[test]
    fn diagonal_sums_incident_admittances() {
        // two branches meeting at bus 2
        let branches = vec![
            Branch::new(1, 2, 0.01, 0.1, 0.2),
            Branch::new(2, 3, 0.02, 0.2, 0.0),
        ];
        let y = make_ybus(3, &branches).unwrap();
        let y1 = Complex64::new(0.01, 0.1).inv();
        let y2 = Complex64::new(0.02, 0.2).inv();
        let expect = y1 + Complex64::new(0.0, 0.1) + y2;
        assert!(close(y[1][1], expect));
        assert!(close(y[0][1], -y1));
        assert!(close(y[1][2], -y2));
    }

    #[test]
    fn out_of_range_bus_rejected() {
        let branches = vec![Branch::new(1, 4, 0.01, 0.1, 0.0)];
        assert!(matches!(
            make_ybus(3, &branches),
            Err(PfError::Config(_))
        ));
        let branches = vec![Branch::new(0, 2, 0.01, 0.1, 0.0)];
        assert!(matches!(
            make_ybus(3, &branches),
            Err(PfError::Config(_))
        ));
    }

    #[test]
    fn zero_impedance_branch_rejected() {
        let branches = vec![Branch::new(1, 2, 0.0, 0.0, 0.1)];
        assert!(matches!(
            make_ybus(2, &branches),
            Err(PfError::Config(_))
        ));
    }

    #[test]
    fn injections_match_hand_calculation() {
        // single branch, both buses at the same voltage: no series current
        // flows, only the line charging shows up, as Q = -b/2 per end under
        // the S = V·conj(Y·V) convention
        let branches = vec![Branch::new(1, 2, 0.0, 0.1, 0.2)];
        let y = make_ybus(2, &branches).unwrap();
        let v = vec![Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)];
        let (p, q) = bus_injections(&y, &v);
        assert!(p[0].abs() < 1e-12);
        assert!((q[0] + 0.1).abs() < 1e-12);
        assert!((q[1] + 0.1).abs() < 1e-12);
    }
}
