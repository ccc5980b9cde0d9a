use crate::case::Branch;

use num_complex::Complex64;

/// Complex power flow over a single branch, evaluated from a solved
/// voltage vector. All quantities in per unit; `p_f`/`q_f` is the power
/// entering the branch at the from end, `p_t`/`q_t` at the to end, and
/// the loss is their sum (positive real loss for any branch with
/// resistance).
#[derive(Debug, Clone)]
pub struct BranchFlow {
    pub from_bus: usize,
    pub to_bus: usize,
    pub p_f: f64,
    pub q_f: f64,
    pub p_t: f64,
    pub q_t: f64,
    pub p_loss: f64,
    pub q_loss: f64,
}

/// Computes the sending and receiving end power flows and the loss of
/// every branch.
///
/// Uses the branch pi-model directly rather than the assembled admittance
/// matrix, so parallel branches between the same bus pair each get their
/// own flow. A pure read-out of the voltage solution; calling it does not
/// change `v` and computing it twice gives identical results.
pub fn branch_flows(branches: &[Branch], v: &[Complex64]) -> Vec<BranchFlow> {
    branches
        .iter()
        .map(|br| {
            let y_series = Complex64::new(br.br_r, br.br_x).inv();
            let y_shunt = Complex64::new(0.0, br.br_b / 2.0);
            let (vi, vj) = (v[br.from_idx()], v[br.to_idx()]);

            let i_f = (vi - vj) * y_series + vi * y_shunt;
            let i_t = (vj - vi) * y_series + vj * y_shunt;

            let s_f = vi * i_f.conj();
            let s_t = vj * i_t.conj();
            let loss = s_f + s_t;

            BranchFlow {
                from_bus: br.from_bus,
                to_bus: br.to_bus,
                p_f: s_f.re,
                q_f: s_f.im,
                p_t: s_t.re,
                q_t: s_t.im,
                p_loss: loss.re,
                q_loss: loss.im,
            }
        })
        .collect()
}

/// Total system loss: the sum of the per-branch losses. The reactive
/// part can be negative when line charging dominates the series
/// consumption.
pub fn total_loss(flows: &[BranchFlow]) -> (f64, f64) {
    flows
        .iter()
        .fold((0.0, 0.0), |(p, q), f| (p + f.p_loss, q + f.q_loss))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{Case, PfModel};
    use crate::newton::newtonpf;
    use crate::pfopt::PFOpt;

    #[test]
    fn lossless_branch_conserves_real_power() {
        // single reactance-only branch: P in equals P out
        let branches = vec![Branch::new(1, 2, 0.0, 0.1, 0.0)];
        let v = vec![Complex64::new(1.04, 0.0), Complex64::from_polar(1.0, -0.05)];
        let flows = branch_flows(&branches, &v);
        assert!((flows[0].p_f + flows[0].p_t).abs() < 1e-12);
        assert!(flows[0].p_loss.abs() < 1e-12);
        // reactance still consumes reactive power
        assert!(flows[0].q_loss > 0.0);
    }

    #[test]
    fn flow_direction_follows_angle_difference() {
        // leading angle at the from end sends real power from 1 to 2
        let branches = vec![Branch::new(1, 2, 0.01, 0.1, 0.0)];
        let v = vec![Complex64::new(1.0, 0.0), Complex64::from_polar(1.0, -0.1)];
        let flows = branch_flows(&branches, &v);
        assert!(flows[0].p_f > 0.0);
        assert!(flows[0].p_t < 0.0);
        assert!(flows[0].p_loss > 0.0);
    }

    #[test]
    fn ieee9_losses_match_slack_surplus() {
        // total real loss equals total generation minus total load, which
        // at the solution is the slack injection plus the specified ones
        let case = Case::ieee9();
        let model = PfModel::new(&case).unwrap();
        let res = newtonpf(&model, &case.v0(), &PFOpt::default(), None).unwrap();
        let flows = branch_flows(&model.branches, &res.v);
        let (p_loss, _) = total_loss(&flows);

        let (p_calc, _) = crate::ybus::bus_injections(&model.y_bus, &res.v);
        let p_total: f64 = p_calc.iter().sum();
        assert!((p_loss - p_total).abs() < 1e-6);
        assert!(p_loss > 0.0);
        assert!(p_loss < 0.1);
    }

    #[test]
    fn read_out_is_idempotent() {
        let case = Case::ieee9();
        let model = PfModel::new(&case).unwrap();
        let res = newtonpf(&model, &case.v0(), &PFOpt::default(), None).unwrap();
        let a = branch_flows(&model.branches, &res.v);
        let b = branch_flows(&model.branches, &res.v);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.p_f, y.p_f);
            assert_eq!(x.q_t, y.q_t);
            assert_eq!(x.p_loss, y.p_loss);
        }
    }
}
