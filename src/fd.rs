use crate::case::PfModel;
use crate::error::{PfError, PfResult};
use crate::linsolve::lu_solve;
use crate::math::norm_inf;
use crate::newton::ProgressMonitor;
use crate::pfopt::PFOpt;
use crate::runpf::PowerFlowResult;
use crate::ybus::bus_injections;

use faer::{FaerMat, Mat};
use num_complex::Complex64;
use std::iter::zip;

/// Builds the two constant matrices B' and B'' used in the fast
/// decoupled load flow.
///
/// Both are assembled like miniature admittance matrices from the series
/// reactance alone: each branch adds `1/x` to the diagonal entries of its
/// endpoints and `-1/x` off the diagonal, so the matrices approximate the
/// P-θ and Q-|V| Jacobian blocks. Resistance and line charging are
/// ignored. B' spans the non-slack buses, B'' the PQ buses; a branch
/// with one endpoint outside the respective set contributes to the
/// diagonal only. Built once per topology and reused, never rebuilt,
/// across iterations.
pub fn make_b(model: &PfModel) -> PfResult<(Mat<f64>, Mat<f64>)> {
    let nb = model.nb();
    let pvpq = &model.bt.pvpq;
    let pq = &model.bt.pq;

    let mut pos_ns: Vec<Option<usize>> = vec![None; nb];
    for (k, &b) in pvpq.iter().enumerate() {
        pos_ns[b] = Some(k);
    }
    let mut pos_pq: Vec<Option<usize>> = vec![None; nb];
    for (k, &b) in pq.iter().enumerate() {
        pos_pq[b] = Some(k);
    }

    let mut b_p = Mat::zeros(pvpq.len(), pvpq.len());
    let mut b_pp = Mat::zeros(pq.len(), pq.len());

    let add = |m: &mut Mat<f64>, r: usize, c: usize, val: f64| {
        let cur = m.read(r, c);
        m.write(r, c, cur + val);
    };

    for br in &model.branches {
        if br.br_x == 0.0 {
            return Err(PfError::Config(format!(
                "branch {}-{} has zero reactance; B matrices are undefined",
                br.from_bus, br.to_bus
            )));
        }
        let (i, j) = (br.from_idx(), br.to_idx());
        let b_val = 1.0 / br.br_x;

        if let (Some(ii), Some(jj)) = (pos_ns[i], pos_ns[j]) {
            add(&mut b_p, ii, jj, -b_val);
            add(&mut b_p, jj, ii, -b_val);
        }
        if let Some(ii) = pos_ns[i] {
            add(&mut b_p, ii, ii, b_val);
        }
        if let Some(jj) = pos_ns[j] {
            add(&mut b_p, jj, jj, b_val);
        }

        if let (Some(ii), Some(jj)) = (pos_pq[i], pos_pq[j]) {
            add(&mut b_pp, ii, jj, -b_val);
            add(&mut b_pp, jj, ii, -b_val);
        }
        if let Some(ii) = pos_pq[i] {
            add(&mut b_pp, ii, ii, b_val);
        }
        if let Some(jj) = pos_pq[j] {
            add(&mut b_pp, jj, jj, b_val);
        }
    }

    Ok((b_p, b_pp))
}

/// Solves the load flow using the fast decoupled method.
///
/// Each iteration solves `B'·Δθ = ΔP/|V|` for angle corrections over the
/// non-slack buses, then, with the updated angles, `B''·Δ|V| = ΔQ/|V|`
/// for magnitude corrections over the PQ buses. Convergence requires the
/// infinity norms of BOTH ΔP and ΔQ to meet tolerance; both are
/// re-evaluated after the combined angle and magnitude update of each
/// iteration, since either half-problem can satisfy its own tolerance on
/// a sweep where the other does not.
///
/// Returns the final complex voltages, a flag which indicates whether it
/// converged or not, and the number of iterations performed.
pub fn fdpf(
    model: &PfModel,
    v0: &[Complex64],
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PfResult<PowerFlowResult> {
    let pvpq = &model.bt.pvpq;
    let pq = &model.bt.pq;

    let tol = opt.tolerance;
    let max_it = opt.max_it_fd;

    let (b_p, b_pp) = make_b(model)?;

    let mut converged = false;
    let mut i = 0;
    let mut v = v0.to_vec();
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    let dp_of = |p_calc: &[f64]| -> Vec<f64> {
        pvpq.iter().map(|&b| model.p_spec[b] - p_calc[b]).collect()
    };
    let dq_of = |q_calc: &[f64]| -> Vec<f64> {
        pq.iter().map(|&b| model.q_spec[b] - q_calc[b]).collect()
    };

    // evaluate initial mismatches
    let (p_calc, q_calc) = bus_injections(&model.y_bus, &v);
    let mut dp = dp_of(&p_calc);
    let mut dq = dq_of(&q_calc);
    let mut norm_p = norm_inf(&dp);
    let mut norm_q = norm_inf(&dq);

    if let Some(pm) = progress {
        pm.update(i, norm_p.max(norm_q));
    }
    if norm_p < tol && norm_q < tol {
        converged = true;
        log::info!("Converged!");
    }
    log::debug!("norm_p0: {}, norm_q0: {}", norm_p, norm_q);

    while !converged && i < max_it {
        i += 1;

        // P-θ half step
        let rhs: Vec<f64> = zip(&dp, pvpq).map(|(dp, &b)| dp / vm[b]).collect();
        let d_theta = lu_solve(&b_p, &rhs, "B' matrix")?;
        for (k, &b) in pvpq.iter().enumerate() {
            va[b] += d_theta[k];
        }
        v = zip(&vm, &va)
            .map(|(&vm, &va)| Complex64::from_polar(vm, va))
            .collect();

        // Q-V half step, with the updated angles
        let (_, q_calc) = bus_injections(&model.y_bus, &v);
        dq = dq_of(&q_calc);
        let rhs: Vec<f64> = zip(&dq, pq).map(|(dq, &b)| dq / vm[b]).collect();
        let d_vm = lu_solve(&b_pp, &rhs, "B'' matrix")?;
        for (k, &b) in pq.iter().enumerate() {
            vm[b] += d_vm[k];
        }
        v = zip(&vm, &va)
            .map(|(&vm, &va)| Complex64::from_polar(vm, va))
            .collect();

        // re-test both mismatches after the combined update
        let (p_calc, q_calc) = bus_injections(&model.y_bus, &v);
        dp = dp_of(&p_calc);
        dq = dq_of(&q_calc);
        norm_p = norm_inf(&dp);
        norm_q = norm_inf(&dq);

        if let Some(pm) = progress {
            pm.update(i, norm_p.max(norm_q));
        }
        if norm_p < tol && norm_q < tol {
            converged = true;
            log::info!("Fast decoupled load flow converged in {} iterations.", i);
        }
        log::debug!("norm_p{}: {}, norm_q{}: {}", i, norm_p, i, norm_q);
    }

    if !converged {
        log::info!("Fast decoupled load flow did not converge in {} iterations.", i);
    }

    Ok(PowerFlowResult {
        v,
        converged,
        iterations: i,
        max_mismatch: norm_p.max(norm_q),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{Branch, Bus, Case};

    #[test]
    fn b_matrices_have_expected_shape_and_symmetry() {
        let case = Case::ieee9();
        let model = PfModel::new(&case).unwrap();
        let (b_p, b_pp) = make_b(&model).unwrap();
        assert_eq!(b_p.nrows(), 8);
        assert_eq!(b_pp.nrows(), 6);
        for r in 0..8 {
            // positive diagonal, like the susceptance matrix it approximates
            assert!(b_p.read(r, r) > 0.0);
            for c in 0..8 {
                assert!((b_p.read(r, c) - b_p.read(c, r)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn ieee9_converges() {
        let case = Case::ieee9();
        let model = PfModel::new(&case).unwrap();
        let opt = PFOpt::default();
        let res = fdpf(&model, &case.v0(), &opt, None).unwrap();
        assert!(res.converged);
        assert!(res.iterations <= 10, "took {} iterations", res.iterations);
        assert!(res.max_mismatch < opt.tolerance);
        // slack and PV voltages held
        assert_eq!(res.v[0], Complex64::new(1.04, 0.0));
        assert!((res.v[1].norm() - 1.025).abs() < 1e-12);
    }

    #[test]
    fn power_balance_holds_at_convergence() {
        let case = Case::ieee9();
        let model = PfModel::new(&case).unwrap();
        let opt = PFOpt::default();
        let res = fdpf(&model, &case.v0(), &opt, None).unwrap();
        let (p_calc, q_calc) = bus_injections(&model.y_bus, &res.v);
        for &b in &model.bt.pvpq {
            assert!((model.p_spec[b] - p_calc[b]).abs() < opt.tolerance);
        }
        for &b in &model.bt.pq {
            assert!((model.q_spec[b] - q_calc[b]).abs() < opt.tolerance);
        }
    }

    #[test]
    fn zero_reactance_branch_rejected() {
        let case = Case {
            buses: vec![Bus::slack(1.0), Bus::pq(-0.5, -0.1)],
            branches: vec![Branch::new(1, 2, 0.05, 0.0, 0.0)],
        };
        let model = PfModel::new(&case).unwrap();
        let err = fdpf(&model, &case.v0(), &PFOpt::default(), None).unwrap_err();
        assert!(matches!(err, PfError::Config(_)));
    }

    #[test]
    fn zero_iteration_cap_returns_initial_voltage() {
        let case = Case::ieee9();
        let model = PfModel::new(&case).unwrap();
        let v0 = case.v0();
        let opt = PFOpt {
            max_it_fd: 0,
            ..PFOpt::default()
        };
        let res = fdpf(&model, &v0, &opt, None).unwrap();
        assert!(!res.converged);
        assert_eq!(res.iterations, 0);
        assert_eq!(res.v, v0);
    }
}
