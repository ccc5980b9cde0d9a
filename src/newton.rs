use crate::case::PfModel;
use crate::error::PfResult;
use crate::linsolve::lu_solve;
use crate::math::norm_inf;
use crate::pfopt::PFOpt;
use crate::runpf::PowerFlowResult;
use crate::ybus::bus_injections;

use faer::{FaerMat, Mat};
use num_complex::Complex64;
use std::iter::zip;

/// Callback for per-iteration mismatch reporting.
pub trait ProgressMonitor {
    fn update(&self, i: usize, norm_f: f64);
}

pub struct PrintProgress {}

impl ProgressMonitor for PrintProgress {
    fn update(&self, i: usize, norm_f: f64) {
        if i == 0 {
            println!(" it    max P & Q mismatch (p.u.)");
            println!("----  ---------------------------");
        }
        println!("{}        {:.3e}", i, norm_f);
    }
}

/// Solves the load flow using the full Newton-Raphson method.
///
/// Solves for bus voltages given the prepared network model and the
/// initial vector of complex bus voltages. The voltage vector contains
/// the set points for the slack and PV buses and an initial guess for the
/// remaining magnitudes and angles. Each iteration linearizes the nodal
/// power balance equations around the current voltages, assembles the
/// four-block Jacobian [[dP/dθ, dP/d|V|], [dQ/dθ, dQ/d|V|]] and solves
/// for the angle and magnitude corrections.
///
/// Returns the final complex voltages, a flag which indicates whether the
/// mismatch infinity norm met tolerance, and the number of iterations
/// performed.
pub fn newtonpf(
    model: &PfModel,
    v0: &[Complex64],
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PfResult<PowerFlowResult> {
    let pvpq = &model.bt.pvpq;
    let pq = &model.bt.pq;

    let tol = opt.tolerance;
    let max_it = opt.max_it_nr;

    let mut converged = false;
    let mut i = 0;
    let mut v = v0.to_vec();
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    let npvpq = pvpq.len();

    // evaluate F(x0)
    let (mut p_calc, mut q_calc) = bus_injections(&model.y_bus, &v);
    let mut f = mismatch(&model.p_spec, &model.q_spec, &p_calc, &q_calc, pvpq, pq);

    let mut norm_f = norm_inf(&f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
        log::info!("Converged!");
    }
    log::debug!("norm_f0: {}", norm_f);

    // do Newton iterations
    while !converged && i < max_it {
        i += 1;

        let jac = build_jacobian(&model.y_bus, &vm, &va, &p_calc, &q_calc, pvpq, pq);
        let dx = lu_solve(&jac, &f, "Jacobian")?;

        // update voltage: angle corrections for all non-slack buses,
        // magnitude corrections for PQ buses only
        for (k, &b) in pvpq.iter().enumerate() {
            va[b] += dx[k];
        }
        for (k, &b) in pq.iter().enumerate() {
            vm[b] += dx[npvpq + k];
        }

        // reconstruct V, then refresh Vm and Va in case a correction
        // produced a negative magnitude and wrapped the angle
        v = zip(vm, va)
            .map(|(vm, va)| Complex64::from_polar(vm, va))
            .collect();
        va = v.iter().map(|v| v.arg()).collect();
        vm = v.iter().map(|v| v.norm()).collect();

        // evaluate F(x)
        (p_calc, q_calc) = bus_injections(&model.y_bus, &v);
        f = mismatch(&model.p_spec, &model.q_spec, &p_calc, &q_calc, pvpq, pq);

        norm_f = norm_inf(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            log::info!("Newton's method load flow converged in {} iterations.", i);
        }
        log::debug!("norm_f{}: {}", i, norm_f);
    }

    if !converged {
        log::info!("Newton's method load flow did not converge in {} iterations.", i);
    }

    Ok(PowerFlowResult {
        v,
        converged,
        iterations: i,
        max_mismatch: norm_f,
    })
}

/// Mismatch vector: specified minus calculated real power over the
/// non-slack buses, then reactive power over the PQ buses.
fn mismatch(
    p_spec: &[f64],
    q_spec: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
    pvpq: &[usize],
    pq: &[usize],
) -> Vec<f64> {
    [
        pvpq.iter()
            .map(|&b| p_spec[b] - p_calc[b])
            .collect::<Vec<_>>(),
        pq.iter()
            .map(|&b| q_spec[b] - q_calc[b])
            .collect::<Vec<_>>(),
    ]
    .concat()
}

/// Assembles the Newton-Raphson Jacobian from the four analytic blocks.
///
/// Rows/columns follow the mismatch ordering: P equations over the
/// non-slack buses and angle variables first, then Q equations over the
/// PQ buses and magnitude variables. Rebuilt in full every iteration.
fn build_jacobian(
    y_bus: &[Vec<Complex64>],
    vm: &[f64],
    va: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
    pvpq: &[usize],
    pq: &[usize],
) -> Mat<f64> {
    let npvpq = pvpq.len();
    let npq = pq.len();
    let mut jac = Mat::zeros(npvpq + npq, npvpq + npq);

    // J1 = dP/dθ
    for (r, &i) in pvpq.iter().enumerate() {
        for (c, &k) in pvpq.iter().enumerate() {
            let v = if i == k {
                -q_calc[i] - y_bus[i][i].im * vm[i] * vm[i]
            } else {
                let y = y_bus[i][k];
                let d = va[i] - va[k];
                vm[i] * vm[k] * (y.re * d.sin() - y.im * d.cos())
            };
            jac.write(r, c, v);
        }
    }

    // J2 = dP/d|V|
    for (r, &i) in pvpq.iter().enumerate() {
        for (c, &k) in pq.iter().enumerate() {
            let v = if i == k {
                p_calc[i] / vm[i] + y_bus[i][i].re * vm[i]
            } else {
                let y = y_bus[i][k];
                let d = va[i] - va[k];
                vm[i] * (y.re * d.cos() + y.im * d.sin())
            };
            jac.write(r, npvpq + c, v);
        }
    }

    // J3 = dQ/dθ
    for (r, &i) in pq.iter().enumerate() {
        for (c, &k) in pvpq.iter().enumerate() {
            let v = if i == k {
                p_calc[i] - y_bus[i][i].re * vm[i] * vm[i]
            } else {
                let y = y_bus[i][k];
                let d = va[i] - va[k];
                -vm[i] * vm[k] * (y.re * d.cos() + y.im * d.sin())
            };
            jac.write(npvpq + r, c, v);
        }
    }

    // J4 = dQ/d|V|
    for (r, &i) in pq.iter().enumerate() {
        for (c, &k) in pq.iter().enumerate() {
            let v = if i == k {
                q_calc[i] / vm[i] - y_bus[i][i].im * vm[i]
            } else {
                let y = y_bus[i][k];
                let d = va[i] - va[k];
                vm[i] * (y.re * d.sin() - y.im * d.cos())
            };
            jac.write(npvpq + r, npvpq + c, v);
        }
    }

    jac
}
