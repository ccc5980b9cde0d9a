use crate::case::{BusType, PfModel};
use crate::error::PfResult;
use crate::math::max_abs_diff;
use crate::newton::ProgressMonitor;
use crate::pfopt::PFOpt;
use crate::runpf::PowerFlowResult;

use num_complex::Complex64;

/// Solves the load flow using the Gauss-Seidel method.
///
/// Sweeps the non-slack buses in ascending index order once per outer
/// iteration, updating each voltage in place so that later buses in the
/// same sweep already see the new values (the defining difference from a
/// Jacobi-style iteration). PV buses first re-estimate their reactive
/// injection from the current voltages, then have their magnitude pinned
/// back to the set point while keeping the freshly computed angle.
///
/// Convergence is tested once per full sweep on the largest voltage
/// change, not on the power mismatch, so the reported mismatch norm of
/// the result is the final `max|V - V_prev|`. Returns the final complex
/// voltages, a flag which indicates whether it converged or not, and the
/// number of sweeps performed.
pub fn gausspf(
    model: &PfModel,
    v0: &[Complex64],
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PfResult<PowerFlowResult> {
    let bt = &model.bt;
    let y_bus = &model.y_bus;
    let nb = model.nb();

    let tol = opt.tolerance;
    let max_it = opt.max_it_gs;

    let mut converged = false;
    let mut i = 0;
    let mut v = v0.to_vec();

    // PV magnitude set points, taken from the initial voltages
    let vm0: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    let mut delta = f64::INFINITY;

    // do Gauss-Seidel sweeps
    while !converged && i < max_it {
        i += 1;
        let v_prev = v.clone();

        for &k in &bt.pvpq {
            // Σ_{j≠k} Y_kj·V_j with the voltages as updated so far
            let sum_yv: Complex64 = (0..nb)
                .filter(|&j| j != k)
                .map(|j| y_bus[k][j] * v[j])
                .sum();

            let s_inj = match model.types[k] {
                BusType::PV => {
                    // reactive injection estimated from the present state
                    let q_calc = -(v[k].conj() * (sum_yv + y_bus[k][k] * v[k])).im;
                    Complex64::new(model.p_spec[k], -q_calc)
                }
                _ => Complex64::new(model.p_spec[k], -model.q_spec[k]),
            };

            let v_new = (s_inj / v[k].conj() - sum_yv) / y_bus[k][k];

            v[k] = if model.types[k] == BusType::PV {
                // keep the computed angle, re-pin the magnitude
                Complex64::from_polar(vm0[k], v_new.arg())
            } else {
                v_new
            };
        }

        delta = max_abs_diff(&v, &v_prev);
        if let Some(pm) = progress {
            pm.update(i, delta);
        }
        if delta < tol {
            converged = true;
            log::info!("Gauss-Seidel load flow converged in {} iterations.", i);
        }
        log::debug!("delta_v{}: {}", i, delta);
    }

    if !converged {
        log::info!("Gauss-Seidel load flow did not converge in {} iterations.", i);
    }

    Ok(PowerFlowResult {
        v,
        converged,
        iterations: i,
        max_mismatch: delta,
    })
}
