use crate::case::{Case, PfModel};
use crate::error::PfResult;
use crate::fd::fdpf;
use crate::gauss::gausspf;
use crate::lineflow::{branch_flows, total_loss, BranchFlow};
use crate::newton::{newtonpf, ProgressMonitor};
use crate::pfopt::{Alg, PFOpt};
use crate::ybus::bus_injections;

use num_complex::Complex64;

/// Raw solver output: the voltage vector and the iteration record. A
/// solver that ran out of iterations reports `converged: false` here
/// rather than returning an error.
#[derive(Debug, Clone)]
pub struct PowerFlowResult {
    pub v: Vec<Complex64>,
    pub converged: bool,
    pub iterations: usize,
    /// Final value of the quantity the method tests for convergence:
    /// the mismatch infinity norm for Newton and fast decoupled, the
    /// largest voltage change for Gauss-Seidel.
    pub max_mismatch: f64,
}

/// A load flow solution method. The three implementations are
/// interchangeable: same model in, same result shape out, differing only
/// in how they iterate towards the solution.
pub trait PfMethod {
    fn solve(
        &self,
        model: &PfModel,
        v0: &[Complex64],
        opt: &PFOpt,
        progress: Option<&dyn ProgressMonitor>,
    ) -> PfResult<PowerFlowResult>;
}

pub struct NewtonRaphson {}

impl PfMethod for NewtonRaphson {
    fn solve(
        &self,
        model: &PfModel,
        v0: &[Complex64],
        opt: &PFOpt,
        progress: Option<&dyn ProgressMonitor>,
    ) -> PfResult<PowerFlowResult> {
        newtonpf(model, v0, opt, progress)
    }
}

pub struct GaussSeidel {}

impl PfMethod for GaussSeidel {
    fn solve(
        &self,
        model: &PfModel,
        v0: &[Complex64],
        opt: &PFOpt,
        progress: Option<&dyn ProgressMonitor>,
    ) -> PfResult<PowerFlowResult> {
        gausspf(model, v0, opt, progress)
    }
}

pub struct FastDecoupled {}

impl PfMethod for FastDecoupled {
    fn solve(
        &self,
        model: &PfModel,
        v0: &[Complex64],
        opt: &PFOpt,
        progress: Option<&dyn ProgressMonitor>,
    ) -> PfResult<PowerFlowResult> {
        fdpf(model, v0, opt, progress)
    }
}

/// Full load flow solution: the solved state plus the derived bus
/// injections, branch flows and system losses.
#[derive(Debug, Clone)]
pub struct PowerFlowSolution {
    pub v: Vec<Complex64>,
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
    /// Calculated real injection at every bus (p.u.).
    pub p_calc: Vec<f64>,
    /// Calculated reactive injection at every bus (p.u.).
    pub q_calc: Vec<f64>,
    pub flows: Vec<BranchFlow>,
    pub p_loss: f64,
    pub q_loss: f64,
}

/// Runs a load flow on the given case with the algorithm selected in the
/// options, then derives injections, branch flows and losses from the
/// final voltages.
///
/// A solver that fails to converge within its iteration cap is not an
/// error; the read-out is still performed on the last iterate and the
/// solution carries `converged: false`. Errors are reserved for cases
/// that cannot be solved at all: invalid network configuration or a
/// singular system matrix.
pub fn runpf(
    case: &Case,
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PfResult<PowerFlowSolution> {
    let model = PfModel::new(case)?;
    let v0 = case.v0();

    let method: &dyn PfMethod = match opt.algorithm {
        Alg::NR => {
            log::info!("AC Power Flow (Newton)");
            &NewtonRaphson {}
        }
        Alg::GS => {
            log::info!("AC Power Flow (Gauss-Seidel)");
            &GaussSeidel {}
        }
        Alg::FD => {
            log::info!("AC Power Flow (fast-decoupled)");
            &FastDecoupled {}
        }
    };

    let res = method.solve(&model, &v0, opt, progress)?;
    if !res.converged {
        log::warn!(
            "did not converge in {} iterations (mismatch {:.3e})",
            res.iterations,
            res.max_mismatch
        );
    }

    let (p_calc, q_calc) = bus_injections(&model.y_bus, &res.v);
    let flows = branch_flows(&model.branches, &res.v);
    let (p_loss, q_loss) = total_loss(&flows);

    Ok(PowerFlowSolution {
        v: res.v,
        converged: res.converged,
        iterations: res.iterations,
        max_mismatch: res.max_mismatch,
        p_calc,
        q_calc,
        flows,
        p_loss,
        q_loss,
    })
}
