/// Load flow solution method.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Alg {
    /// Full Newton-Raphson method.
    NR,
    /// Gauss-Seidel method.
    GS,
    /// Fast-Decoupled method.
    FD,
}

/// Solver options, uniform across all three methods.
pub struct PFOpt {
    pub algorithm: Alg,

    /// Termination tolerance on per unit mismatch. Default value is 1e-4.
    pub tolerance: f64,

    /// Maximum number of iterations for Newton's method. Default value is 100.
    pub max_it_nr: usize,
    /// Maximum number of iterations for the fast decoupled method. Default
    /// value is 100.
    pub max_it_fd: usize,
    /// Maximum number of iterations for the Gauss-Seidel method. Default
    /// value is 1000, reflecting its linear convergence rate.
    pub max_it_gs: usize,
}

impl Default for PFOpt {
    fn default() -> Self {
        Self {
            algorithm: Alg::NR,
            tolerance: 1e-4,
            max_it_nr: 100,
            max_it_fd: 100,
            max_it_gs: 1000,
        }
    }
}

impl PFOpt {
    pub fn with_algorithm(mut self, alg: Alg) -> Self {
        self.algorithm = alg;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }
}
