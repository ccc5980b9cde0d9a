use thiserror::Error;

/// Errors raised while preparing or solving a load flow case.
///
/// Reaching the iteration cap without meeting tolerance is not an error;
/// solvers report it through the `converged` flag of their result so that
/// callers running many scenarios can keep going with the best available
/// voltage estimate.
#[derive(Error, Debug)]
pub enum PfError {
    /// Malformed topology or bus data. The solve is aborted before any
    /// iteration runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// The Jacobian or a decoupled B matrix is not invertible. The solve
    /// fails as a whole; retrying with perturbed state would mask real
    /// network infeasibility.
    #[error("singular system matrix: {0}")]
    Singular(String),
}

pub type PfResult<T> = Result<T, PfError>;
