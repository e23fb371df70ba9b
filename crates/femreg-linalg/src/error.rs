use thiserror::Error;

/// An error type for the linear system backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinearSystemError {
    /// The system matrix could not be factorized or produced a non-finite solution.
    #[error("The system matrix is singular")]
    Singular,

    /// The iterative solver stopped before reaching the requested precision.
    #[error("Conjugate gradient did not converge after {iterations} iterations (relative residual {residual})")]
    NotConverged {
        /// Number of iterations performed.
        iterations: usize,
        /// Relative residual norm reached.
        residual: f64,
    },

    /// A Cholesky pivot or a conjugate gradient curvature was not positive.
    #[error("The system matrix is not positive definite")]
    NotPositiveDefinite,
}
