#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Dense linear system backed by `faer` matrices.
pub mod dense;

/// Error types for the linear system backends.
pub mod error;

/// Sparse linear system backed by `faer` sparse column matrices.
pub mod sparse;

/// The abstract linear system interface.
pub mod system;

pub use dense::DenseLinearSystem;
pub use error::LinearSystemError;
pub use sparse::{ConjugateGradientParams, SparseLinearSystem, SparseSolver};
pub use system::{LinearSystem, SystemLayout};
