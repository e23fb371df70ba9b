use femreg_linalg::LinearSystemError;
use femreg_mesh::MeshError;
use thiserror::Error;

/// An error type for the robust registration solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RobustSolverError {
    /// The interpolation grid region has no cells along an axis.
    #[error("Interpolation grid region has zero size along axis {axis}")]
    EmptyGridRegion {
        /// The axis with zero size.
        axis: usize,
    },

    /// The interpolation grid spacing is not strictly positive.
    #[error("Interpolation grid spacing must be positive, got {0}")]
    InvalidGridSpacing(f64),

    /// The interpolation grid direction matrix can not be inverted.
    #[error("Interpolation grid direction is singular")]
    SingularGridDirection,

    /// A degree of freedom outside `[0, NGFN)` was met during assembly.
    #[error("Illegal degree of freedom {dof}, the system has {ngfn}")]
    DofOutOfRange {
        /// The offending degree of freedom.
        dof: usize,
        /// Number of global degrees of freedom.
        ngfn: usize,
    },

    /// No active landmark is left to drive the registration.
    #[error("No active landmarks")]
    NoActiveLandmarks,

    /// A solver or landmark parameter is outside of its valid range.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An active landmark has no valid element binding.
    #[error("Landmark {index} is not bound to an element of the mesh")]
    UnboundLandmark {
        /// Position of the landmark in the active set.
        index: usize,
    },

    /// Error from the mesh or its elements.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Error from the linear system backend.
    #[error(transparent)]
    LinearSystem(#[from] LinearSystemError),
}
