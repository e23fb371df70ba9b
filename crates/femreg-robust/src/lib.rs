#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Assembly of mesh and landmark contributions into the linear system.
pub mod assembly;

/// Binding of landmarks to the mesh elements containing them.
pub mod binder;

/// Error types for the solver.
pub mod error;

mod field;

/// Regular grids and the element interpolation grid.
pub mod grid;

/// The landmark data model.
pub mod landmark;

/// Solver parameters.
pub mod params;

/// The robust iteration controller.
pub mod solver;

/// Landmark tensors, ponderation and error weighting.
pub mod tensor;

pub use error::RobustSolverError;
pub use grid::{GridGeometry, GridRegion, InterpolationGrid};
pub use landmark::Landmark;
pub use params::RobustSolverParams;
pub use solver::RobustSolver;
