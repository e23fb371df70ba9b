#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// The element interface consumed by the solvers.
pub mod element;

/// Error types for meshes and elements.
pub mod error;

/// Small fixed-size linear algebra helpers.
pub mod linalg;

/// Linear elastic material laws.
pub mod material;

/// Mesh container and rectilinear mesh generators.
pub mod mesh;

/// Linear triangle element in 2D.
pub mod tri3;

/// Bilinear quadrilateral element in 2D.
pub mod quad4;

/// Linear tetrahedron element in 3D.
pub mod tet4;

pub use element::Element;
pub use error::MeshError;
pub use material::LinearElasticMaterial;
pub use mesh::Mesh;
pub use quad4::Quad4;
pub use tet4::Tet4;
pub use tri3::Tri3;
