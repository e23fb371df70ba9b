use thiserror::Error;

/// An error type for the mesh module.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// An element references a node that does not exist.
    #[error("Element {element} references node {node} but the mesh has {num_nodes} nodes")]
    NodeOutOfRange {
        /// Index of the offending element.
        element: usize,
        /// The node id referenced by the element.
        node: usize,
        /// Number of nodes in the mesh.
        num_nodes: usize,
    },

    /// The element geometry has a vanishing or inverted jacobian.
    #[error("Degenerate element geometry (jacobian determinant {0})")]
    DegenerateElement(f64),

    /// Wrong number of nodal coordinates passed to an element.
    #[error("Element expects {expected} nodes, got {actual}")]
    WrongNodeCount {
        /// Number of nodes of the element.
        expected: usize,
        /// Number of coordinates provided.
        actual: usize,
    },

    /// Material parameters outside of their physical range.
    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    /// Invalid arguments for a mesh generator.
    #[error("Invalid mesh generator input: {0}")]
    InvalidGeneratorInput(String),
}
