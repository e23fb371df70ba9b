use crate::error::MeshError;

/// A finite element with `D` degrees of freedom per node, one per spatial axis.
///
/// The global degree of freedom of component `c` of node `n` is `n * D + c`.
pub trait Element<const D: usize>: std::fmt::Debug + Send + Sync {
    /// Global ids of the element nodes, in local order.
    fn node_ids(&self) -> &[usize];

    /// Number of nodes of the element.
    fn num_nodes(&self) -> usize {
        self.node_ids().len()
    }

    /// Number of degrees of freedom of each node.
    fn dofs_per_node(&self) -> usize {
        D
    }

    /// Number of degrees of freedom of the element.
    fn num_dofs(&self) -> usize {
        self.num_nodes() * self.dofs_per_node()
    }

    /// Global degree of freedom of a local degree of freedom.
    ///
    /// # Panics
    ///
    /// Panics if `local_dof >= self.num_dofs()`.
    fn degree_of_freedom(&self, local_dof: usize) -> usize {
        let n = self.dofs_per_node();
        self.node_ids()[local_dof / n] * n + local_dof % n
    }

    /// Shape function values at a point given in local coordinates.
    fn shape_functions(&self, local: &[f64; D]) -> Vec<f64>;

    /// Local coordinates of a global point, or `None` if the point is outside the element.
    ///
    /// `coords` holds the global coordinates of the element nodes.
    fn local_from_global(&self, coords: &[[f64; D]], global: &[f64; D]) -> Option<[f64; D]>;

    /// Global point of a local coordinate.
    fn global_from_local(&self, coords: &[[f64; D]], local: &[f64; D]) -> [f64; D] {
        let shape = self.shape_functions(local);
        let mut global = [0.0; D];
        for (n, x) in shape.iter().zip(coords.iter()) {
            for (g, c) in global.iter_mut().zip(x.iter()) {
                *g += n * c;
            }
        }
        global
    }

    /// Element stiffness matrix of size `num_dofs x num_dofs`.
    fn stiffness_matrix(&self, coords: &[[f64; D]]) -> Result<faer::Mat<f64>, MeshError>;
}

/// Tolerance used to accept points on the boundary of an element.
pub(crate) const INSIDE_TOLERANCE: f64 = 1e-8;

pub(crate) fn check_node_count(expected: usize, actual: usize) -> Result<(), MeshError> {
    if expected != actual {
        return Err(MeshError::WrongNodeCount { expected, actual });
    }
    Ok(())
}
