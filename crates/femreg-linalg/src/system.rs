use serde::{Deserialize, Serialize};

use crate::error::LinearSystemError;

/// Number and size of the matrices, vectors and solutions held by a linear system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLayout {
    /// The order of the system, i.e. the number of unknowns.
    pub order: usize,
    /// Number of square matrices of size `order x order`.
    pub matrices: usize,
    /// Number of right-hand side vectors of length `order`.
    pub vectors: usize,
    /// Number of solution vectors of length `order`.
    pub solutions: usize,
}

/// A linear system of equations with several indexed matrices, vectors and solutions.
///
/// Every backend follows the same convention for [`LinearSystem::solve`]: the matrix with
/// index zero and the vector with index zero form the system, and the result is written
/// to the solution with index zero.
///
/// # Panics
///
/// Accessors panic if a matrix, vector or solution index is outside the current
/// [`SystemLayout`], or if a row/column is not smaller than the system order.
pub trait LinearSystem {
    /// Reallocate the storage for a new layout. All values are reset to zero.
    fn set_layout(&mut self, layout: SystemLayout);

    /// The current layout of the storage.
    fn layout(&self) -> SystemLayout;

    /// The order of the system.
    fn system_order(&self) -> usize {
        self.layout().order
    }

    /// Reset a matrix to zero.
    fn initialize_matrix(&mut self, matrix_index: usize);

    /// Reset a vector to zero.
    fn initialize_vector(&mut self, vector_index: usize);

    /// Reset a solution to zero.
    fn initialize_solution(&mut self, solution_index: usize);

    /// Read a matrix entry.
    fn matrix_value(&self, row: usize, col: usize, matrix_index: usize) -> f64;

    /// Overwrite a matrix entry.
    fn set_matrix_value(&mut self, row: usize, col: usize, value: f64, matrix_index: usize);

    /// Accumulate into a matrix entry.
    fn add_matrix_value(&mut self, row: usize, col: usize, value: f64, matrix_index: usize);

    /// Read a vector entry.
    fn vector_value(&self, row: usize, vector_index: usize) -> f64;

    /// Overwrite a vector entry.
    fn set_vector_value(&mut self, row: usize, value: f64, vector_index: usize);

    /// Accumulate into a vector entry.
    fn add_vector_value(&mut self, row: usize, value: f64, vector_index: usize);

    /// Read a solution entry.
    fn solution_value(&self, row: usize, solution_index: usize) -> f64;

    /// Overwrite a solution entry.
    fn set_solution_value(&mut self, row: usize, value: f64, solution_index: usize);

    /// Multiply every entry of a matrix by `scale`.
    fn scale_matrix(&mut self, scale: f64, matrix_index: usize);

    /// Copy the matrix `src` into the matrix `dst`.
    fn copy_matrix(&mut self, src: usize, dst: usize);

    /// Compute `dst += src` on matrices.
    fn add_matrix_matrix(&mut self, dst: usize, src: usize);

    /// Copy the vector `src` into the vector `dst`.
    fn copy_vector(&mut self, src: usize, dst: usize);

    /// Compute `dst += src` on vectors.
    fn add_vector_vector(&mut self, dst: usize, src: usize);

    /// Compute `vector[dst] = matrix[matrix_index] * solution[solution_index]`.
    fn multiply_matrix_solution(&mut self, dst: usize, matrix_index: usize, solution_index: usize);

    /// Solve `matrix[0] * solution[0] = vector[0]`, blocking until the solution is available.
    fn solve(&mut self) -> Result<(), LinearSystemError>;

    /// Copy a solution out of the system.
    fn solution(&self, solution_index: usize) -> Vec<f64> {
        (0..self.system_order())
            .map(|row| self.solution_value(row, solution_index))
            .collect()
    }
}
