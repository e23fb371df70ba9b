use faer::prelude::SpSolver;

use crate::error::LinearSystemError;
use crate::system::{LinearSystem, SystemLayout};

/// A linear system stored in dense `faer` matrices and solved with a partial pivoting LU.
///
/// Example:
///
/// ```
/// use femreg_linalg::{DenseLinearSystem, LinearSystem, SystemLayout};
///
/// let mut ls = DenseLinearSystem::default();
/// ls.set_layout(SystemLayout { order: 2, matrices: 1, vectors: 1, solutions: 1 });
/// ls.set_matrix_value(0, 0, 2.0, 0);
/// ls.set_matrix_value(1, 1, 4.0, 0);
/// ls.set_vector_value(0, 2.0, 0);
/// ls.set_vector_value(1, 2.0, 0);
/// ls.solve()?;
/// assert_eq!(ls.solution(0), vec![1.0, 0.5]);
/// # Ok::<(), femreg_linalg::LinearSystemError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DenseLinearSystem {
    layout: SystemLayout,
    matrices: Vec<faer::Mat<f64>>,
    vectors: Vec<faer::Col<f64>>,
    solutions: Vec<faer::Col<f64>>,
}

impl Default for DenseLinearSystem {
    fn default() -> Self {
        Self::new(SystemLayout {
            order: 0,
            matrices: 0,
            vectors: 0,
            solutions: 0,
        })
    }
}

impl DenseLinearSystem {
    /// Create a zero-initialized system with the given layout.
    pub fn new(layout: SystemLayout) -> Self {
        let n = layout.order;
        Self {
            layout,
            matrices: (0..layout.matrices).map(|_| faer::Mat::zeros(n, n)).collect(),
            vectors: (0..layout.vectors).map(|_| faer::Col::zeros(n)).collect(),
            solutions: (0..layout.solutions).map(|_| faer::Col::zeros(n)).collect(),
        }
    }
}

impl LinearSystem for DenseLinearSystem {
    fn set_layout(&mut self, layout: SystemLayout) {
        *self = Self::new(layout);
    }

    fn layout(&self) -> SystemLayout {
        self.layout
    }

    fn initialize_matrix(&mut self, matrix_index: usize) {
        let n = self.layout.order;
        self.matrices[matrix_index] = faer::Mat::zeros(n, n);
    }

    fn initialize_vector(&mut self, vector_index: usize) {
        self.vectors[vector_index] = faer::Col::zeros(self.layout.order);
    }

    fn initialize_solution(&mut self, solution_index: usize) {
        self.solutions[solution_index] = faer::Col::zeros(self.layout.order);
    }

    fn matrix_value(&self, row: usize, col: usize, matrix_index: usize) -> f64 {
        self.matrices[matrix_index].read(row, col)
    }

    fn set_matrix_value(&mut self, row: usize, col: usize, value: f64, matrix_index: usize) {
        self.matrices[matrix_index].write(row, col, value);
    }

    fn add_matrix_value(&mut self, row: usize, col: usize, value: f64, matrix_index: usize) {
        let m = &mut self.matrices[matrix_index];
        m.write(row, col, m.read(row, col) + value);
    }

    fn vector_value(&self, row: usize, vector_index: usize) -> f64 {
        self.vectors[vector_index].read(row)
    }

    fn set_vector_value(&mut self, row: usize, value: f64, vector_index: usize) {
        self.vectors[vector_index].write(row, value);
    }

    fn add_vector_value(&mut self, row: usize, value: f64, vector_index: usize) {
        let v = &mut self.vectors[vector_index];
        v.write(row, v.read(row) + value);
    }

    fn solution_value(&self, row: usize, solution_index: usize) -> f64 {
        self.solutions[solution_index].read(row)
    }

    fn set_solution_value(&mut self, row: usize, value: f64, solution_index: usize) {
        self.solutions[solution_index].write(row, value);
    }

    fn scale_matrix(&mut self, scale: f64, matrix_index: usize) {
        let m = &mut self.matrices[matrix_index];
        for j in 0..m.ncols() {
            for i in 0..m.nrows() {
                m.write(i, j, m.read(i, j) * scale);
            }
        }
    }

    fn copy_matrix(&mut self, src: usize, dst: usize) {
        self.matrices[dst] = self.matrices[src].clone();
    }

    fn add_matrix_matrix(&mut self, dst: usize, src: usize) {
        self.matrices[dst] = &self.matrices[dst] + &self.matrices[src];
    }

    fn copy_vector(&mut self, src: usize, dst: usize) {
        self.vectors[dst] = self.vectors[src].clone();
    }

    fn add_vector_vector(&mut self, dst: usize, src: usize) {
        self.vectors[dst] = &self.vectors[dst] + &self.vectors[src];
    }

    fn multiply_matrix_solution(&mut self, dst: usize, matrix_index: usize, solution_index: usize) {
        self.vectors[dst] = &self.matrices[matrix_index] * &self.solutions[solution_index];
    }

    fn solve(&mut self) -> Result<(), LinearSystemError> {
        if self.layout.order == 0 {
            return Ok(());
        }

        // NOTE: matrix, vector and solution with index zero form the system
        let lu = self.matrices[0].partial_piv_lu();
        let x = lu.solve(self.vectors[0].as_ref());

        if x.iter().any(|v| !v.is_finite()) {
            return Err(LinearSystemError::Singular);
        }

        self.solutions[0] = x;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layout(order: usize) -> SystemLayout {
        SystemLayout {
            order,
            matrices: 2,
            vectors: 2,
            solutions: 1,
        }
    }

    #[test]
    fn test_dense_solve_spd() -> Result<(), LinearSystemError> {
        let mut ls = DenseLinearSystem::new(layout(3));
        let a = [[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        for (i, row) in a.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                ls.set_matrix_value(i, j, *v, 0);
            }
        }
        let x_true = [1.0, -2.0, 0.5];
        for (i, row) in a.iter().enumerate() {
            let b: f64 = row.iter().zip(x_true.iter()).map(|(a, x)| a * x).sum();
            ls.set_vector_value(i, b, 0);
        }

        ls.solve()?;

        for (i, x) in x_true.iter().enumerate() {
            assert_relative_eq!(ls.solution_value(i, 0), *x, epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_dense_singular() {
        let mut ls = DenseLinearSystem::new(layout(2));
        ls.set_matrix_value(0, 0, 1.0, 0);
        ls.set_matrix_value(0, 1, 1.0, 0);
        ls.set_matrix_value(1, 0, 1.0, 0);
        ls.set_matrix_value(1, 1, 1.0, 0);
        ls.set_vector_value(0, 1.0, 0);
        ls.set_vector_value(1, 2.0, 0);
        assert_eq!(ls.solve(), Err(LinearSystemError::Singular));
    }

    #[test]
    fn test_dense_matrix_ops() {
        let mut ls = DenseLinearSystem::new(layout(2));
        ls.set_matrix_value(0, 0, 1.0, 1);
        ls.add_matrix_value(0, 1, 2.0, 1);
        ls.add_matrix_value(0, 1, 2.0, 1);
        ls.set_matrix_value(1, 1, 3.0, 1);

        ls.scale_matrix(2.0, 1);
        assert_eq!(ls.matrix_value(0, 1, 1), 8.0);

        ls.copy_matrix(1, 0);
        ls.add_matrix_matrix(0, 1);
        assert_eq!(ls.matrix_value(0, 0, 0), 4.0);
        assert_eq!(ls.matrix_value(0, 1, 0), 16.0);
        assert_eq!(ls.matrix_value(1, 0, 0), 0.0);
        assert_eq!(ls.matrix_value(1, 1, 0), 12.0);

        ls.initialize_matrix(0);
        assert_eq!(ls.matrix_value(1, 1, 0), 0.0);
        assert_eq!(ls.matrix_value(1, 1, 1), 6.0);
    }

    #[test]
    fn test_dense_vector_ops() {
        let mut ls = DenseLinearSystem::new(layout(2));
        ls.set_matrix_value(0, 0, 2.0, 1);
        ls.set_matrix_value(0, 1, 1.0, 1);
        ls.set_matrix_value(1, 1, 3.0, 1);
        ls.set_solution_value(0, 1.0, 0);
        ls.set_solution_value(1, 2.0, 0);

        ls.multiply_matrix_solution(1, 1, 0);
        assert_eq!(ls.vector_value(0, 1), 4.0);
        assert_eq!(ls.vector_value(1, 1), 6.0);

        ls.add_vector_value(0, 1.0, 0);
        ls.add_vector_vector(0, 1);
        assert_eq!(ls.vector_value(0, 0), 5.0);

        ls.copy_vector(0, 1);
        assert_eq!(ls.vector_value(0, 1), 5.0);
        assert_eq!(ls.vector_value(1, 1), 6.0);

        assert_eq!(ls.solution(0), vec![1.0, 2.0]);
    }
}
