use std::collections::BTreeMap;

use faer::prelude::SpSolver;
use faer::sparse::linalg::CholeskyError;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use faer::Side;
use serde::{Deserialize, Serialize};

use crate::error::LinearSystemError;
use crate::system::{LinearSystem, SystemLayout};

/// Structure to define the conjugate gradient stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConjugateGradientParams {
    /// Relative residual `|b - Ax| / |b|` under which the solve is considered converged.
    pub tolerance: f64,
    /// Maximum number of iterations. Defaults to ten times the system order.
    pub max_iterations: Option<usize>,
}

impl Default for ConjugateGradientParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: None,
        }
    }
}

/// The method used by [`SparseLinearSystem`] to solve the system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SparseSolver {
    /// Direct sparse Cholesky factorization.
    #[default]
    Cholesky,
    /// Jacobi preconditioned conjugate gradient, warm-started from the current solution.
    ConjugateGradient(ConjugateGradientParams),
}

// Entries keyed by (col, row) so iteration follows the compressed column order.
type AssemblyMatrix = BTreeMap<(usize, usize), f64>;

/// A linear system with sparse matrices.
///
/// Matrices are accumulated entry by entry and compressed to a [`SparseColMat`] whenever
/// they take part in a product or a solve. The system matrix is assumed symmetric positive
/// definite, which is the case for a stiffness matrix once enough constraints are added.
///
/// Example:
///
/// ```
/// use femreg_linalg::{LinearSystem, SparseLinearSystem, SystemLayout};
///
/// let mut ls = SparseLinearSystem::default();
/// ls.set_layout(SystemLayout { order: 2, matrices: 1, vectors: 1, solutions: 1 });
/// ls.set_matrix_value(0, 0, 4.0, 0);
/// ls.set_matrix_value(1, 1, 1.0, 0);
/// ls.set_vector_value(0, 2.0, 0);
/// ls.set_vector_value(1, 3.0, 0);
/// ls.solve()?;
/// assert_eq!(ls.solution(0), vec![0.5, 3.0]);
/// # Ok::<(), femreg_linalg::LinearSystemError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SparseLinearSystem {
    layout: SystemLayout,
    solver: SparseSolver,
    matrices: Vec<AssemblyMatrix>,
    vectors: Vec<faer::Col<f64>>,
    solutions: Vec<faer::Col<f64>>,
    last_iterations: usize,
}

impl Default for SparseLinearSystem {
    fn default() -> Self {
        Self::new(SparseSolver::default())
    }
}

impl SparseLinearSystem {
    /// Create an empty system solved with the given method.
    pub fn new(solver: SparseSolver) -> Self {
        Self {
            layout: SystemLayout {
                order: 0,
                matrices: 0,
                vectors: 0,
                solutions: 0,
            },
            solver,
            matrices: Vec::new(),
            vectors: Vec::new(),
            solutions: Vec::new(),
            last_iterations: 0,
        }
    }

    /// Number of conjugate gradient iterations used by the last solve, zero for a direct solve.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    /// Number of stored entries of a matrix.
    pub fn num_non_zeros(&self, matrix_index: usize) -> usize {
        self.matrices[matrix_index].len()
    }

    /// Compress a stored matrix into a `faer` sparse column matrix.
    pub fn to_sparse_col_mat(&self, matrix_index: usize) -> SparseColMat<usize, f64> {
        let n = self.layout.order;
        let matrix = &self.matrices[matrix_index];

        // keys are unique and sorted by column then row, as compressed columns require
        let mut col_ptrs = vec![0usize; n + 1];
        let mut row_indices = Vec::with_capacity(matrix.len());
        let mut values = Vec::with_capacity(matrix.len());
        for (&(col, row), &value) in matrix.iter() {
            col_ptrs[col + 1] += 1;
            row_indices.push(row);
            values.push(value);
        }
        for col in 0..n {
            col_ptrs[col + 1] += col_ptrs[col];
        }

        SparseColMat::new(
            SymbolicSparseColMat::new_checked(n, n, col_ptrs, None, row_indices),
            values,
        )
    }

    fn check_entry(&self, row: usize, col: usize) {
        let n = self.layout.order;
        assert!(row < n && col < n, "entry ({row}, {col}) out of range for order {n}");
    }

    fn solve_cholesky(&mut self, a: &SparseColMat<usize, f64>) -> Result<(), LinearSystemError> {
        let llt = a.sp_cholesky(Side::Lower).map_err(|e| match e {
            CholeskyError::NotPositiveDefinite => LinearSystemError::NotPositiveDefinite,
            _ => LinearSystemError::Singular,
        })?;
        let x = llt.solve(self.vectors[0].as_ref());

        if x.iter().any(|v| !v.is_finite()) {
            return Err(LinearSystemError::Singular);
        }

        self.solutions[0] = x;
        self.last_iterations = 0;

        Ok(())
    }

    fn solve_conjugate_gradient(
        &mut self,
        a: &SparseColMat<usize, f64>,
        params: ConjugateGradientParams,
    ) -> Result<(), LinearSystemError> {
        let n = self.layout.order;
        let b = &self.vectors[0];
        let max_iterations = params.max_iterations.unwrap_or(10 * n);

        let b_norm = b.norm_l2();
        if b_norm == 0.0 {
            self.solutions[0] = faer::Col::zeros(n);
            self.last_iterations = 0;
            return Ok(());
        }

        // jacobi preconditioner, rows without diagonal fall back to identity
        let inv_diag = faer::Col::<f64>::from_fn(n, |i| {
            match self.matrices[0].get(&(i, i)) {
                Some(&d) if d != 0.0 => 1.0 / d,
                _ => 1.0,
            }
        });

        let mut x = self.solutions[0].clone();
        let ax = a * &x;
        let mut r = b - &ax;
        let mut z = faer::Col::<f64>::from_fn(n, |i| r.read(i) * inv_diag.read(i));
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        let mut residual = r.norm_l2() / b_norm;
        let mut iterations = 0;

        while residual > params.tolerance {
            if iterations >= max_iterations {
                return Err(LinearSystemError::NotConverged {
                    iterations,
                    residual,
                });
            }

            let ap = a * &p;
            let curvature = dot(&p, &ap);
            if curvature <= 0.0 || !curvature.is_finite() {
                return Err(LinearSystemError::NotPositiveDefinite);
            }

            let alpha = rz / curvature;
            for i in 0..n {
                x.write(i, x.read(i) + alpha * p.read(i));
                r.write(i, r.read(i) - alpha * ap.read(i));
                z.write(i, r.read(i) * inv_diag.read(i));
            }

            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for i in 0..n {
                p.write(i, z.read(i) + beta * p.read(i));
            }

            residual = r.norm_l2() / b_norm;
            iterations += 1;
        }

        log::debug!(
            "Conjugate gradient converged in {} iterations (residual {:e})",
            iterations,
            residual
        );

        self.solutions[0] = x;
        self.last_iterations = iterations;

        Ok(())
    }
}

fn dot(a: &faer::Col<f64>, b: &faer::Col<f64>) -> f64 {
    a.as_ref().transpose() * b.as_ref()
}

impl LinearSystem for SparseLinearSystem {
    fn set_layout(&mut self, layout: SystemLayout) {
        let n = layout.order;
        self.layout = layout;
        self.matrices = vec![BTreeMap::new(); layout.matrices];
        self.vectors = (0..layout.vectors).map(|_| faer::Col::zeros(n)).collect();
        self.solutions = (0..layout.solutions).map(|_| faer::Col::zeros(n)).collect();
        self.last_iterations = 0;
    }

    fn layout(&self) -> SystemLayout {
        self.layout
    }

    fn initialize_matrix(&mut self, matrix_index: usize) {
        self.matrices[matrix_index].clear();
    }

    fn initialize_vector(&mut self, vector_index: usize) {
        self.vectors[vector_index] = faer::Col::zeros(self.layout.order);
    }

    fn initialize_solution(&mut self, solution_index: usize) {
        self.solutions[solution_index] = faer::Col::zeros(self.layout.order);
    }

    fn matrix_value(&self, row: usize, col: usize, matrix_index: usize) -> f64 {
        self.check_entry(row, col);
        self.matrices[matrix_index]
            .get(&(col, row))
            .copied()
            .unwrap_or(0.0)
    }

    fn set_matrix_value(&mut self, row: usize, col: usize, value: f64, matrix_index: usize) {
        self.check_entry(row, col);
        let matrix = &mut self.matrices[matrix_index];
        if value == 0.0 {
            matrix.remove(&(col, row));
        } else {
            matrix.insert((col, row), value);
        }
    }

    fn add_matrix_value(&mut self, row: usize, col: usize, value: f64, matrix_index: usize) {
        self.check_entry(row, col);
        if value == 0.0 {
            return;
        }
        *self.matrices[matrix_index].entry((col, row)).or_insert(0.0) += value;
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
        self.matrices[matrix_index]
            .values_mut()
            .for_each(|v| *v *= scale);
    }

    fn copy_matrix(&mut self, src: usize, dst: usize) {
        self.matrices[dst] = self.matrices[src].clone();
    }

    fn add_matrix_matrix(&mut self, dst: usize, src: usize) {
        let src_entries = self.matrices[src].clone();
        let dst_matrix = &mut self.matrices[dst];
        for (key, v) in src_entries {
            *dst_matrix.entry(key).or_insert(0.0) += v;
        }
    }

    fn copy_vector(&mut self, src: usize, dst: usize) {
        self.vectors[dst] = self.vectors[src].clone();
    }

    fn add_vector_vector(&mut self, dst: usize, src: usize) {
        self.vectors[dst] = &self.vectors[dst] + &self.vectors[src];
    }

    fn multiply_matrix_solution(&mut self, dst: usize, matrix_index: usize, solution_index: usize) {
        let a = self.to_sparse_col_mat(matrix_index);
        self.vectors[dst] = &a * &self.solutions[solution_index];
    }

    fn solve(&mut self) -> Result<(), LinearSystemError> {
        if self.layout.order == 0 {
            return Ok(());
        }

        // NOTE: matrix, vector and solution with index zero form the system
        let a = self.to_sparse_col_mat(0);
        match self.solver {
            SparseSolver::Cholesky => self.solve_cholesky(&a),
            SparseSolver::ConjugateGradient(params) => self.solve_conjugate_gradient(&a, params),
        }
    }
}
