use femreg_linalg::LinearSystem;
use femreg_mesh::Mesh;

use crate::assembly::{self, SOLUTION};
use crate::binder::bind_landmarks;
use crate::error::RobustSolverError;
use crate::grid::{GridGeometry, InterpolationGrid};
use crate::landmark::Landmark;
use crate::params::RobustSolverParams;
use crate::tensor::{landmark_tensor, ponderation, weighted_error_norm};

/// Robust finite-element registration driven by noisy landmarks.
///
/// The solver computes nodal displacements that balance the mesh elasticity against the
/// landmark constraints. It alternates solves with rejection rounds that discard the
/// landmarks whose residual disagrees most with the current deformation, then refines the
/// solution with a number of approximation steps, each one starting from the previously
/// deformed configuration.
///
/// Example:
///
/// ```
/// use femreg_linalg::DenseLinearSystem;
/// use femreg_mesh::{LinearElasticMaterial, Mesh};
/// use femreg_robust::{GridGeometry, Landmark, RobustSolver, RobustSolverParams};
///
/// let material = LinearElasticMaterial::default();
/// let mesh = Mesh::rectilinear_quads([0.0, 0.0], [1.0, 1.0], [2, 2], material)?;
/// let landmarks = vec![
///     Landmark::new([0.5, 0.5], [0.1, 0.0], 1.0),
///     Landmark::new([1.5, 1.5], [0.1, 0.0], 1.0),
///     Landmark::new([0.5, 1.5], [0.1, 0.0], 1.0),
///     Landmark::new([1.5, 0.5], [0.1, 0.0], 1.0),
/// ];
/// let geometry = GridGeometry::axis_aligned([5, 5], [0.0, 0.0], [0.5, 0.5]);
///
/// let mut solver =
///     RobustSolver::initialize(&mesh, landmarks, &geometry, true, DenseLinearSystem::default())?;
/// let params = RobustSolverParams { outlier_rejection_steps: 0, ..Default::default() };
/// let displacements = solver.run_solver(&params)?;
/// assert_eq!(displacements.len(), 9);
/// # Ok::<(), femreg_robust::RobustSolverError>(())
/// ```
#[derive(Debug)]
pub struct RobustSolver<'a, const D: usize, L: LinearSystem> {
    pub(crate) mesh: &'a Mesh<D>,
    pub(crate) ls: L,
    pub(crate) grid: InterpolationGrid<D>,
    landmarks: Vec<Landmark<D>>,
    rejected: Vec<Landmark<D>>,
    out_of_mesh: Vec<Landmark<D>>,
    iterations: usize,
    ponderation_history: Vec<f64>,
}

impl<'a, const D: usize, L: LinearSystem> RobustSolver<'a, D, L> {
    /// Prepare a registration of `mesh` driven by `landmarks`.
    ///
    /// Builds the interpolation grid from `geometry` and binds every landmark to its
    /// containing element, through the grid when `use_interpolation_grid` is set or by
    /// testing every element otherwise. Landmarks outside the mesh are removed from the
    /// working set. The linear system is resized for the mesh degrees of freedom.
    pub fn initialize(
        mesh: &'a Mesh<D>,
        landmarks: Vec<Landmark<D>>,
        geometry: &GridGeometry<D>,
        use_interpolation_grid: bool,
        mut ls: L,
    ) -> Result<Self, RobustSolverError> {
        mesh.validate()?;
        ls.set_layout(assembly::system_layout(mesh.num_dofs()));

        let grid = InterpolationGrid::build(geometry, mesh)?;
        log::debug!(
            "interpolation grid built, {} cells reference an element",
            grid.num_located_cells()
        );

        let (landmarks, out_of_mesh) =
            bind_landmarks(mesh, use_interpolation_grid.then_some(&grid), landmarks)?;
        log::debug!("{} landmarks bound to the mesh", landmarks.len());

        Ok(Self {
            mesh,
            ls,
            grid,
            landmarks,
            rejected: Vec::new(),
            out_of_mesh,
            iterations: 0,
            ponderation_history: Vec::new(),
        })
    }

    /// Run the registration and return the displacement of every mesh node.
    ///
    /// The system is assembled from scratch on each call, over the landmarks still active.
    pub fn run_solver(
        &mut self,
        params: &RobustSolverParams,
    ) -> Result<Vec<[f64; D]>, RobustSolverError> {
        params.validate()?;
        self.reset();

        let trade_off = params.trade_off_image_mesh_energy;
        let initial = self.ponderation()?;

        assembly::assemble_mesh_stiffness(&mut self.ls, self.mesh)?;
        self.update_landmark_tensors()?;
        assembly::assemble_landmark_stiffness(
            &mut self.ls,
            self.mesh,
            &self.landmarks,
            initial,
            trade_off,
        )?;
        assembly::combine_stiffness(&mut self.ls);
        assembly::assemble_landmark_force(
            &mut self.ls,
            self.mesh,
            &self.landmarks,
            initial,
            trade_off,
        )?;
        self.ponderation_history.push(initial);

        if params.outlier_rejection_steps != 0 {
            self.solve_with_outlier_rejection(params)?;
        }
        self.solve_without_outlier_rejection(params)?;

        log::info!(
            "registration done after {} iterations, {} landmarks active, {} rejected",
            self.iterations,
            self.landmarks.len(),
            self.rejected.len()
        );

        Ok(self.nodal_displacements())
    }

    fn reset(&mut self) {
        let layout = self.ls.layout();
        (0..layout.matrices).for_each(|i| self.ls.initialize_matrix(i));
        (0..layout.vectors).for_each(|i| self.ls.initialize_vector(i));
        (0..layout.solutions).for_each(|i| self.ls.initialize_solution(i));
        self.iterations = 0;
        self.ponderation_history.clear();
    }

    fn solve_with_outlier_rejection(
        &mut self,
        params: &RobustSolverParams,
    ) -> Result<(), RobustSolverError> {
        let trade_off = params.trade_off_image_mesh_energy;
        let rejected_per_step = params.rejected_per_step(self.landmarks.len());
        log::debug!("rejecting {} landmarks per step", rejected_per_step);

        for round in 0..params.outlier_rejection_steps {
            let old_ponderation = self.ponderation()?;

            assembly::add_external_force(&mut self.ls);
            self.ls.solve()?;
            log::debug!("system solved");

            self.update_landmark_errors(params.tolerance_to_largest_displacement)?;

            // worst landmarks first
            let k = rejected_per_step.min(self.landmarks.len());
            if k > 0 {
                self.landmarks.select_nth_unstable_by(k - 1, |a, b| {
                    b.error_norm().total_cmp(&a.error_norm())
                });
                self.landmarks[..k].iter_mut().for_each(|l| l.mark_outlier());
            }

            assembly::remove_outlier_stiffness(
                &mut self.ls,
                self.mesh,
                &self.landmarks,
                old_ponderation,
                trade_off,
            )?;
            log::debug!("outlier contributions removed");
            self.rejected.extend(self.landmarks.drain(..k));

            let new_ponderation = self.ponderation()?;
            assembly::rescale_landmark_stiffness(&mut self.ls, old_ponderation, new_ponderation);
            assembly::combine_stiffness(&mut self.ls);
            assembly::assemble_landmark_force(
                &mut self.ls,
                self.mesh,
                &self.landmarks,
                new_ponderation,
                trade_off,
            )?;
            log::debug!("matrix rescaled by {}", new_ponderation / old_ponderation);

            assembly::add_external_force(&mut self.ls);
            self.ls.solve()?;
            assembly::update_external_force(&mut self.ls);

            self.ponderation_history.push(new_ponderation);
            self.iterations += 1;
            log::debug!(
                "rejection round {} done, {} landmarks left, ponderation {}",
                round,
                self.landmarks.len(),
                new_ponderation
            );
        }

        Ok(())
    }

    fn solve_without_outlier_rejection(
        &mut self,
        params: &RobustSolverParams,
    ) -> Result<(), RobustSolverError> {
        for step in 0..params.approximation_steps {
            assembly::add_external_force(&mut self.ls);
            self.ls.solve()?;
            assembly::update_external_force(&mut self.ls);

            self.iterations += 1;
            log::debug!("approximation step {} done", step);
        }
        Ok(())
    }

    fn update_landmark_tensors(&mut self) -> Result<(), RobustSolverError> {
        for (index, landmark) in self.landmarks.iter_mut().enumerate() {
            if landmark.is_outlier() {
                continue;
            }
            let dofs = assembly::landmark_dofs(self.mesh, landmark, index)?;
            let tensor = landmark_tensor(
                &self.ls,
                &dofs,
                landmark.shape(),
                landmark.structure_tensor(),
            );
            landmark.set_landmark_tensor(tensor);
        }
        Ok(())
    }

    fn update_landmark_errors(&mut self, lambda: f64) -> Result<(), RobustSolverError> {
        for (index, landmark) in self.landmarks.iter_mut().enumerate() {
            if landmark.is_outlier() {
                continue;
            }
            let dofs = assembly::landmark_dofs(self.mesh, landmark, index)?;

            let mut simulated = [0.0; D];
            for (k, s) in landmark.shape().iter().enumerate() {
                for (c, v) in simulated.iter_mut().enumerate() {
                    *v += s * self.ls.solution_value(dofs[k * D + c], SOLUTION);
                }
            }

            let error_norm = weighted_error_norm(
                landmark.real_displacement(),
                &simulated,
                landmark.confidence(),
                landmark.structure_tensor(),
                lambda,
            );
            landmark.set_error(simulated, error_norm);
        }
        Ok(())
    }

    /// The current ponderation, mesh nodes over active landmarks.
    pub fn ponderation(&self) -> Result<f64, RobustSolverError> {
        ponderation(self.mesh.num_nodes(), self.landmarks.len())
    }

    /// The mesh being registered.
    pub fn mesh(&self) -> &Mesh<D> {
        self.mesh
    }

    /// The linear system holding the assembled matrices and the solution.
    pub fn linear_system(&self) -> &L {
        &self.ls
    }

    /// The interpolation grid built at initialization.
    pub fn interpolation_grid(&self) -> &InterpolationGrid<D> {
        &self.grid
    }

    /// The active landmarks.
    pub fn landmarks(&self) -> &[Landmark<D>] {
        &self.landmarks
    }

    /// The landmarks rejected as outliers, in rejection order.
    pub fn rejected_landmarks(&self) -> &[Landmark<D>] {
        &self.rejected
    }

    /// The landmarks discarded at initialization for lying outside of the mesh.
    pub fn out_of_mesh_landmarks(&self) -> &[Landmark<D>] {
        &self.out_of_mesh
    }

    /// Number of rejection rounds plus approximation steps performed by the last run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The initial ponderation of the last run followed by its value after each round.
    pub fn ponderation_history(&self) -> &[f64] {
        &self.ponderation_history
    }

    /// The current displacement of every mesh node.
    pub fn nodal_displacements(&self) -> Vec<[f64; D]> {
        (0..self.mesh.num_nodes())
            .map(|node| std::array::from_fn(|c| self.ls.solution_value(node * D + c, SOLUTION)))
            .collect()
    }
}
