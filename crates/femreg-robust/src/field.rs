use femreg_linalg::LinearSystem;

use crate::assembly::{element_dofs, SOLUTION};
use crate::binder::locate_point;
use crate::error::RobustSolverError;
use crate::grid::{GridGeometry, InterpolationGrid};
use crate::solver::RobustSolver;

impl<const D: usize, L: LinearSystem> RobustSolver<'_, D, L> {
    /// Index of the element containing `point`.
    ///
    /// The interpolation grid is queried first, falling back to testing every element.
    pub fn element_at_point(&self, point: &[f64; D]) -> Result<Option<usize>, RobustSolverError> {
        Ok(self.locate(point)?.map(|(element, _)| element))
    }

    /// Displacement at `point` interpolated from the nodal solution, `None` outside the mesh.
    pub fn displacement_at(&self, point: &[f64; D]) -> Result<Option<[f64; D]>, RobustSolverError> {
        match self.locate(point)? {
            Some((element, local)) => Ok(Some(self.interpolate(element, &local)?)),
            None => Ok(None),
        }
    }

    /// Sample the displacement on every cell of a regular grid.
    ///
    /// Values are stored with the first axis varying fastest, `None` where the cell center is
    /// not covered by an element whose bounding box fits the grid.
    pub fn sample_displacement_field(
        &self,
        geometry: &GridGeometry<D>,
    ) -> Result<Vec<Option<[f64; D]>>, RobustSolverError> {
        let grid = InterpolationGrid::build(geometry, self.mesh)?;
        let transform = grid.transform();

        geometry
            .region
            .indices()
            .map(|index| -> Result<Option<[f64; D]>, RobustSolverError> {
                let Some(element) = grid.element_at_index(&index) else {
                    return Ok(None);
                };
                let point = transform.index_to_point(&index);
                let coords = self.mesh.element_coordinates(element)?;
                match self.mesh.elements()[element].local_from_global(&coords, &point) {
                    Some(local) => Ok(Some(self.interpolate(element, &local)?)),
                    None => Ok(None),
                }
            })
            .collect()
    }

    /// Node coordinates moved by the current nodal displacements.
    pub fn deformed_nodes(&self) -> Vec<[f64; D]> {
        self.mesh
            .nodes()
            .iter()
            .zip(self.nodal_displacements())
            .map(|(x, u)| std::array::from_fn(|d| x[d] + u[d]))
            .collect()
    }

    fn locate(&self, point: &[f64; D]) -> Result<Option<(usize, [f64; D])>, RobustSolverError> {
        match locate_point(self.mesh, Some(&self.grid), point)? {
            Some(found) => Ok(Some(found)),
            None => locate_point(self.mesh, None, point),
        }
    }

    fn interpolate(&self, element: usize, local: &[f64; D]) -> Result<[f64; D], RobustSolverError> {
        let element = self.mesh.elements()[element].as_ref();
        let dofs = element_dofs(element, self.mesh.num_dofs())?;

        let mut u = [0.0; D];
        for (k, s) in element.shape_functions(local).iter().enumerate() {
            for (c, v) in u.iter_mut().enumerate() {
                *v += s * self.ls.solution_value(dofs[k * D + c], SOLUTION);
            }
        }
        Ok(u)
    }
}
