use femreg_mesh::Mesh;

use crate::error::RobustSolverError;
use crate::grid::InterpolationGrid;
use crate::landmark::Landmark;

/// Find the element containing `point` and its local coordinates in that element.
///
/// With a grid, the element stored in the nearest cell is tried first. When there is no
/// grid, or the stored element does not contain the point, every element is tested in mesh
/// order and the first hit wins.
pub fn locate_point<const D: usize>(
    mesh: &Mesh<D>,
    grid: Option<&InterpolationGrid<D>>,
    point: &[f64; D],
) -> Result<Option<(usize, [f64; D])>, RobustSolverError> {
    if let Some(grid) = grid {
        let Some(element_index) = grid.locate(point) else {
            return Ok(None);
        };
        let coords = mesh.element_coordinates(element_index)?;
        if let Some(local) = mesh.elements()[element_index].local_from_global(&coords, point) {
            return Ok(Some((element_index, local)));
        }
    }

    for (element_index, element) in mesh.elements().iter().enumerate() {
        let coords = mesh.element_coordinates(element_index)?;
        if let Some(local) = element.local_from_global(&coords, point) {
            return Ok(Some((element_index, local)));
        }
    }
    Ok(None)
}

/// Bind every landmark to its containing element and cache its shape function values.
///
/// Returns the bound landmarks and, separately, the landmarks that fall outside of the mesh
/// (flagged with [`Landmark::is_out_of_mesh`]).
pub fn bind_landmarks<const D: usize>(
    mesh: &Mesh<D>,
    grid: Option<&InterpolationGrid<D>>,
    landmarks: Vec<Landmark<D>>,
) -> Result<(Vec<Landmark<D>>, Vec<Landmark<D>>), RobustSolverError> {
    let mut bound = Vec::with_capacity(landmarks.len());
    let mut out_of_mesh = Vec::new();

    for mut landmark in landmarks {
        landmark.validate()?;
        match locate_point(mesh, grid, landmark.source())? {
            Some((element_index, local)) => {
                let shape = mesh.elements()[element_index].shape_functions(&local);
                landmark.bind(element_index, shape);
                bound.push(landmark);
            }
            None => {
                landmark.mark_out_of_mesh();
                out_of_mesh.push(landmark);
            }
        }
    }

    if !out_of_mesh.is_empty() {
        log::warn!(
            "{} of {} landmarks lie outside of the mesh and are discarded",
            out_of_mesh.len(),
            bound.len() + out_of_mesh.len()
        );
    }

    Ok((bound, out_of_mesh))
}
