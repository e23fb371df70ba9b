//! Assembly of the mesh and landmark contributions into the linear system.
//!
//! The system holds three matrices, three vectors and one solution:
//!
//! | slot | content |
//! |---|---|
//! | matrix 0 | system matrix, mesh plus landmark stiffness |
//! | matrix 1 | mesh stiffness, assembled once |
//! | matrix 2 | landmark stiffness, updated as landmarks are rejected |
//! | vector 0 | right hand side, landmark force plus external force |
//! | vector 1 | landmark force |
//! | vector 2 | external force, mesh stiffness times the last solution |
//! | solution 0 | nodal displacements |
//!
//! The ponderation is passed explicitly to every function that depends on it.

use femreg_linalg::{LinearSystem, SystemLayout};
use femreg_mesh::{Element, Mesh};

use crate::error::RobustSolverError;
use crate::landmark::Landmark;
use crate::tensor::mat_vec;

/// Slot of the system matrix.
pub const STIFFNESS_MATRIX: usize = 0;
/// Slot of the mesh stiffness matrix.
pub const MESH_STIFFNESS_MATRIX: usize = 1;
/// Slot of the landmark stiffness matrix.
pub const LANDMARK_STIFFNESS_MATRIX: usize = 2;
/// Slot of the right hand side.
pub const FORCE_VECTOR: usize = 0;
/// Slot of the landmark force.
pub const LANDMARK_FORCE_VECTOR: usize = 1;
/// Slot of the external force.
pub const EXTERNAL_FORCE_VECTOR: usize = 2;
/// Slot of the nodal displacements.
pub const SOLUTION: usize = 0;

/// The layout of a system with `num_dofs` unknowns.
pub fn system_layout(num_dofs: usize) -> SystemLayout {
    SystemLayout {
        order: num_dofs,
        matrices: 3,
        vectors: 3,
        solutions: 1,
    }
}

/// Global degrees of freedom of an element, checked against the system size `ngfn`.
pub fn element_dofs<const D: usize>(
    element: &dyn Element<D>,
    ngfn: usize,
) -> Result<Vec<usize>, RobustSolverError> {
    (0..element.num_dofs())
        .map(|local| {
            let dof = element.degree_of_freedom(local);
            if dof >= ngfn {
                return Err(RobustSolverError::DofOutOfRange { dof, ngfn });
            }
            Ok(dof)
        })
        .collect()
}

/// Global degrees of freedom of the element a landmark is bound to.
///
/// `index` is the position of the landmark in its set, reported on failure.
pub fn landmark_dofs<const D: usize>(
    mesh: &Mesh<D>,
    landmark: &Landmark<D>,
    index: usize,
) -> Result<Vec<usize>, RobustSolverError> {
    let element = landmark
        .element()
        .and_then(|e| mesh.element(e))
        .filter(|e| e.num_nodes() == landmark.shape().len())
        .ok_or(RobustSolverError::UnboundLandmark { index })?;
    element_dofs(element, mesh.num_dofs())
}

/// Accumulate the element stiffness matrices into the mesh stiffness matrix.
pub fn assemble_mesh_stiffness<const D: usize, L: LinearSystem>(
    ls: &mut L,
    mesh: &Mesh<D>,
) -> Result<(), RobustSolverError> {
    let ngfn = mesh.num_dofs();
    if ngfn == 0 {
        return Ok(());
    }

    for (element_index, element) in mesh.elements().iter().enumerate() {
        let dofs = element_dofs(element.as_ref(), ngfn)?;
        let ke = element.stiffness_matrix(&mesh.element_coordinates(element_index)?)?;

        for (j, dof_j) in dofs.iter().enumerate() {
            for (k, dof_k) in dofs.iter().enumerate() {
                let value = ke.read(j, k);
                if value != 0.0 {
                    ls.add_matrix_value(*dof_j, *dof_k, value, MESH_STIFFNESS_MATRIX);
                }
            }
        }
    }

    Ok(())
}

/// Add `scale * shape_i * shape_j * tensor` to the landmark stiffness for every node pair.
///
/// Off-diagonal node pairs are written at both mirrored positions, so the result is
/// symmetric whenever the landmark tensor is.
pub fn add_landmark_stiffness<const D: usize, L: LinearSystem>(
    ls: &mut L,
    dofs: &[usize],
    landmark: &Landmark<D>,
    scale: f64,
) {
    let shape = landmark.shape();
    let tensor = landmark.landmark_tensor();

    for (k, s) in shape.iter().enumerate() {
        let weight = s * s * scale;
        for n in 0..D {
            for m in 0..D {
                let (dof_n, dof_m) = (dofs[k * D + n], dofs[k * D + m]);
                ls.add_matrix_value(dof_n, dof_m, weight * tensor[n][m], LANDMARK_STIFFNESS_MATRIX);
            }
        }
    }

    for i in 0..shape.len() {
        for j in i + 1..shape.len() {
            let weight = shape[i] * shape[j] * scale;
            for n in 0..D {
                for m in 0..D {
                    let value = weight * tensor[n][m];
                    let (dof_n, dof_m) = (dofs[i * D + n], dofs[j * D + m]);
                    ls.add_matrix_value(dof_n, dof_m, value, LANDMARK_STIFFNESS_MATRIX);
                    ls.add_matrix_value(dof_m, dof_n, value, LANDMARK_STIFFNESS_MATRIX);
                }
            }
        }
    }
}

/// Accumulate the stiffness of every landmark not flagged as outlier.
pub fn assemble_landmark_stiffness<const D: usize, L: LinearSystem>(
    ls: &mut L,
    mesh: &Mesh<D>,
    landmarks: &[Landmark<D>],
    ponderation: f64,
    trade_off: f64,
) -> Result<(), RobustSolverError> {
    for (index, landmark) in landmarks.iter().enumerate() {
        if landmark.is_outlier() {
            continue;
        }
        let dofs = landmark_dofs(mesh, landmark, index)?;
        let scale = trade_off * ponderation * landmark.confidence();
        add_landmark_stiffness(ls, &dofs, landmark, scale);
    }
    Ok(())
}

/// Subtract the stiffness of the landmarks flagged as outliers.
///
/// `ponderation` must be the value the contributions were assembled with.
pub fn remove_outlier_stiffness<const D: usize, L: LinearSystem>(
    ls: &mut L,
    mesh: &Mesh<D>,
    landmarks: &[Landmark<D>],
    ponderation: f64,
    trade_off: f64,
) -> Result<(), RobustSolverError> {
    for (index, landmark) in landmarks.iter().enumerate() {
        if !landmark.is_outlier() {
            continue;
        }
        let dofs = landmark_dofs(mesh, landmark, index)?;
        let scale = -trade_off * ponderation * landmark.confidence();
        add_landmark_stiffness(ls, &dofs, landmark, scale);
    }
    Ok(())
}

/// Rescale the landmark stiffness in place after the ponderation changed.
///
/// Every remaining contribution is linear in the ponderation, so this matches a full
/// reassembly over the remaining landmarks.
pub fn rescale_landmark_stiffness<L: LinearSystem>(
    ls: &mut L,
    old_ponderation: f64,
    new_ponderation: f64,
) {
    ls.scale_matrix(new_ponderation / old_ponderation, LANDMARK_STIFFNESS_MATRIX);
}

/// Form the system matrix as the sum of the mesh and landmark stiffness.
pub fn combine_stiffness<L: LinearSystem>(ls: &mut L) {
    ls.copy_matrix(MESH_STIFFNESS_MATRIX, STIFFNESS_MATRIX);
    ls.add_matrix_matrix(STIFFNESS_MATRIX, LANDMARK_STIFFNESS_MATRIX);
}

/// Rebuild the landmark force from every landmark not flagged as outlier.
pub fn assemble_landmark_force<const D: usize, L: LinearSystem>(
    ls: &mut L,
    mesh: &Mesh<D>,
    landmarks: &[Landmark<D>],
    ponderation: f64,
    trade_off: f64,
) -> Result<(), RobustSolverError> {
    ls.initialize_vector(LANDMARK_FORCE_VECTOR);

    for (index, landmark) in landmarks.iter().enumerate() {
        if landmark.is_outlier() {
            continue;
        }
        let dofs = landmark_dofs(mesh, landmark, index)?;
        let target = mat_vec(landmark.landmark_tensor(), landmark.real_displacement());

        for (m, s) in landmark.shape().iter().enumerate() {
            let weight = landmark.confidence() * s * ponderation * trade_off;
            for (j, t) in target.iter().enumerate() {
                ls.add_vector_value(dofs[m * D + j], weight * t, LANDMARK_FORCE_VECTOR);
            }
        }
    }

    Ok(())
}

/// Set the right hand side to the landmark force plus the external force.
///
/// The external force cancels the elastic energy of the current solution, so the next solve
/// starts from the deformed configuration.
pub fn add_external_force<L: LinearSystem>(ls: &mut L) {
    ls.copy_vector(LANDMARK_FORCE_VECTOR, FORCE_VECTOR);
    ls.add_vector_vector(FORCE_VECTOR, EXTERNAL_FORCE_VECTOR);
}

/// Recompute the external force from the current solution.
pub fn update_external_force<L: LinearSystem>(ls: &mut L) {
    ls.multiply_matrix_solution(EXTERNAL_FORCE_VECTOR, MESH_STIFFNESS_MATRIX, SOLUTION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::bind_landmarks;
    use crate::tensor::{landmark_tensor, ponderation};
    use approx::assert_relative_eq;
    use femreg_linalg::DenseLinearSystem;
    use femreg_mesh::{LinearElasticMaterial, Quad4};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn setup(
        rng: &mut StdRng,
        num_landmarks: usize,
    ) -> Result<(Mesh<2>, DenseLinearSystem, Vec<Landmark<2>>), RobustSolverError> {
        let mesh = Mesh::rectilinear_quads(
            [0.0, 0.0],
            [1.0, 1.0],
            [3, 3],
            LinearElasticMaterial::default(),
        )?;
        let mut ls = DenseLinearSystem::default();
        ls.set_layout(system_layout(mesh.num_dofs()));
        assemble_mesh_stiffness(&mut ls, &mesh)?;

        let landmarks = (0..num_landmarks)
            .map(|_| {
                let p = [rng.random_range(0.0..3.0), rng.random_range(0.0..3.0)];
                let u = [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)];
                let l = Landmark::new(p, u, rng.random_range(0.1..2.0));
                if rng.random_bool(0.5) {
                    let a: f64 = rng.random_range(0.0..1.0);
                    let b: f64 = rng.random_range(-0.5..0.5);
                    l.with_structure_tensor([[a, b], [0.3, 1.0 - a]])
                } else {
                    l
                }
            })
            .collect();
        let (mut landmarks, out) = bind_landmarks(&mesh, None, landmarks)?;
        assert!(out.is_empty());

        for (i, l) in landmarks.iter_mut().enumerate() {
            let dofs = landmark_dofs(&mesh, l, i)?;
            let t = landmark_tensor(&ls, &dofs, l.shape(), l.structure_tensor());
            l.set_landmark_tensor(t);
        }
        Ok((mesh, ls, landmarks))
    }

    #[test]
    fn test_mesh_stiffness_dof_check() {
        let mut mesh = Mesh::<2>::default();
        mesh.add_node([0.0, 0.0]);
        mesh.add_node([1.0, 0.0]);
        mesh.add_node([1.0, 1.0]);
        mesh.add_node([0.0, 1.0]);
        mesh.add_element(Box::new(Quad4::new(
            [0, 1, 2, 3],
            LinearElasticMaterial::default(),
        )));

        let mut ls = DenseLinearSystem::default();
        ls.set_layout(system_layout(8));
        assert!(assemble_mesh_stiffness(&mut ls, &mesh).is_ok());

        mesh.add_element(Box::new(Quad4::new(
            [0, 1, 2, 7],
            LinearElasticMaterial::default(),
        )));
        assert_eq!(
            assemble_mesh_stiffness(&mut ls, &mesh),
            Err(RobustSolverError::DofOutOfRange { dof: 14, ngfn: 8 })
        );
    }

    #[test]
    fn test_landmark_stiffness_symmetric() -> Result<(), RobustSolverError> {
        let mut rng = StdRng::seed_from_u64(3);
        let (mesh, mut ls, landmarks) = setup(&mut rng, 30)?;
        let pond = ponderation(mesh.num_nodes(), landmarks.len())?;
        assemble_landmark_stiffness(&mut ls, &mesh, &landmarks, pond, 1.5)?;

        let n = mesh.num_dofs();
        let mut trace = 0.0;
        for i in 0..n {
            trace += ls.matrix_value(i, i, LANDMARK_STIFFNESS_MATRIX);
            for j in 0..n {
                assert_relative_eq!(
                    ls.matrix_value(i, j, LANDMARK_STIFFNESS_MATRIX),
                    ls.matrix_value(j, i, LANDMARK_STIFFNESS_MATRIX),
                    epsilon = 1e-12
                );
            }
        }
        assert!(trace > 0.0);
        Ok(())
    }

    #[test]
    fn test_rescale_matches_reassembly() -> Result<(), RobustSolverError> {
        let mut rng = StdRng::seed_from_u64(11);
        let trade_off = 0.7;

        for _ in 0..5 {
            let (mesh, mut ls, mut landmarks) = setup(&mut rng, 25)?;
            let old = ponderation(mesh.num_nodes(), landmarks.len())?;
            assemble_landmark_stiffness(&mut ls, &mesh, &landmarks, old, trade_off)?;

            let num_rejected = rng.random_range(1..10);
            for l in landmarks.iter_mut().take(num_rejected) {
                l.mark_outlier();
            }
            remove_outlier_stiffness(&mut ls, &mesh, &landmarks, old, trade_off)?;
            landmarks.drain(..num_rejected);
            let new = ponderation(mesh.num_nodes(), landmarks.len())?;
            rescale_landmark_stiffness(&mut ls, old, new);

            let mut fresh = DenseLinearSystem::default();
            fresh.set_layout(system_layout(mesh.num_dofs()));
            assemble_landmark_stiffness(&mut fresh, &mesh, &landmarks, new, trade_off)?;

            let n = mesh.num_dofs();
            for i in 0..n {
                for j in 0..n {
                    assert_relative_eq!(
                        ls.matrix_value(i, j, LANDMARK_STIFFNESS_MATRIX),
                        fresh.matrix_value(i, j, LANDMARK_STIFFNESS_MATRIX),
                        epsilon = 1e-9
                    );
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_landmark_force() -> Result<(), RobustSolverError> {
        let mut rng = StdRng::seed_from_u64(5);
        let (mesh, mut ls, mut landmarks) = setup(&mut rng, 1)?;
        let pond = ponderation(mesh.num_nodes(), 1)?;
        assemble_landmark_force(&mut ls, &mesh, &landmarks, pond, 2.0)?;

        // the force over all nodes sums to the weighted target, shapes summing to one
        let l = &landmarks[0];
        let target = mat_vec(l.landmark_tensor(), l.real_displacement());
        for (c, t) in target.iter().enumerate() {
            let total: f64 = (0..mesh.num_nodes())
                .map(|node| ls.vector_value(node * 2 + c, LANDMARK_FORCE_VECTOR))
                .sum();
            assert_relative_eq!(total, l.confidence() * pond * 2.0 * t, epsilon = 1e-10);
        }

        // outliers do not contribute
        landmarks[0].mark_outlier();
        assemble_landmark_force(&mut ls, &mesh, &landmarks, pond, 2.0)?;
        assert!((0..mesh.num_dofs()).all(|i| ls.vector_value(i, LANDMARK_FORCE_VECTOR) == 0.0));
        Ok(())
    }

    #[test]
    fn test_unbound_landmark() -> Result<(), RobustSolverError> {
        let mut rng = StdRng::seed_from_u64(1);
        let (mesh, mut ls, _) = setup(&mut rng, 0)?;
        let landmarks = vec![Landmark::new([0.5, 0.5], [1.0, 0.0], 1.0)];
        assert_eq!(
            assemble_landmark_force(&mut ls, &mesh, &landmarks, 1.0, 1.0),
            Err(RobustSolverError::UnboundLandmark { index: 0 })
        );
        Ok(())
    }

    #[test]
    fn test_external_force() -> Result<(), RobustSolverError> {
        let mut rng = StdRng::seed_from_u64(9);
        let (mesh, mut ls, _) = setup(&mut rng, 0)?;
        for i in 0..mesh.num_dofs() {
            ls.set_solution_value(i, if i % 2 == 0 { 1.0 } else { 0.0 }, SOLUTION);
            ls.set_vector_value(i, 0.5, LANDMARK_FORCE_VECTOR);
        }
        update_external_force(&mut ls);
        add_external_force(&mut ls);

        // a rigid translation carries no elastic force
        for i in 0..mesh.num_dofs() {
            assert_relative_eq!(ls.vector_value(i, EXTERNAL_FORCE_VECTOR), 0.0, epsilon = 1e-12);
            assert_relative_eq!(ls.vector_value(i, FORCE_VECTOR), 0.5, epsilon = 1e-12);
        }
        Ok(())
    }
}
