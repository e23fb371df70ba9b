use femreg_linalg::LinearSystem;

use crate::assembly::MESH_STIFFNESS_MATRIX;
use crate::error::RobustSolverError;

/// The ratio of mesh nodes to active landmarks balancing mesh and landmark energies.
pub fn ponderation(
    num_nodes: usize,
    num_active_landmarks: usize,
) -> Result<f64, RobustSolverError> {
    if num_active_landmarks == 0 {
        return Err(RobustSolverError::NoActiveLandmarks);
    }
    Ok(num_nodes as f64 / num_active_landmarks as f64)
}

/// Compute the tensor of a landmark from the mesh stiffness stored in `ls`.
///
/// The diagonal `D x D` blocks of the mesh stiffness at the element nodes are blended with
/// the shape function values, right multiplied by the structure tensor if any, and
/// symmetrized. `dofs` are the global degrees of freedom of the element in local order.
pub fn landmark_tensor<const D: usize, L: LinearSystem>(
    ls: &L,
    dofs: &[usize],
    shape: &[f64],
    structure_tensor: Option<&[[f64; D]; D]>,
) -> [[f64; D]; D] {
    let mut tensor = [[0.0; D]; D];
    for (k, weight) in shape.iter().enumerate() {
        for (n, row) in tensor.iter_mut().enumerate() {
            for (m, v) in row.iter_mut().enumerate() {
                let (i, j) = (dofs[k * D + n], dofs[k * D + m]);
                *v += weight * ls.matrix_value(i, j, MESH_STIFFNESS_MATRIX);
            }
        }
    }

    if let Some(s) = structure_tensor {
        tensor = mat_mul(&tensor, s);
    }

    std::array::from_fn(|n| std::array::from_fn(|m| 0.5 * (tensor[n][m] + tensor[m][n])))
}

/// Weighted norm of the residual between the observed and the simulated displacement.
///
/// The residual is divided by `(1 - lambda) * |simulated| + lambda`, so with `lambda < 1`
/// landmarks with large displacements are judged relative to their magnitude. It is then
/// scaled by the confidence and projected with the structure tensor if present.
pub fn weighted_error_norm<const D: usize>(
    real_displacement: &[f64; D],
    simulated_displacement: &[f64; D],
    confidence: f64,
    structure_tensor: Option<&[[f64; D]; D]>,
    lambda: f64,
) -> f64 {
    let denominator = ((1.0 - lambda) * norm(simulated_displacement) + lambda).max(f64::EPSILON);
    let error: [f64; D] = std::array::from_fn(|d| {
        confidence * (real_displacement[d] - simulated_displacement[d]) / denominator
    });

    match structure_tensor {
        Some(s) => norm(&mat_vec(s, &error)),
        None => norm(&error),
    }
}

/// Multiply a `D x D` matrix by a vector.
pub fn mat_vec<const D: usize>(m: &[[f64; D]; D], v: &[f64; D]) -> [f64; D] {
    std::array::from_fn(|i| m[i].iter().zip(v.iter()).map(|(a, b)| a * b).sum())
}

fn mat_mul<const D: usize>(a: &[[f64; D]; D], b: &[[f64; D]; D]) -> [[f64; D]; D] {
    std::array::from_fn(|i| std::array::from_fn(|j| (0..D).map(|k| a[i][k] * b[k][j]).sum()))
}

fn norm<const D: usize>(v: &[f64; D]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
