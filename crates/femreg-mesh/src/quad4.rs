use crate::element::{check_node_count, Element, INSIDE_TOLERANCE};
use crate::error::MeshError;
use crate::linalg::{add_btcb, det_mat22, inverse_mat22};
use crate::material::LinearElasticMaterial;

const CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

const MAX_NEWTON_ITERATIONS: usize = 32;

/// Bilinear quadrilateral with plane stress elasticity, integrated with 2x2 Gauss points.
///
/// Local coordinates `(xi, eta)` span `[-1, 1] x [-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad4 {
    nodes: [usize; 4],
    material: LinearElasticMaterial,
}

impl Quad4 {
    /// Create a quadrilateral from four node ids in counter-clockwise order.
    pub fn new(nodes: [usize; 4], material: LinearElasticMaterial) -> Self {
        Self { nodes, material }
    }

    fn shape_derivatives(local: &[f64; 2]) -> [[f64; 2]; 4] {
        let mut d = [[0.0; 2]; 4];
        for (di, c) in d.iter_mut().zip(CORNERS.iter()) {
            di[0] = 0.25 * c[0] * (1.0 + c[1] * local[1]);
            di[1] = 0.25 * c[1] * (1.0 + c[0] * local[0]);
        }
        d
    }

    // J[a][b] = d x_a / d local_b
    fn jacobian(coords: &[[f64; 2]], local: &[f64; 2]) -> [[f64; 2]; 2] {
        let d = Self::shape_derivatives(local);
        let mut j = [[0.0; 2]; 2];
        for (di, x) in d.iter().zip(coords.iter()) {
            for a in 0..2 {
                for b in 0..2 {
                    j[a][b] += x[a] * di[b];
                }
            }
        }
        j
    }
}

impl Element<2> for Quad4 {
    fn node_ids(&self) -> &[usize] {
        &self.nodes
    }

    fn shape_functions(&self, local: &[f64; 2]) -> Vec<f64> {
        CORNERS
            .iter()
            .map(|c| 0.25 * (1.0 + c[0] * local[0]) * (1.0 + c[1] * local[1]))
            .collect()
    }

    fn local_from_global(&self, coords: &[[f64; 2]], global: &[f64; 2]) -> Option<[f64; 2]> {
        if coords.len() != 4 {
            return None;
        }

        // newton iterations on the bilinear map, starting from the element center
        let mut local = [0.0, 0.0];
        let mut converged = false;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let x = self.global_from_local(coords, &local);
            let r = [global[0] - x[0], global[1] - x[1]];
            let inv = inverse_mat22(&Self::jacobian(coords, &local))?;
            let step = [
                inv[0][0] * r[0] + inv[0][1] * r[1],
                inv[1][0] * r[0] + inv[1][1] * r[1],
            ];
            local[0] += step[0];
            local[1] += step[1];
            if step[0].abs() + step[1].abs() < 1e-12 {
                converged = true;
                break;
            }
        }

        let inside = converged && local.iter().all(|v| v.abs() <= 1.0 + INSIDE_TOLERANCE);
        inside.then_some(local)
    }

    fn stiffness_matrix(&self, coords: &[[f64; 2]]) -> Result<faer::Mat<f64>, MeshError> {
        check_node_count(4, coords.len())?;
        self.material.validate()?;

        let c = self.material.plane_stress_matrix();
        let g = 1.0 / 3f64.sqrt();
        let mut k = faer::Mat::<f64>::zeros(8, 8);

        for gp in CORNERS.iter() {
            let local = [gp[0] * g, gp[1] * g];
            let j = Self::jacobian(coords, &local);
            let det = det_mat22(&j);
            if det <= f64::EPSILON {
                return Err(MeshError::DegenerateElement(det));
            }
            let inv = inverse_mat22(&j).ok_or(MeshError::DegenerateElement(det))?;

            let mut b = faer::Mat::<f64>::zeros(3, 8);
            for (i, d) in Self::shape_derivatives(&local).iter().enumerate() {
                let dx = d[0] * inv[0][0] + d[1] * inv[1][0];
                let dy = d[0] * inv[0][1] + d[1] * inv[1][1];
                b.write(0, 2 * i, dx);
                b.write(1, 2 * i + 1, dy);
                b.write(2, 2 * i, dy);
                b.write(2, 2 * i + 1, dx);
            }

            // unit gauss weights
            add_btcb(&mut k, &b, &c, self.material.thickness * det);
        }

        Ok(k)
    }
}
