use crate::element::{check_node_count, Element, INSIDE_TOLERANCE};
use crate::error::MeshError;
use crate::linalg::{det_mat22, inverse_mat22};
use crate::material::LinearElasticMaterial;

/// Linear triangle with plane stress elasticity.
///
/// Local coordinates `(xi, eta)` span the reference triangle `(0, 0), (1, 0), (0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tri3 {
    nodes: [usize; 3],
    material: LinearElasticMaterial,
}

impl Tri3 {
    /// Create a triangle from three node ids in counter-clockwise order.
    pub fn new(nodes: [usize; 3], material: LinearElasticMaterial) -> Self {
        Self { nodes, material }
    }

    // columns are the edge vectors from the first node
    fn jacobian(coords: &[[f64; 2]]) -> [[f64; 2]; 2] {
        [
            [coords[1][0] - coords[0][0], coords[2][0] - coords[0][0]],
            [coords[1][1] - coords[0][1], coords[2][1] - coords[0][1]],
        ]
    }
}

impl Element<2> for Tri3 {
    fn node_ids(&self) -> &[usize] {
        &self.nodes
    }

    fn shape_functions(&self, local: &[f64; 2]) -> Vec<f64> {
        vec![1.0 - local[0] - local[1], local[0], local[1]]
    }

    fn local_from_global(&self, coords: &[[f64; 2]], global: &[f64; 2]) -> Option<[f64; 2]> {
        if coords.len() != 3 {
            return None;
        }
        let inv = inverse_mat22(&Self::jacobian(coords))?;
        let d = [global[0] - coords[0][0], global[1] - coords[0][1]];
        let xi = inv[0][0] * d[0] + inv[0][1] * d[1];
        let eta = inv[1][0] * d[0] + inv[1][1] * d[1];

        let inside = xi >= -INSIDE_TOLERANCE
            && eta >= -INSIDE_TOLERANCE
            && xi + eta <= 1.0 + INSIDE_TOLERANCE;
        inside.then_some([xi, eta])
    }

    fn stiffness_matrix(&self, coords: &[[f64; 2]]) -> Result<faer::Mat<f64>, MeshError> {
        check_node_count(3, coords.len())?;
        self.material.validate()?;

        let j = Self::jacobian(coords);
        let det = det_mat22(&j);
        if det <= f64::EPSILON {
            return Err(MeshError::DegenerateElement(det));
        }
        let area = 0.5 * det;

        // gradients of the shape functions, constant over the element
        let grads = [
            [coords[1][1] - coords[2][1], coords[2][0] - coords[1][0]],
            [coords[2][1] - coords[0][1], coords[0][0] - coords[2][0]],
            [coords[0][1] - coords[1][1], coords[1][0] - coords[0][0]],
        ];

        let mut b = faer::Mat::<f64>::zeros(3, 6);
        for (i, g) in grads.iter().enumerate() {
            let (dx, dy) = (g[0] / det, g[1] / det);
            b.write(0, 2 * i, dx);
            b.write(1, 2 * i + 1, dy);
            b.write(2, 2 * i, dy);
            b.write(2, 2 * i + 1, dx);
        }

        let mut k = faer::Mat::<f64>::zeros(6, 6);
        crate::linalg::add_btcb(
            &mut k,
            &b,
            &self.material.plane_stress_matrix(),
            self.material.thickness * area,
        );
        Ok(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const COORDS: [[f64; 2]; 3] = [[0.0, 0.0], [2.0, 0.0], [0.0, 1.0]];

    #[test]
    fn test_local_from_global() {
        let e = Tri3::new([0, 1, 2], LinearElasticMaterial::default());
        let local = e.local_from_global(&COORDS, &[1.0, 0.25]).unwrap();
        assert_relative_eq!(local[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(local[1], 0.25, epsilon = 1e-12);
        let back = e.global_from_local(&COORDS, &local);
        assert_relative_eq!(back[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(back[1], 0.25, epsilon = 1e-12);

        assert!(e.local_from_global(&COORDS, &[1.5, 0.5]).is_none());
        assert!(e.local_from_global(&COORDS, &[-0.1, 0.5]).is_none());
        // vertices and edges are inside
        assert!(e.local_from_global(&COORDS, &[2.0, 0.0]).is_some());
        assert!(e.local_from_global(&COORDS, &[1.0, 0.5]).is_some());
    }

    #[test]
    fn test_stiffness_rigid_modes() -> Result<(), MeshError> {
        let e = Tri3::new([0, 1, 2], LinearElasticMaterial::default());
        let k = e.stiffness_matrix(&COORDS)?;

        // translations and the infinitesimal rotation produce no forces
        let modes: [[f64; 6]; 3] = [
            [1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 0.0, 2.0, -1.0, 0.0],
        ];
        for mode in modes.iter() {
            for i in 0..6 {
                let f: f64 = (0..6).map(|j| k.read(i, j) * mode[j]).sum();
                assert_relative_eq!(f, 0.0, epsilon = 1e-12);
            }
        }
        for i in 0..6 {
            assert!(k.read(i, i) > 0.0);
            for j in 0..6 {
                assert_relative_eq!(k.read(i, j), k.read(j, i), epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_degenerate() {
        let e = Tri3::new([0, 1, 2], LinearElasticMaterial::default());
        let coords = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        assert!(matches!(
            e.stiffness_matrix(&coords),
            Err(MeshError::DegenerateElement(_))
        ));
        assert!(matches!(
            e.stiffness_matrix(&coords[..2]),
            Err(MeshError::WrongNodeCount {
                expected: 3,
                actual: 2
            })
        ));
    }
}
