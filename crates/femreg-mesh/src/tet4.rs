use crate::element::{check_node_count, Element, INSIDE_TOLERANCE};
use crate::error::MeshError;
use crate::linalg::{add_btcb, det_mat33, inverse_mat33, mat33_mul_vec3};
use crate::material::LinearElasticMaterial;

/// Linear tetrahedron with isotropic linear elasticity.
///
/// Local coordinates span the reference tetrahedron with vertices at the origin and
/// the three unit vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Tet4 {
    nodes: [usize; 4],
    material: LinearElasticMaterial,
}

impl Tet4 {
    /// Create a tetrahedron from four node ids with positive orientation.
    pub fn new(nodes: [usize; 4], material: LinearElasticMaterial) -> Self {
        Self { nodes, material }
    }

    // columns are the edge vectors from the first node
    fn jacobian(coords: &[[f64; 3]]) -> [[f64; 3]; 3] {
        let mut j = [[0.0; 3]; 3];
        for (a, row) in j.iter_mut().enumerate() {
            for (b, v) in row.iter_mut().enumerate() {
                *v = coords[b + 1][a] - coords[0][a];
            }
        }
        j
    }
}

impl Element<3> for Tet4 {
    fn node_ids(&self) -> &[usize] {
        &self.nodes
    }

    fn shape_functions(&self, local: &[f64; 3]) -> Vec<f64> {
        vec![
            1.0 - local[0] - local[1] - local[2],
            local[0],
            local[1],
            local[2],
        ]
    }

    fn local_from_global(&self, coords: &[[f64; 3]], global: &[f64; 3]) -> Option<[f64; 3]> {
        if coords.len() != 4 {
            return None;
        }
        let inv = inverse_mat33(&Self::jacobian(coords))?;
        let d = [
            global[0] - coords[0][0],
            global[1] - coords[0][1],
            global[2] - coords[0][2],
        ];
        let local = mat33_mul_vec3(&inv, &d);

        let inside = local.iter().all(|v| *v >= -INSIDE_TOLERANCE)
            && local.iter().sum::<f64>() <= 1.0 + INSIDE_TOLERANCE;
        inside.then_some(local)
    }

    fn stiffness_matrix(&self, coords: &[[f64; 3]]) -> Result<faer::Mat<f64>, MeshError> {
        check_node_count(4, coords.len())?;
        self.material.validate()?;

        let j = Self::jacobian(coords);
        let det = det_mat33(&j);
        if det <= f64::EPSILON {
            return Err(MeshError::DegenerateElement(det));
        }
        let inv = inverse_mat33(&j).ok_or(MeshError::DegenerateElement(det))?;
        let volume = det / 6.0;

        let local_grads = [
            [-1.0, -1.0, -1.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];

        let mut b = faer::Mat::<f64>::zeros(6, 12);
        for (i, d) in local_grads.iter().enumerate() {
            // dN/dx_a = sum_b dN/dlocal_b * inv[b][a]
            let g: [f64; 3] =
                std::array::from_fn(|a| (0..3).map(|bb| d[bb] * inv[bb][a]).sum::<f64>());
            let c = 3 * i;
            b.write(0, c, g[0]);
            b.write(1, c + 1, g[1]);
            b.write(2, c + 2, g[2]);
            b.write(3, c, g[1]);
            b.write(3, c + 1, g[0]);
            b.write(4, c + 1, g[2]);
            b.write(4, c + 2, g[1]);
            b.write(5, c, g[2]);
            b.write(5, c + 2, g[0]);
        }

        let mut k = faer::Mat::<f64>::zeros(12, 12);
        add_btcb(&mut k, &b, &self.material.isotropic_matrix(), volume);
        Ok(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const COORDS: [[f64; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 2.0, 0.0],
        [0.0, 0.0, 1.5],
    ];

    #[test]
    fn test_local_from_global() {
        let e = Tet4::new([0, 1, 2, 3], LinearElasticMaterial::default());
        let p = [0.25, 0.5, 0.375];
        let local = e.local_from_global(&COORDS, &p).unwrap();
        assert_relative_eq!(local[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(local[1], 0.25, epsilon = 1e-12);
        assert_relative_eq!(local[2], 0.25, epsilon = 1e-12);
        let n = e.shape_functions(&local);
        assert_relative_eq!(n.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

        assert!(e.local_from_global(&COORDS, &[0.6, 1.0, 0.5]).is_none());
        assert!(e.local_from_global(&COORDS, &[0.1, 0.1, -0.1]).is_none());
    }

    #[test]
    fn test_stiffness_rigid_modes() -> Result<(), MeshError> {
        let e = Tet4::new([0, 1, 2, 3], LinearElasticMaterial::default());
        let k = e.stiffness_matrix(&COORDS)?;

        let mut modes = vec![];
        for axis in 0..3 {
            let mut t = [0.0; 12];
            for n in 0..4 {
                t[3 * n + axis] = 1.0;
            }
            modes.push(t);
        }
        // rotation around z
        let mut r = [0.0; 12];
        for (n, x) in COORDS.iter().enumerate() {
            r[3 * n] = -x[1];
            r[3 * n + 1] = x[0];
        }
        modes.push(r);

        for mode in modes.iter() {
            for i in 0..12 {
                let f: f64 = (0..12).map(|j| k.read(i, j) * mode[j]).sum();
                assert_relative_eq!(f, 0.0, epsilon = 1e-12);
            }
        }
        for i in 0..12 {
            assert!(k.read(i, i) > 0.0);
            for j in 0..12 {
                assert_relative_eq!(k.read(i, j), k.read(j, i), epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_degenerate() {
        let e = Tet4::new([0, 1, 2, 3], LinearElasticMaterial::default());
        let flat = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        assert!(matches!(
            e.stiffness_matrix(&flat),
            Err(MeshError::DegenerateElement(_))
        ));
        assert!(e.local_from_global(&flat, &[0.1, 0.1, 0.0]).is_none());
    }
}
