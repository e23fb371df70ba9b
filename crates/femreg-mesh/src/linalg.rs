/// Compute the determinant of a 2x2 matrix.
#[inline]
pub fn det_mat22(m: &[[f64; 2]; 2]) -> f64 {
    m[0][0] * m[1][1] - m[0][1] * m[1][0]
}

/// Compute the inverse of a 2x2 matrix.
///
/// Returns `None` if the matrix is singular.
pub fn inverse_mat22(m: &[[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = det_mat22(m);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [m[1][1] * inv_det, -m[0][1] * inv_det],
        [-m[1][0] * inv_det, m[0][0] * inv_det],
    ])
}

/// Compute the determinant of a 3x3 matrix.
#[inline]
pub fn det_mat33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Compute the inverse of a 3x3 matrix using the adjugate.
///
/// Returns `None` if the matrix is singular.
pub fn inverse_mat33(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = det_mat33(m);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let mut inv = [[0.0; 3]; 3];
    inv[0][0] = (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det;
    inv[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
    inv[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
    inv[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
    inv[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
    inv[1][2] = (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det;
    inv[2][0] = (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det;
    inv[2][1] = (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det;
    inv[2][2] = (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det;
    Some(inv)
}

/// Multiply a 3x3 matrix by a vector.
#[inline]
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Accumulate `scale * B^T * C * B` into `k`.
///
/// `b` is the strain-displacement matrix with one row per strain component and `c` the
/// constitutive matrix of matching size.
pub fn add_btcb(k: &mut faer::Mat<f64>, b: &faer::Mat<f64>, c: &faer::Mat<f64>, scale: f64) {
    let btcb = b.as_ref().transpose() * c.as_ref() * b.as_ref();
    for j in 0..k.ncols() {
        for i in 0..k.nrows() {
            k.write(i, j, k.read(i, j) + scale * btcb.read(i, j));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_mat22() {
        let m = [[2.0, 1.0], [1.0, 3.0]];
        let inv = inverse_mat22(&m).unwrap();
        assert_relative_eq!(inv[0][0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(inv[0][1], -0.2, epsilon = 1e-12);
        assert_relative_eq!(inv[1][1], 0.4, epsilon = 1e-12);
        assert!(inverse_mat22(&[[1.0, 2.0], [2.0, 4.0]]).is_none());
    }

    #[test]
    fn test_inverse_mat33() {
        let m = [[2.0, 0.0, 1.0], [1.0, 3.0, 0.0], [0.0, 1.0, 4.0]];
        let inv = inverse_mat33(&m).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let v: f64 = (0..3).map(|k| m[i][k] * inv[k][j]).sum();
                assert_relative_eq!(v, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(det_mat33(&m), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_add_btcb() {
        let b = faer::mat![[1.0, 0.0], [0.0, 2.0]];
        let c = faer::mat![[3.0, 0.0], [0.0, 1.0]];
        let mut k = faer::Mat::<f64>::zeros(2, 2);
        add_btcb(&mut k, &b, &c, 0.5);
        assert_relative_eq!(k.read(0, 0), 1.5);
        assert_relative_eq!(k.read(1, 1), 2.0);
        assert_relative_eq!(k.read(0, 1), 0.0);
    }
}
