use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Isotropic linear elastic material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearElasticMaterial {
    /// Young's modulus.
    pub youngs_modulus: f64,
    /// Poisson's ratio, in `[0, 0.5)`.
    pub poisson_ratio: f64,
    /// Out-of-plane thickness, only used by 2D elements.
    pub thickness: f64,
}

impl Default for LinearElasticMaterial {
    fn default() -> Self {
        Self {
            youngs_modulus: 1.0,
            poisson_ratio: 0.3,
            thickness: 1.0,
        }
    }
}

impl LinearElasticMaterial {
    /// Check the parameters are in their physical range.
    pub fn validate(&self) -> Result<(), MeshError> {
        if !(self.youngs_modulus.is_finite() && self.youngs_modulus > 0.0) {
            return Err(MeshError::InvalidMaterial(format!(
                "youngs modulus must be positive, got {}",
                self.youngs_modulus
            )));
        }
        if !(0.0..0.5).contains(&self.poisson_ratio) {
            return Err(MeshError::InvalidMaterial(format!(
                "poisson ratio must be in [0, 0.5), got {}",
                self.poisson_ratio
            )));
        }
        if !(self.thickness.is_finite() && self.thickness > 0.0) {
            return Err(MeshError::InvalidMaterial(format!(
                "thickness must be positive, got {}",
                self.thickness
            )));
        }
        Ok(())
    }

    /// The 3x3 plane stress constitutive matrix for strains `[exx, eyy, gxy]`.
    pub fn plane_stress_matrix(&self) -> faer::Mat<f64> {
        let e = self.youngs_modulus;
        let nu = self.poisson_ratio;
        let f = e / (1.0 - nu * nu);
        faer::mat![
            [f, f * nu, 0.0],
            [f * nu, f, 0.0],
            [0.0, 0.0, f * (1.0 - nu) / 2.0],
        ]
    }

    /// The 6x6 constitutive matrix for strains `[exx, eyy, ezz, gxy, gyz, gzx]`.
    pub fn isotropic_matrix(&self) -> faer::Mat<f64> {
        let e = self.youngs_modulus;
        let nu = self.poisson_ratio;
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = e / (2.0 * (1.0 + nu));
        faer::Mat::from_fn(6, 6, |i, j| match (i < 3, j < 3) {
            (true, true) if i == j => lambda + 2.0 * mu,
            (true, true) => lambda,
            (false, false) if i == j => mu,
            _ => 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_validate() {
        assert!(LinearElasticMaterial::default().validate().is_ok());
        let bad = LinearElasticMaterial {
            poisson_ratio: 0.5,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(MeshError::InvalidMaterial(_))));
        let bad = LinearElasticMaterial {
            youngs_modulus: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_constitutive_matrices() {
        let m = LinearElasticMaterial {
            youngs_modulus: 2.0,
            poisson_ratio: 0.25,
            thickness: 1.0,
        };
        let c = m.plane_stress_matrix();
        assert_relative_eq!(c.read(0, 0), 2.0 / 0.9375, epsilon = 1e-12);
        assert_relative_eq!(c.read(2, 2), 2.0 / 0.9375 * 0.375, epsilon = 1e-12);

        let c = m.isotropic_matrix();
        // lambda = 0.8, mu = 0.8
        assert_relative_eq!(c.read(0, 0), 2.4, epsilon = 1e-12);
        assert_relative_eq!(c.read(0, 1), 0.8, epsilon = 1e-12);
        assert_relative_eq!(c.read(3, 3), 0.8, epsilon = 1e-12);
        assert_relative_eq!(c.read(3, 0), 0.0);
    }
}
