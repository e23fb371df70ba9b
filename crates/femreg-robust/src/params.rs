use serde::{Deserialize, Serialize};

use crate::error::RobustSolverError;

/// Parameters of a robust registration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustSolverParams {
    /// Number of outlier rejection rounds. Zero runs the approximation steps only.
    pub outlier_rejection_steps: usize,
    /// Number of refinement solves after the rejection rounds.
    pub approximation_steps: usize,
    /// Fraction of the landmarks rejected over all rounds, in `[0, 1)`.
    pub fraction_error_rejected: f64,
    /// Blend in `[0, 1]` between relative (`0`) and absolute (`1`) error weighting.
    pub tolerance_to_largest_displacement: f64,
    /// Weight of the landmark energy against the mesh energy.
    pub trade_off_image_mesh_energy: f64,
}

impl Default for RobustSolverParams {
    fn default() -> Self {
        Self {
            outlier_rejection_steps: 5,
            approximation_steps: 5,
            fraction_error_rejected: 0.25,
            tolerance_to_largest_displacement: 1.0,
            trade_off_image_mesh_energy: 1.0,
        }
    }
}

impl RobustSolverParams {
    /// Check every parameter is in its valid range.
    pub fn validate(&self) -> Result<(), RobustSolverError> {
        if !(0.0..1.0).contains(&self.fraction_error_rejected) {
            return Err(RobustSolverError::InvalidParameter {
                name: "fraction_error_rejected",
                reason: format!("must be in [0, 1), got {}", self.fraction_error_rejected),
            });
        }
        if !(0.0..=1.0).contains(&self.tolerance_to_largest_displacement) {
            return Err(RobustSolverError::InvalidParameter {
                name: "tolerance_to_largest_displacement",
                reason: format!(
                    "must be in [0, 1], got {}",
                    self.tolerance_to_largest_displacement
                ),
            });
        }
        if !(self.trade_off_image_mesh_energy.is_finite() && self.trade_off_image_mesh_energy > 0.0)
        {
            return Err(RobustSolverError::InvalidParameter {
                name: "trade_off_image_mesh_energy",
                reason: format!(
                    "must be positive and finite, got {}",
                    self.trade_off_image_mesh_energy
                ),
            });
        }
        Ok(())
    }

    /// Number of landmarks rejected in each round for a set of `num_landmarks`.
    pub fn rejected_per_step(&self, num_landmarks: usize) -> usize {
        if self.outlier_rejection_steps == 0 {
            return 0;
        }
        // multiply before dividing, 0.3 / 3 is not exactly 0.1
        (num_landmarks as f64 * self.fraction_error_rejected / self.outlier_rejection_steps as f64)
            .floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(RobustSolverParams::default().validate().is_ok());

        let p = RobustSolverParams {
            fraction_error_rejected: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(RobustSolverError::InvalidParameter {
                name: "fraction_error_rejected",
                ..
            })
        ));

        let p = RobustSolverParams {
            tolerance_to_largest_displacement: -0.1,
            ..Default::default()
        };
        assert!(p.validate().is_err());

        let p = RobustSolverParams {
            trade_off_image_mesh_energy: 0.0,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_rejected_per_step() {
        let p = RobustSolverParams {
            outlier_rejection_steps: 2,
            fraction_error_rejected: 0.2,
            ..Default::default()
        };
        assert_eq!(p.rejected_per_step(12), 1);
        assert_eq!(p.rejected_per_step(100), 10);
        assert_eq!(p.rejected_per_step(4), 0);

        let p = RobustSolverParams {
            outlier_rejection_steps: 3,
            fraction_error_rejected: 0.3,
            ..Default::default()
        };
        assert_eq!(p.rejected_per_step(40), 4);
        assert_eq!(p.rejected_per_step(10), 1);

        let p = RobustSolverParams {
            outlier_rejection_steps: 0,
            ..Default::default()
        };
        assert_eq!(p.rejected_per_step(100), 0);
    }

    #[test]
    fn test_partial_json() {
        let p: RobustSolverParams =
            serde_json::from_str(r#"{"approximation_steps": 20, "fraction_error_rejected": 0.1}"#)
                .unwrap();
        assert_eq!(p.approximation_steps, 20);
        assert_eq!(p.outlier_rejection_steps, 5);
        assert_eq!(p.fraction_error_rejected, 0.1);
    }
}
