use crate::error::RobustSolverError;

/// A noisy point correspondence used as a soft constraint on the deformation.
///
/// The caller provides the source point, the observed displacement, a confidence and an
/// optional structure tensor. The element binding, the shape function values and the
/// landmark tensor are filled in by the solver and never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark<const D: usize> {
    source: [f64; D],
    real_displacement: [f64; D],
    confidence: f64,
    structure_tensor: Option<[[f64; D]; D]>,

    element: Option<usize>,
    shape: Vec<f64>,
    landmark_tensor: [[f64; D]; D],
    simulated_displacement: [f64; D],
    error_norm: f64,
    is_outlier: bool,
    is_out_of_mesh: bool,
}

impl<const D: usize> Landmark<D> {
    /// Create a landmark at `source` moving by `real_displacement`.
    pub fn new(source: [f64; D], real_displacement: [f64; D], confidence: f64) -> Self {
        Self {
            source,
            real_displacement,
            confidence,
            structure_tensor: None,
            element: None,
            shape: Vec::new(),
            landmark_tensor: [[0.0; D]; D],
            simulated_displacement: [0.0; D],
            error_norm: 0.0,
            is_outlier: false,
            is_out_of_mesh: false,
        }
    }

    /// Attach a symmetric structure tensor refining the error metric.
    pub fn with_structure_tensor(mut self, structure_tensor: [[f64; D]; D]) -> Self {
        self.structure_tensor = Some(structure_tensor);
        self
    }

    /// The source point in physical space.
    pub fn source(&self) -> &[f64; D] {
        &self.source
    }

    /// The observed displacement.
    pub fn real_displacement(&self) -> &[f64; D] {
        &self.real_displacement
    }

    /// The confidence weight.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// The optional structure tensor.
    pub fn structure_tensor(&self) -> Option<&[[f64; D]; D]> {
        self.structure_tensor.as_ref()
    }

    /// Index of the mesh element containing the source, once bound.
    pub fn element(&self) -> Option<usize> {
        self.element
    }

    /// Shape function values of the containing element at the source.
    pub fn shape(&self) -> &[f64] {
        &self.shape
    }

    /// The per-landmark tensor derived from the mesh stiffness.
    pub fn landmark_tensor(&self) -> &[[f64; D]; D] {
        &self.landmark_tensor
    }

    /// Displacement at the source predicted by the last solve.
    pub fn simulated_displacement(&self) -> &[f64; D] {
        &self.simulated_displacement
    }

    /// Weighted residual error computed in the last rejection round.
    pub fn error_norm(&self) -> f64 {
        self.error_norm
    }

    /// Whether the landmark was rejected as an outlier.
    pub fn is_outlier(&self) -> bool {
        self.is_outlier
    }

    /// Whether the source lies outside of the mesh.
    pub fn is_out_of_mesh(&self) -> bool {
        self.is_out_of_mesh
    }

    pub(crate) fn validate(&self) -> Result<(), RobustSolverError> {
        if !(self.confidence.is_finite() && self.confidence >= 0.0) {
            return Err(RobustSolverError::InvalidParameter {
                name: "confidence",
                reason: format!("must be finite and non-negative, got {}", self.confidence),
            });
        }
        let finite = self
            .source
            .iter()
            .chain(self.real_displacement.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(RobustSolverError::InvalidParameter {
                name: "landmark",
                reason: format!(
                    "source {:?} and displacement {:?} must be finite",
                    self.source, self.real_displacement
                ),
            });
        }
        Ok(())
    }

    pub(crate) fn bind(&mut self, element: usize, shape: Vec<f64>) {
        self.element = Some(element);
        self.shape = shape;
        self.is_out_of_mesh = false;
    }

    pub(crate) fn mark_out_of_mesh(&mut self) {
        self.is_out_of_mesh = true;
    }

    pub(crate) fn mark_outlier(&mut self) {
        self.is_outlier = true;
    }

    pub(crate) fn set_landmark_tensor(&mut self, tensor: [[f64; D]; D]) {
        self.landmark_tensor = tensor;
    }

    pub(crate) fn set_error(&mut self, simulated_displacement: [f64; D], error_norm: f64) {
        self.simulated_displacement = simulated_displacement;
        self.error_norm = error_norm;
    }
}
