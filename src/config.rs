use crate::referenced_slice::DEFAULT_THICKNESS;

/// Tuning of the slicing normal and thickness estimation.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryOptions {
    /// Distinct normals tracked before the estimation is abandoned. The
    /// majority rule tolerates a single outlier, so two candidates are
    /// enough to decide; larger values only delay the failure.
    pub max_normal_candidates: usize,
    /// Fewest samples (slices or contours) accepted for an estimation.
    pub min_slices: usize,
    /// Thickness used when spacing cannot be measured (mm).
    pub default_slice_thickness: f64,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            max_normal_candidates: 2,
            min_slices: 1,
            default_slice_thickness: DEFAULT_THICKNESS,
        }
    }
}

impl GeometryOptions {
    pub fn with_max_normal_candidates(mut self, max_normal_candidates: usize) -> Self {
        self.max_normal_candidates = max_normal_candidates.max(1);
        self
    }

    pub fn with_min_slices(mut self, min_slices: usize) -> Self {
        self.min_slices = min_slices.max(1);
        self
    }

    pub fn with_default_slice_thickness(mut self, thickness: f64) -> Self {
        self.default_slice_thickness = thickness;
        self
    }
}
