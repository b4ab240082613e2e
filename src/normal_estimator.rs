use crate::{
    config::GeometryOptions,
    geometry::{self, Point3, Vector3},
};

use tracing::debug;

/// One observation fed to the estimator: the origin and normal of a
/// referenced slice (or of a contour plane), and the DICOM thickness when
/// known.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceSample {
    pub origin: Point3,
    pub normal: Vector3,
    pub thickness: Option<f64>,
}

/// Slicing geometry shared by a structure set.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryEstimate {
    normal: Vector3,
    slice_thickness: f64,
    retained: usize,
    rejected: Vec<usize>,
}

impl GeometryEstimate {
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Slice thickness in millimeters.
    pub fn slice_thickness(&self) -> f64 {
        self.slice_thickness
    }

    /// Number of samples agreeing with the normal.
    pub fn retained(&self) -> usize {
        self.retained
    }

    /// Indices of the samples whose normal disagreed and were left out.
    pub fn rejected(&self) -> &[usize] {
        &self.rejected
    }
}

#[derive(Clone, Debug)]
struct Candidate {
    normal: Vector3,
    count: usize,
}

/// Majority vote over slice normals.
///
/// Normals are compared to the candidates seen so far, parallel and
/// opposite directions voting together. A normal wins when every slice, or
/// every slice but one, agrees with it. Tracking stops once more than
/// `max_candidates` distinct directions show up, in which case no normal is
/// selected.
#[derive(Clone, Debug)]
pub struct NormalEstimator {
    candidates: Vec<Candidate>,
    total: usize,
    max_candidates: usize,
    abandoned: bool,
}

impl NormalEstimator {
    pub fn new(max_candidates: usize) -> Self {
        Self {
            candidates: Vec::with_capacity(max_candidates),
            total: 0,
            max_candidates,
            abandoned: false,
        }
    }

    pub fn add_normal(&mut self, normal: &Vector3) {
        self.total += 1;

        if self.abandoned {
            return;
        }

        if let Some(candidate) = self
            .candidates
            .iter_mut()
            .find(|candidate| geometry::is_parallel_or_opposite(&candidate.normal, normal))
        {
            candidate.count += 1;
        } else if self.candidates.len() >= self.max_candidates {
            self.abandoned = true;
        } else {
            self.candidates.push(Candidate {
                normal: *normal,
                count: 1,
            });
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// The normal shared by all samples, or by all but one. Two samples that
    /// disagree tie, and a tie selects nothing.
    pub fn select_normal(&self) -> Option<Vector3> {
        if self.abandoned {
            return None;
        }

        let mut qualifying = self
            .candidates
            .iter()
            .filter(|candidate| candidate.count + 1 >= self.total);
        match (qualifying.next(), qualifying.next()) {
            (Some(candidate), None) => Some(candidate.normal),
            _ => None,
        }
    }

    /// Selects the slicing normal of the samples, drops those that disagree
    /// with it, and measures the slice thickness as the mean gap between the
    /// distinct positions of the remaining samples along the normal.
    pub fn estimate(samples: &[SliceSample], options: &GeometryOptions) -> Option<GeometryEstimate> {
        if samples.len() < options.min_slices.max(1) {
            debug!(samples = samples.len(), "Too few slices to estimate the geometry");
            return None;
        }

        let mut estimator = Self::new(options.max_normal_candidates);
        for sample in samples {
            estimator.add_normal(&sample.normal);
        }

        let Some(normal) = estimator.select_normal() else {
            debug!(samples = samples.len(), "No majority normal among the slices");
            return None;
        };

        let (kept, rejected): (Vec<_>, Vec<_>) = samples
            .iter()
            .enumerate()
            .partition(|(_, sample)| geometry::is_parallel_or_opposite(&sample.normal, &normal));

        let positions: Vec<f64> = kept
            .iter()
            .map(|(_, sample)| geometry::project_along_normal(&sample.origin, &normal))
            .collect();

        let dicom_thicknesses: Vec<f64> = kept
            .iter()
            .filter_map(|(_, sample)| sample.thickness)
            .filter(|thickness| *thickness > 0.0)
            .collect();

        let slice_thickness = geometry::mean(&geometry::distinct_gaps(positions))
            .or_else(|| geometry::mean(&dicom_thicknesses))
            .unwrap_or(options.default_slice_thickness);

        let estimate = GeometryEstimate {
            normal,
            slice_thickness,
            retained: kept.len(),
            rejected: rejected.into_iter().map(|(index, _)| index).collect(),
        };

        debug!(
            normal = ?estimate.normal,
            slice_thickness,
            retained = estimate.retained,
            rejected = estimate.rejected.len(),
            "Estimated structure set geometry"
        );

        Some(estimate)
    }
}
