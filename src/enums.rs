use crate::geometry::Vector3;

/// Canonical patient-space viewing planes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    /// Canonical plane whose normal is closest to `normal`. Axial wins ties.
    pub fn closest_to(normal: &Vector3) -> Self {
        let n = normal.abs();
        if n.z >= n.x && n.z >= n.y {
            Orientation::Axial
        } else if n.y >= n.x {
            Orientation::Coronal
        } else {
            Orientation::Sagittal
        }
    }
}

/// In-plane axis of a cutting plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// How a cutting plane relates to the slicing normal of a structure set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionKind {
    /// The cutting plane is parallel to the contours.
    Axial,
    /// The slicing normal lies along the given axis of the cutting plane
    /// (e.g. coronal or sagittal view of axial contours).
    Orthogonal(Axis),
    Oblique,
}
