use crate::{
    enums::Orientation,
    error::GeometryError,
    geometry::{self, Point2, Point3, Vector3},
};

use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use std::fmt;

/// An oriented plane in patient space: an origin, two orthonormal in-plane
/// axes and their cross product as normal.
///
/// Describes both the geometry of an image slice and the cutting plane
/// requested by a viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateSystem3D {
    origin: Point3,
    axis_x: Vector3,
    axis_y: Vector3,
    normal: Vector3,
    // Plane equation: normal . p + d == 0
    d: f64,
}

impl Default for CoordinateSystem3D {
    fn default() -> Self {
        Self::canonical()
    }
}

impl CoordinateSystem3D {
    /// Creates a coordinate system from an origin and two direction cosines.
    ///
    /// # Errors
    ///
    /// DICOM requires the row and column direction cosines to be unit and
    /// orthogonal; anything else is rejected.
    pub fn new(origin: Point3, axis_x: Vector3, axis_y: Vector3) -> Result<Self, GeometryError> {
        if !geometry::approx_eq(axis_x.norm(), 1.0) || !geometry::approx_eq(axis_y.norm(), 1.0) {
            return Err(GeometryError::NotUnitAxes);
        }

        if !geometry::is_close_to_zero(axis_x.dot(&axis_y)) {
            return Err(GeometryError::NotOrthogonal);
        }

        let normal = axis_x.cross(&axis_y);
        if !geometry::approx_eq(normal.norm(), 1.0) {
            return Err(GeometryError::DegenerateNormal);
        }

        let d = -normal.dot(&origin.coords);

        Ok(Self {
            origin,
            axis_x,
            axis_y,
            normal,
            d,
        })
    }

    /// The plane `z = 0` with the patient X and Y axes.
    pub fn canonical() -> Self {
        Self {
            origin: Point3::origin(),
            axis_x: Vector3::x(),
            axis_y: Vector3::y(),
            normal: Vector3::z(),
            d: 0.0,
        }
    }

    /// Canonical viewing plane going through `center`.
    pub fn from_orientation(orientation: Orientation, center: Point3) -> Self {
        let (axis_x, axis_y) = match orientation {
            Orientation::Axial => (Vector3::x(), Vector3::y()),
            Orientation::Coronal => (Vector3::x(), -Vector3::z()),
            Orientation::Sagittal => (Vector3::y(), -Vector3::z()),
        };
        let normal = axis_x.cross(&axis_y);

        Self {
            origin: center,
            axis_x,
            axis_y,
            normal,
            d: -normal.dot(&center.coords),
        }
    }

    /// Builds the plane from Image Position (Patient) and the six values of
    /// Image Orientation (Patient).
    pub fn from_position_orientation(
        position: &[f64],
        orientation: &[f64],
    ) -> Result<Self, GeometryError> {
        let origin = geometry::to_point(position)?;

        let [xx, xy, xz, yx, yy, yz] = orientation else {
            return Err(GeometryError::WrongLength {
                expected: 6,
                found: orientation.len(),
            });
        };

        Self::new(
            origin,
            Vector3::new(*xx, *xy, *xz),
            Vector3::new(*yx, *yy, *yz),
        )
    }

    /// Builds the plane from the raw DICOM strings of Image Position
    /// (Patient) and Image Orientation (Patient).
    pub fn from_dicom_strings(
        image_position_patient: &str,
        image_orientation_patient: &str,
    ) -> Result<Self, GeometryError> {
        let position = geometry::parse_vector(image_position_patient)?;
        let orientation = geometry::parse_vector(image_orientation_patient)?;
        Self::from_position_orientation(&position, &orientation)
    }

    /// Reads the slice geometry of an image instance. Instances without
    /// position or orientation get the canonical plane.
    pub fn from_dataset(dataset: &InMemDicomObject) -> Result<Self, GeometryError> {
        let (Some(position), Some(orientation)) = (
            dataset.get(tags::IMAGE_POSITION_PATIENT),
            dataset.get(tags::IMAGE_ORIENTATION_PATIENT),
        ) else {
            return Ok(Self::canonical());
        };

        let position = position
            .to_multi_float64()
            .map_err(|_| GeometryError::MalformedTag(tags::IMAGE_POSITION_PATIENT))?;
        let orientation = orientation
            .to_multi_float64()
            .map_err(|_| GeometryError::MalformedTag(tags::IMAGE_ORIENTATION_PATIENT))?;

        Self::from_position_orientation(&position, &orientation)
    }

    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    pub fn axis_x(&self) -> &Vector3 {
        &self.axis_x
    }

    pub fn axis_y(&self) -> &Vector3 {
        &self.axis_y
    }

    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Same axes, moved to another origin.
    pub fn with_origin(&self, origin: Point3) -> Self {
        Self {
            origin,
            d: -self.normal.dot(&origin.coords),
            ..self.clone()
        }
    }

    pub fn map_slice_to_world(&self, x: f64, y: f64) -> Point3 {
        self.origin + self.axis_x * x + self.axis_y * y
    }

    pub fn project_along_normal(&self, point: &Point3) -> f64 {
        geometry::project_along_normal(point, &self.normal)
    }

    /// Signed distance from the plane, positive on the side of the normal.
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        self.normal.dot(&point.coords) + self.d
    }

    /// Coordinates of `point` in the local 2D frame of the plane.
    ///
    /// The point is orthogonally projected on the plane first, which the
    /// orthonormal axes make implicit. Nothing checks that it lies close to
    /// the plane.
    pub fn project_point(&self, point: &Point3) -> Point2 {
        let offset = *point - self.origin;
        Point2::new(self.axis_x.dot(&offset), self.axis_y.dot(&offset))
    }

    /// Intersection of the line `origin + t * direction` with the plane, or
    /// `None` when they are parallel.
    pub fn intersect_line(&self, origin: &Point3, direction: &Vector3) -> Option<Point3> {
        let denominator = self.normal.dot(direction);
        if geometry::is_close_to_zero(denominator) {
            return None;
        }

        let t = -self.signed_distance(origin) / denominator;
        Some(*origin + direction * t)
    }

    /// Intersection of the segment `[from, to]` with the plane.
    pub fn intersect_segment(&self, from: &Point3, to: &Point3) -> Option<Point3> {
        let a = self.signed_distance(from);
        let b = self.signed_distance(to);

        if (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0) || geometry::is_close_to_zero(a - b) {
            return None;
        }

        let t = a / (a - b);
        Some(*from + (*to - *from) * t)
    }

    /// Distance between two parallel (or opposite) planes, `None` otherwise.
    pub fn distance(a: &Self, b: &Self) -> Option<f64> {
        geometry::parallelism(&a.normal, &b.normal)
            .map(|_| (a.project_along_normal(&a.origin) - a.project_along_normal(&b.origin)).abs())
    }
}

impl fmt::Display for CoordinateSystem3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "origin: ({}, {}, {}) normal: ({}, {}, {}) axis x: ({}, {}, {}) axis y: ({}, {}, {})",
            self.origin.x,
            self.origin.y,
            self.origin.z,
            self.normal.x,
            self.normal.y,
            self.normal.z,
            self.axis_x.x,
            self.axis_x.y,
            self.axis_x.z,
            self.axis_y.x,
            self.axis_y.y,
            self.axis_y.z,
        )
    }
}
