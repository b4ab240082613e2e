use crate::{
    coordinate_system::CoordinateSystem3D,
    enums::Axis,
    extent::Extent2D,
    geometry::{self, Point2, Point3, Vector3},
    referenced_slice::ReferencedSliceRegistry,
    slabs::SlabRectangle,
};

use tracing::warn;

/// Open or closed sequence of points in the frame of a cutting plane.
pub type Chain = Vec<Point2>;

/// What a polygon knows about the slice it was drawn on.
#[derive(Clone, Debug)]
struct SliceLink {
    geometry: CoordinateSystem3D,
    projection_along_normal: f64,
    thickness: f64,
    // In the frame of `geometry`.
    extent: Extent2D,
}

impl SliceLink {
    fn contains(&self, point: &Point3) -> bool {
        geometry::is_near(
            self.geometry.project_along_normal(point),
            self.projection_along_normal,
            self.thickness / 2.0,
        )
    }
}

#[derive(Clone, Debug, Default)]
enum LinkState {
    #[default]
    Unlinked,
    Linked(SliceLink),
}

/// One closed planar contour of a structure, drawn on the image instance
/// identified by `sop_instance_uid`.
///
/// The points never change after parsing. Everything geometric is only
/// available once the polygon has been linked to its referenced slice with
/// [`Polygon::update_referenced_slice`]; before that, geometry queries
/// answer "not visible".
#[derive(Clone, Debug)]
pub struct Polygon {
    sop_instance_uid: String,
    points: Vec<Point3>,
    state: LinkState,
}

impl Polygon {
    pub fn new(sop_instance_uid: impl Into<String>) -> Self {
        Self {
            sop_instance_uid: sop_instance_uid.into(),
            points: Vec::new(),
            state: LinkState::Unlinked,
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.points.reserve(additional);
    }

    /// Appends a contour point.
    ///
    /// Once linked, points lying outside the slab of the referenced slice
    /// are rejected and `false` is returned.
    pub fn add_point(&mut self, point: Point3) -> bool {
        if let LinkState::Linked(link) = &mut self.state {
            if !link.contains(&point) {
                warn!(
                    sop_instance_uid = %self.sop_instance_uid,
                    "Ignoring contour point lying off its referenced slice"
                );
                return false;
            }

            let local = link.geometry.project_point(&point);
            link.extent.add_point(local.x, local.y);
        }

        self.points.push(point);
        true
    }

    /// Links the polygon to its slice if the registry knows it. Linking
    /// happens once; later calls are no-ops returning `true`.
    pub fn update_referenced_slice(&mut self, slices: &ReferencedSliceRegistry) -> bool {
        if self.is_linked() {
            return true;
        }

        let Some(slice) = slices.get(&self.sop_instance_uid) else {
            return false;
        };

        let geometry = slice.geometry().clone();
        let mut link = SliceLink {
            projection_along_normal: geometry.project_along_normal(geometry.origin()),
            thickness: slice.thickness(),
            extent: Extent2D::default(),
            geometry,
        };

        let mut off_slice = 0usize;
        for point in &self.points {
            if link.contains(point) {
                let local = link.geometry.project_point(point);
                link.extent.add_point(local.x, local.y);
            } else {
                off_slice += 1;
            }
        }

        if off_slice > 0 {
            warn!(
                sop_instance_uid = %self.sop_instance_uid,
                off_slice,
                tolerance = link.thickness / 2.0,
                "RT-STRUCT contour has points lying off the slice of its instance"
            );
        }

        self.state = LinkState::Linked(link);
        true
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.state, LinkState::Linked(_))
    }

    pub fn sop_instance_uid(&self) -> &str {
        &self.sop_instance_uid
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Geometry of the referenced slice, once linked.
    pub fn geometry(&self) -> Option<&CoordinateSystem3D> {
        self.link().map(|link| &link.geometry)
    }

    pub fn slice_thickness(&self) -> Option<f64> {
        self.link().map(|link| link.thickness)
    }

    /// Bounding box of the on-slice points, in the frame of the referenced
    /// slice.
    pub fn extent(&self) -> Option<&Extent2D> {
        self.link().map(|link| &link.extent)
    }

    fn link(&self) -> Option<&SliceLink> {
        match &self.state {
            LinkState::Linked(link) => Some(link),
            LinkState::Unlinked => None,
        }
    }

    /// Normal of the plane holding the contour, oriented towards +Z, or
    /// `None` if the points are collinear or not coplanar.
    pub fn plane_normal(&self) -> Option<Vector3> {
        if self.points.len() < 3 {
            return None;
        }

        let normal = self.points.windows(3).find_map(|w| {
            let normal = (w[1] - w[0]).cross(&(w[2] - w[0]));
            let norm = normal.norm();
            (!geometry::is_close_to_zero(norm)).then(|| normal / norm)
        })?;

        let reference = geometry::project_along_normal(&self.points[0], &normal);
        let planar = self.points[1..]
            .iter()
            .all(|p| geometry::approx_eq(geometry::project_along_normal(p, &normal), reference));

        if !planar {
            return None;
        }

        Some(if normal.z < 0.0 { -normal } else { normal })
    }

    /// Whether the cutting plane falls within the slab of this polygon.
    ///
    /// The slice of the polygon must be parallel (or opposite) to both the
    /// cutting plane and the estimated normal, and the cutting plane must lie
    /// within half the estimated thickness of the slice, measured along the
    /// estimated normal.
    pub fn is_on_slice(
        &self,
        cutting_plane: &CoordinateSystem3D,
        estimated_normal: &Vector3,
        estimated_slice_thickness: f64,
    ) -> bool {
        let Some(link) = self.link() else {
            return false;
        };

        if self.points.is_empty()
            || !geometry::is_parallel_or_opposite(cutting_plane.normal(), link.geometry.normal())
            || !geometry::is_parallel_or_opposite(link.geometry.normal(), estimated_normal)
        {
            return false;
        }

        let cut = geometry::project_along_normal(cutting_plane.origin(), estimated_normal);
        let own = geometry::project_along_normal(link.geometry.origin(), estimated_normal);
        geometry::is_near(cut, own, estimated_slice_thickness / 2.0)
    }

    /// Closed chain of the contour expressed in the frame of the cutting
    /// plane (the first point is repeated at the end), or `None` if the
    /// polygon is not on that plane.
    pub fn project(
        &self,
        cutting_plane: &CoordinateSystem3D,
        estimated_normal: &Vector3,
        estimated_slice_thickness: f64,
    ) -> Option<Chain> {
        if !self.is_on_slice(cutting_plane, estimated_normal, estimated_slice_thickness) {
            return None;
        }

        let mut chain: Chain = self
            .points
            .iter()
            .map(|p| cutting_plane.project_point(p))
            .collect();
        chain.push(chain[0]);
        Some(chain)
    }

    /// Intersections of the contour edges with a plane. The closing edge is
    /// included; a vertex lying on the plane counts on its non-positive side
    /// so that every crossing is reported once.
    fn edge_crossings(&self, plane: &CoordinateSystem3D) -> Vec<Point3> {
        let Some(last) = self.points.last() else {
            return Vec::new();
        };

        let mut crossings = Vec::new();
        let mut previous = last;
        let mut previous_distance = plane.signed_distance(previous);

        for current in &self.points {
            let distance = plane.signed_distance(current);

            if (previous_distance > 0.0) != (distance > 0.0) {
                let t = previous_distance / (previous_distance - distance);
                crossings.push(*previous + (*current - *previous) * t);
            }

            previous = current;
            previous_distance = distance;
        }

        crossings
    }

    /// Rectangle swept on a cutting plane orthogonal to the contours: the
    /// segment where the plane crosses the polygon, thickened by the slice
    /// thickness along `slab_axis`, the axis of the cutting plane parallel
    /// to the estimated normal.
    pub fn project_slab(
        &self,
        cutting_plane: &CoordinateSystem3D,
        estimated_normal: &Vector3,
        estimated_slice_thickness: f64,
        slab_axis: Axis,
    ) -> Option<SlabRectangle> {
        let link = self.link()?;

        if self.points.len() <= 1
            || !geometry::is_parallel_or_opposite(link.geometry.normal(), estimated_normal)
        {
            return None;
        }

        // Cheap rejection when the cut is aligned with the slice axes.
        let origin = link.geometry.project_point(cutting_plane.origin());
        if geometry::is_parallel_or_opposite(cutting_plane.normal(), link.geometry.axis_y())
            && !link.extent.contains_y(origin.y)
        {
            return None;
        }
        if geometry::is_parallel_or_opposite(cutting_plane.normal(), link.geometry.axis_x())
            && !link.extent.contains_x(origin.x)
        {
            return None;
        }

        let crossings = self.edge_crossings(cutting_plane);
        if crossings.is_empty() {
            return None;
        }

        let along = |p: Point2| match slab_axis {
            Axis::X => p.y,
            Axis::Y => p.x,
        };
        let across = |p: Point2| match slab_axis {
            Axis::X => p.x,
            Axis::Y => p.y,
        };

        let (along_min, along_max) = crossings
            .iter()
            .map(|p| along(cutting_plane.project_point(p)))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

        let center = across(cutting_plane.project_point(link.geometry.origin()));
        let half = estimated_slice_thickness / 2.0;

        Some(SlabRectangle {
            along_min,
            along_max,
            across_min: center - half,
            across_max: center + half,
        })
    }

    /// Segments where an arbitrary cutting plane crosses the inside of the
    /// polygon, in the frame of the cutting plane. Polygons whose slice is
    /// not parallel to the estimated normal produce nothing.
    pub fn cut(
        &self,
        cutting_plane: &CoordinateSystem3D,
        estimated_normal: &Vector3,
    ) -> Vec<[Point2; 2]> {
        let Some(link) = self.link() else {
            return Vec::new();
        };
        if !geometry::is_parallel_or_opposite(link.geometry.normal(), estimated_normal) {
            return Vec::new();
        }

        let direction = cutting_plane.normal().cross(link.geometry.normal());
        if geometry::is_close_to_zero(direction.norm()) {
            return Vec::new();
        }

        let direction = (direction.dot(cutting_plane.axis_x()), direction.dot(cutting_plane.axis_y()));

        let mut crossings: Vec<(f64, Point2)> = self
            .edge_crossings(cutting_plane)
            .iter()
            .map(|p| {
                let local = cutting_plane.project_point(p);
                (local.x * direction.0 + local.y * direction.1, local)
            })
            .collect();
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        crossings
            .chunks_exact(2)
            .map(|pair| [pair[0].1, pair[1].1])
            .collect()
    }
}
