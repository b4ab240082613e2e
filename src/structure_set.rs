use crate::{
    config::GeometryOptions,
    coordinate_system::CoordinateSystem3D,
    enums::{Axis, ProjectionKind},
    error::StructureSetError,
    geometry::{self, Point2, Point3, Vector3},
    layer::PolylineSink,
    normal_estimator::{GeometryEstimate, NormalEstimator, SliceSample},
    polygon::{Chain, Polygon},
    referenced_slice::{ReferencedSlice, ReferencedSliceRegistry},
    slabs,
    structure::{Color, Structure},
};

use dicom::{core::Tag, object::InMemDicomObject};
use dicom_dictionary_std::tags;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};
use web_time::Instant;

pub const STRUCTURE_SET_ROI_SEQUENCE: Tag = Tag(0x3006, 0x0020);
pub const ROI_NAME: Tag = Tag(0x3006, 0x0026);
pub const ROI_DISPLAY_COLOR: Tag = Tag(0x3006, 0x002a);
pub const ROI_CONTOUR_SEQUENCE: Tag = Tag(0x3006, 0x0039);
pub const CONTOUR_SEQUENCE: Tag = Tag(0x3006, 0x0040);
pub const CONTOUR_IMAGE_SEQUENCE: Tag = Tag(0x3006, 0x0016);
pub const CONTOUR_GEOMETRIC_TYPE: Tag = Tag(0x3006, 0x0042);
pub const NUMBER_OF_CONTOUR_POINTS: Tag = Tag(0x3006, 0x0046);
pub const CONTOUR_DATA: Tag = Tag(0x3006, 0x0050);
pub const RT_ROI_OBSERVATIONS_SEQUENCE: Tag = Tag(0x3006, 0x0080);
pub const RT_ROI_INTERPRETED_TYPE: Tag = Tag(0x3006, 0x00a4);

const DEFAULT_INTERPRETATION: &str = "No interpretation";
const DEFAULT_NAME: &str = "No name";
const CLOSED_PLANAR: &str = "CLOSED_PLANAR";

/// Where the structure set stands regarding its slicing geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum GeometryStatus {
    /// Not estimated yet.
    #[default]
    Pending,
    Estimated(GeometryEstimate),
    /// No majority normal could be found: nothing is visible on any plane.
    Unavailable,
}

/// An RT-STRUCT instance: its structures, the slices their contours were
/// drawn on, and the slicing geometry shared by all contours.
///
/// Parsing happens in [`DicomStructureSet::new`]. The geometry of the
/// referenced slices is not part of the RT-STRUCT and has to be supplied
/// through [`DicomStructureSet::add_referenced_slice`] before calling
/// [`DicomStructureSet::check_referenced_slices`]. Contours whose slice never
/// arrives are left out of every projection.
#[derive(Clone, Debug)]
pub struct DicomStructureSet {
    structures: Vec<Structure>,
    referenced_slices: ReferencedSliceRegistry,
    geometry: GeometryStatus,
    names: HashMap<String, usize>,
    options: GeometryOptions,
}

impl DicomStructureSet {
    /// Parses an RT-STRUCT dataset with the default [`GeometryOptions`].
    ///
    /// # Errors
    ///
    /// Returns error if a mandatory sequence or tag is missing or malformed.
    pub fn new(dataset: &InMemDicomObject) -> Result<Self, StructureSetError> {
        Self::with_options(dataset, GeometryOptions::default())
    }

    pub fn with_options(
        dataset: &InMemDicomObject,
        options: GeometryOptions,
    ) -> Result<Self, StructureSetError> {
        let mut structure_set = Self {
            structures: Vec::new(),
            referenced_slices: ReferencedSliceRegistry::new(),
            geometry: GeometryStatus::Pending,
            names: HashMap::new(),
            options,
        };
        structure_set.setup(dataset)?;
        Ok(structure_set)
    }

    fn setup(&mut self, dataset: &InMemDicomObject) -> Result<(), StructureSetError> {
        let start = Instant::now();

        let observations = sequence(dataset, RT_ROI_OBSERVATIONS_SEQUENCE)?;
        let contours = sequence(dataset, ROI_CONTOUR_SEQUENCE)?;
        let rois = sequence(dataset, STRUCTURE_SET_ROI_SEQUENCE)?;

        if observations.len() != contours.len() || contours.len() != rois.len() {
            return Err(StructureSetError::SequenceSizeMismatch {
                observations: observations.len(),
                contours: contours.len(),
                rois: rois.len(),
            });
        }

        self.structures.reserve(rois.len());

        for (index, ((observation, contour), roi)) in
            observations.iter().zip(contours).zip(rois).enumerate()
        {
            let interpretation = optional_string(observation, RT_ROI_INTERPRETED_TYPE)
                .unwrap_or_else(|| DEFAULT_INTERPRETATION.to_owned());
            let name =
                optional_string(roi, ROI_NAME).unwrap_or_else(|| DEFAULT_NAME.to_owned());

            let color = match contour.get(ROI_DISPLAY_COLOR) {
                Some(element) => element
                    .to_multi_float64()
                    .ok()
                    .and_then(|components| Color::from_components(&components))
                    .ok_or(StructureSetError::MalformedTag(ROI_DISPLAY_COLOR))?,
                None => Color::default(),
            };

            let mut structure = Structure::new(name, interpretation, color);

            let items = contour
                .get(CONTOUR_SEQUENCE)
                .and_then(|element| element.items())
                .unwrap_or_default();

            for (contour_index, item) in items.iter().enumerate() {
                if let Some(polygon) = parse_polygon(item, index, contour_index)? {
                    structure.push_polygon(polygon);
                }
            }

            info!(
                index,
                name = structure.name(),
                interpretation = structure.interpretation(),
                polygons = structure.polygons().len(),
                color = ?structure.color(),
                "New RT structure"
            );

            self.names.entry(structure.name().to_owned()).or_insert(index);
            self.structures.push(structure);
        }

        self.estimate_geometry();

        debug!(
            structures = self.structures.len(),
            elapsed = ?start.elapsed(),
            "Parsed RT-STRUCT"
        );

        Ok(())
    }

    pub fn structures_count(&self) -> usize {
        self.structures.len()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn structure(&self, index: usize) -> &Structure {
        match self.structures.get(index) {
            Some(structure) => structure,
            None => panic!(
                "structure index {index} out of range (structure set has {} structures)",
                self.structures.len()
            ),
        }
    }

    pub fn try_structure(&self, index: usize) -> Option<&Structure> {
        self.structures.get(index)
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    pub fn structure_name(&self, index: usize) -> &str {
        self.structure(index).name()
    }

    pub fn structure_interpretation(&self, index: usize) -> &str {
        self.structure(index).interpretation()
    }

    pub fn structure_color(&self, index: usize) -> Color {
        self.structure(index).color()
    }

    pub fn structure_center(&self, index: usize) -> Point3 {
        self.structure(index).center()
    }

    /// Contours of a structure drawn on one image instance.
    pub fn structure_points<'a>(
        &'a self,
        index: usize,
        sop_instance_uid: &'a str,
    ) -> impl Iterator<Item = &'a [Point3]> + 'a {
        self.structure(index).points_on_instance(sop_instance_uid)
    }

    /// Index of the first structure with that name.
    pub fn lookup_structure_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn structure_names(&self) -> impl Iterator<Item = &str> {
        self.structures.iter().map(Structure::name)
    }

    /// SOP Instance UIDs of all images the contours were drawn on.
    pub fn referenced_instances(&self) -> BTreeSet<String> {
        self.polygons()
            .map(Polygon::sop_instance_uid)
            .filter(|uid| !uid.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn referenced_slices(&self) -> &ReferencedSliceRegistry {
        &self.referenced_slices
    }

    /// Registers the geometry of a referenced image and links the contours
    /// drawn on it. Returns `Ok(false)` if the instance was already known.
    ///
    /// # Errors
    ///
    /// Returns error if the slice belongs to another series than the slices
    /// registered before, or if its thickness is negative.
    pub fn add_referenced_slice(
        &mut self,
        sop_instance_uid: &str,
        series_instance_uid: &str,
        geometry: CoordinateSystem3D,
        thickness: f64,
    ) -> Result<bool, StructureSetError> {
        self.add_resolved_slice(
            sop_instance_uid,
            ReferencedSlice::new(series_instance_uid, geometry, thickness),
        )
    }

    pub fn add_resolved_slice(
        &mut self,
        sop_instance_uid: &str,
        slice: ReferencedSlice,
    ) -> Result<bool, StructureSetError> {
        if !self.referenced_slices.insert(sop_instance_uid, slice)? {
            return Ok(false);
        }

        let slices = &self.referenced_slices;
        for polygon in self
            .structures
            .iter_mut()
            .flat_map(|structure| structure.polygons_mut().iter_mut())
            .filter(|polygon| polygon.sop_instance_uid() == sop_instance_uid)
        {
            polygon.update_referenced_slice(slices);
        }

        Ok(true)
    }

    /// Registers a referenced image from its DICOM header.
    pub fn add_referenced_slice_from_dataset(
        &mut self,
        dataset: &InMemDicomObject,
    ) -> Result<bool, StructureSetError> {
        let (sop_instance_uid, slice) = ReferencedSlice::from_dataset(dataset)?;
        self.add_resolved_slice(&sop_instance_uid, slice)
    }

    /// Links every contour to its slice and estimates the slicing geometry.
    ///
    /// Meant to be called once all referenced instances were supplied, or
    /// once their resolution gave up. Can be called again after more slices
    /// arrived.
    pub fn check_referenced_slices(&mut self) {
        let slices = &self.referenced_slices;
        let mut unresolved = BTreeSet::new();
        let mut empty = 0usize;

        for polygon in self
            .structures
            .iter_mut()
            .flat_map(|structure| structure.polygons_mut().iter_mut())
        {
            if polygon.update_referenced_slice(slices) {
                continue;
            }

            if polygon.sop_instance_uid().is_empty() {
                empty += 1;
            } else {
                unresolved.insert(polygon.sop_instance_uid().to_owned());
            }
        }

        if empty > 0 {
            warn!(
                contours = empty,
                "RT-STRUCT contours without Referenced SOP Instance UID"
            );
        }
        for sop_instance_uid in &unresolved {
            warn!(%sop_instance_uid, "RT-STRUCT references a missing instance");
        }

        self.estimate_geometry();
    }

    fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        self.structures
            .iter()
            .flat_map(|structure| structure.polygons().iter())
    }

    /// Uses the registered slices if there are any, the contour planes
    /// otherwise.
    fn estimate_geometry(&mut self) {
        let samples: Vec<SliceSample> = if self.referenced_slices.is_empty() {
            self.polygons()
                .filter_map(|polygon| {
                    Some(SliceSample {
                        normal: polygon.plane_normal()?,
                        origin: *polygon.points().first()?,
                        thickness: None,
                    })
                })
                .collect()
        } else {
            self.referenced_slices
                .iter()
                .map(|(_, slice)| SliceSample {
                    origin: *slice.geometry().origin(),
                    normal: *slice.geometry().normal(),
                    thickness: Some(slice.thickness()),
                })
                .collect()
        };

        self.geometry = match NormalEstimator::estimate(&samples, &self.options) {
            Some(estimate) => GeometryStatus::Estimated(estimate),
            None => {
                warn!(
                    samples = samples.len(),
                    "Cannot estimate the slicing geometry of the structure set"
                );
                GeometryStatus::Unavailable
            }
        };
    }

    pub fn geometry_status(&self) -> &GeometryStatus {
        &self.geometry
    }

    fn estimate(&self) -> Option<&GeometryEstimate> {
        match &self.geometry {
            GeometryStatus::Estimated(estimate) => Some(estimate),
            GeometryStatus::Pending | GeometryStatus::Unavailable => None,
        }
    }

    pub fn is_geometry_available(&self) -> bool {
        self.estimate().is_some()
    }

    pub fn estimated_normal(&self) -> Option<Vector3> {
        self.estimate().map(|estimate| *estimate.normal())
    }

    pub fn estimated_slice_thickness(&self) -> Option<f64> {
        self.estimate().map(GeometryEstimate::slice_thickness)
    }

    /// Normal of the first referenced slice, or +Z when none is known.
    ///
    /// This is the acquisition direction as stored in the files, independent
    /// of geometry estimation. Viewers pick their default plane from it. It
    /// differs from [`Self::estimated_normal`] when the first slice is an
    /// outlier.
    pub fn normal(&self) -> Vector3 {
        self.referenced_slices
            .iter()
            .next()
            .map_or_else(Vector3::z, |(_, slice)| *slice.geometry().normal())
    }

    /// How a cutting plane relates to the estimated slicing normal.
    pub fn projection_kind(&self, cutting_plane: &CoordinateSystem3D) -> Option<ProjectionKind> {
        let normal = self.estimate()?.normal();

        let kind = if geometry::is_parallel_or_opposite(cutting_plane.normal(), normal) {
            ProjectionKind::Axial
        } else if geometry::is_parallel_or_opposite(cutting_plane.axis_x(), normal) {
            ProjectionKind::Orthogonal(Axis::X)
        } else if geometry::is_parallel_or_opposite(cutting_plane.axis_y(), normal) {
            ProjectionKind::Orthogonal(Axis::Y)
        } else {
            ProjectionKind::Oblique
        };

        Some(kind)
    }

    /// Chains of a structure visible on the cutting plane, in the frame of
    /// the plane, or `None` when nothing is visible.
    ///
    /// On a plane parallel to the contours, each contour within half a slice
    /// of the plane gives one closed chain. On a plane orthogonal to the
    /// contours, the outline of the stacked slabs is returned as 2-point
    /// segments. On any other plane, the segments where the plane crosses
    /// the contours are returned.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn project_structure(
        &self,
        index: usize,
        cutting_plane: &CoordinateSystem3D,
    ) -> Option<Vec<Chain>> {
        self.project(index, cutting_plane).map(|(_, chains)| chains)
    }

    fn project(
        &self,
        index: usize,
        cutting_plane: &CoordinateSystem3D,
    ) -> Option<(ProjectionKind, Vec<Chain>)> {
        let structure = self.structure(index);
        let estimate = self.estimate()?;
        let kind = self.projection_kind(cutting_plane)?;
        let normal = estimate.normal();
        let thickness = estimate.slice_thickness();

        let chains: Vec<Chain> = match kind {
            ProjectionKind::Axial => structure
                .polygons()
                .iter()
                .filter_map(|polygon| polygon.project(cutting_plane, normal, thickness))
                .collect(),
            ProjectionKind::Orthogonal(axis) => {
                let rectangles: Vec<_> = structure
                    .polygons()
                    .iter()
                    .filter_map(|polygon| {
                        polygon.project_slab(cutting_plane, normal, thickness, axis)
                    })
                    .collect();

                slabs::outline(&rectangles)
                    .into_iter()
                    .map(|segment| {
                        segment
                            .iter()
                            .map(|&(along, across)| match axis {
                                Axis::X => Point2::new(across, along),
                                Axis::Y => Point2::new(along, across),
                            })
                            .collect()
                    })
                    .collect()
            }
            ProjectionKind::Oblique => structure
                .polygons()
                .iter()
                .flat_map(|polygon| polygon.cut(cutting_plane, normal))
                .map(Vec::from)
                .collect(),
        };

        (!chains.is_empty()).then_some((kind, chains))
    }

    /// Sends the chains of a structure to a sink, in the color of the
    /// structure. Returns whether anything was visible.
    pub fn project_onto_layer(
        &self,
        sink: &mut impl PolylineSink,
        cutting_plane: &CoordinateSystem3D,
        index: usize,
    ) -> bool {
        let color = self.structure_color(index);
        self.project_onto_layer_with_color(sink, cutting_plane, index, color)
    }

    pub fn project_onto_layer_with_color(
        &self,
        sink: &mut impl PolylineSink,
        cutting_plane: &CoordinateSystem3D,
        index: usize,
        color: Color,
    ) -> bool {
        let Some((kind, chains)) = self.project(index, cutting_plane) else {
            return false;
        };

        let closed = kind == ProjectionKind::Axial;
        for chain in &chains {
            sink.add_chain(chain, closed, color);
        }
        true
    }
}

fn sequence(
    dataset: &InMemDicomObject,
    tag: Tag,
) -> Result<&[InMemDicomObject], StructureSetError> {
    dataset
        .get(tag)
        .ok_or(StructureSetError::MissingSequence(tag))?
        .items()
        .ok_or(StructureSetError::MalformedTag(tag))
}

fn optional_string(dataset: &InMemDicomObject, tag: Tag) -> Option<String> {
    let value = dataset.get(tag)?.to_str().ok()?;
    let value = value.trim_end_matches(['\0', ' ']);
    (!value.is_empty()).then(|| value.to_owned())
}

/// Reads one item of the Contour Sequence. Contours other than
/// `CLOSED_PLANAR` are skipped.
fn parse_polygon(
    item: &InMemDicomObject,
    structure: usize,
    contour: usize,
) -> Result<Option<Polygon>, StructureSetError> {
    let geometric_type = optional_string(item, CONTOUR_GEOMETRIC_TYPE)
        .ok_or(StructureSetError::MissingTag(CONTOUR_GEOMETRIC_TYPE))?;

    if geometric_type != CLOSED_PLANAR {
        warn!(
            structure,
            contour,
            %geometric_type,
            "Ignoring RT-STRUCT contour that is not closed planar"
        );
        return Ok(None);
    }

    let images = item
        .get(CONTOUR_IMAGE_SEQUENCE)
        .and_then(|element| element.items())
        .unwrap_or_default();

    let [image] = images else {
        return Err(StructureSetError::ContourImageCount {
            structure,
            contour,
            found: images.len(),
        });
    };

    let sop_instance_uid =
        optional_string(image, tags::REFERENCED_SOP_INSTANCE_UID).unwrap_or_default();

    let declared: usize = item
        .get(NUMBER_OF_CONTOUR_POINTS)
        .ok_or(StructureSetError::MissingTag(NUMBER_OF_CONTOUR_POINTS))?
        .to_int::<u32>()
        .map_err(|_| StructureSetError::MalformedTag(NUMBER_OF_CONTOUR_POINTS))?
        as usize;

    let values = item
        .get(CONTOUR_DATA)
        .ok_or(StructureSetError::MissingTag(CONTOUR_DATA))?
        .to_multi_float64()
        .map_err(|_| StructureSetError::MalformedTag(CONTOUR_DATA))?;

    if values.len() != declared * 3 {
        return Err(StructureSetError::ContourDataLength {
            structure,
            contour,
            declared,
            values: values.len(),
        });
    }

    let mut polygon = Polygon::new(sop_instance_uid);
    polygon.reserve(declared);
    for point in values.chunks_exact(3) {
        polygon.add_point(Point3::new(point[0], point[1], point[2]));
    }

    Ok(Some(polygon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR, dicom_value, value::DataSetSequence};
    use dicom::object::mem::InMemElement;

    fn sequence_element(tag: Tag, items: Vec<InMemDicomObject>) -> InMemElement {
        DataElement::new(tag, VR::SQ, DataSetSequence::from(items))
    }

    fn contour_item(geometric_type: &str, images: usize, points: u32, data: &[f64]) -> InMemDicomObject {
        let image = InMemDicomObject::from_element_iter([DataElement::new(
            tags::REFERENCED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.1"),
        )]);

        InMemDicomObject::from_element_iter([
            sequence_element(CONTOUR_IMAGE_SEQUENCE, vec![image; images]),
            DataElement::new(CONTOUR_GEOMETRIC_TYPE, VR::CS, PrimitiveValue::from(geometric_type)),
            DataElement::new(NUMBER_OF_CONTOUR_POINTS, VR::IS, PrimitiveValue::from(points.to_string())),
            DataElement::new(
                CONTOUR_DATA,
                VR::DS,
                PrimitiveValue::Strs(data.iter().map(ToString::to_string).collect()),
            ),
        ])
    }

    fn dataset(contour: InMemDicomObject, color: Option<[&str; 3]>) -> InMemDicomObject {
        let mut roi_contour = vec![sequence_element(CONTOUR_SEQUENCE, vec![contour])];
        if let Some(color) = color {
            roi_contour.push(DataElement::new(
                ROI_DISPLAY_COLOR,
                VR::IS,
                dicom_value!(Strs, [color[0], color[1], color[2]]),
            ));
        }

        InMemDicomObject::from_element_iter([
            sequence_element(
                STRUCTURE_SET_ROI_SEQUENCE,
                vec![InMemDicomObject::new_empty()],
            ),
            sequence_element(
                ROI_CONTOUR_SEQUENCE,
                vec![InMemDicomObject::from_element_iter(roi_contour)],
            ),
            sequence_element(
                RT_ROI_OBSERVATIONS_SEQUENCE,
                vec![InMemDicomObject::new_empty()],
            ),
        ])
    }

    const SQUARE: [f64; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];

    #[test]
    fn test_defaults() {
        let set = DicomStructureSet::new(&dataset(contour_item("CLOSED_PLANAR", 1, 4, &SQUARE), None)).unwrap();
        assert_eq!(set.structures_count(), 1);
        assert_eq!(set.structure_name(0), "No name");
        assert_eq!(set.structure_interpretation(0), "No interpretation");
        assert_eq!(set.structure_color(0), Color::new(255, 0, 0));
        assert_eq!(set.lookup_structure_name("No name"), Some(0));
        assert_eq!(set.lookup_structure_name("PTV"), None);
        assert!(set.try_structure(1).is_none());
    }

    #[test]
    fn test_color() {
        let set = DicomStructureSet::new(&dataset(
            contour_item("CLOSED_PLANAR", 1, 4, &SQUARE),
            Some(["0", "128", "300"]),
        ))
        .unwrap();
        assert_eq!(set.structure_color(0), Color::new(0, 128, 255));
    }

    #[test]
    fn test_open_contours_are_skipped() {
        let set = DicomStructureSet::new(&dataset(contour_item("POINT", 1, 1, &[0.0, 0.0, 0.0]), None)).unwrap();
        assert!(set.structure(0).polygons().is_empty());
        assert!(set.referenced_instances().is_empty());
        assert_eq!(set.geometry_status(), &GeometryStatus::Unavailable);
    }

    #[test]
    fn test_contour_format_errors() {
        assert!(matches!(
            DicomStructureSet::new(&dataset(contour_item("CLOSED_PLANAR", 2, 4, &SQUARE), None)),
            Err(StructureSetError::ContourImageCount { found: 2, .. })
        ));
        assert!(matches!(
            DicomStructureSet::new(&dataset(contour_item("CLOSED_PLANAR", 1, 5, &SQUARE), None)),
            Err(StructureSetError::ContourDataLength { declared: 5, values: 12, .. })
        ));
    }

    #[test]
    fn test_missing_sequence() {
        assert!(matches!(
            DicomStructureSet::new(&InMemDicomObject::new_empty()),
            Err(StructureSetError::MissingSequence(_))
        ));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_structure_out_of_range() {
        let set = DicomStructureSet::new(&dataset(contour_item("CLOSED_PLANAR", 1, 4, &SQUARE), None)).unwrap();
        set.structure_name(3);
    }
}
