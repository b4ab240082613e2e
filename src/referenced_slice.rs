use crate::{coordinate_system::CoordinateSystem3D, error::StructureSetError, geometry};

use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use std::collections::BTreeMap;

/// Slice thickness assumed for instances without a Slice Thickness tag (mm).
pub const DEFAULT_THICKNESS: f64 = 1.0;

/// Geometry of the image slice a contour was drawn on.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferencedSlice {
    series_instance_uid: String,
    geometry: CoordinateSystem3D,
    thickness: f64,
}

impl ReferencedSlice {
    pub fn new(series_instance_uid: impl Into<String>, geometry: CoordinateSystem3D, thickness: f64) -> Self {
        Self {
            series_instance_uid: series_instance_uid.into(),
            geometry,
            thickness,
        }
    }

    /// Reads the SOP Instance UID and slice description of an image
    /// instance.
    ///
    /// # Errors
    ///
    /// Returns error if the instance or series UID is missing, or if the
    /// position/orientation tags are malformed.
    pub fn from_dataset(dataset: &InMemDicomObject) -> Result<(String, Self), StructureSetError> {
        let sop_instance_uid = read_uid(dataset, tags::SOP_INSTANCE_UID)?;
        let series_instance_uid = read_uid(dataset, tags::SERIES_INSTANCE_UID)?;
        let geometry = CoordinateSystem3D::from_dataset(dataset)?;

        let thickness = dataset
            .get(tags::SLICE_THICKNESS)
            .and_then(|element| element.to_str().ok())
            .and_then(|value| geometry::parse_vector(&value).ok())
            .and_then(|values| values.first().copied())
            .unwrap_or(DEFAULT_THICKNESS);

        Ok((
            sop_instance_uid,
            Self::new(series_instance_uid, geometry, thickness),
        ))
    }

    pub fn series_instance_uid(&self) -> &str {
        &self.series_instance_uid
    }

    pub fn geometry(&self) -> &CoordinateSystem3D {
        &self.geometry
    }

    /// Slice thickness in millimeters.
    pub fn thickness(&self) -> f64 {
        self.thickness
    }
}

fn read_uid(dataset: &InMemDicomObject, tag: dicom::core::Tag) -> Result<String, StructureSetError> {
    let value = dataset
        .get(tag)
        .ok_or(StructureSetError::MissingTag(tag))?
        .to_str()
        .map_err(|_| StructureSetError::MalformedTag(tag))?;
    Ok(value.trim_end_matches(['\0', ' ']).to_owned())
}

/// Slice geometries keyed by SOP Instance UID, filled as the referenced
/// instances get resolved.
#[derive(Clone, Debug, Default)]
pub struct ReferencedSliceRegistry {
    slices: BTreeMap<String, ReferencedSlice>,
}

impl ReferencedSliceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slice. Returns `Ok(false)` if the instance is already
    /// known, in which case the registry is left untouched.
    ///
    /// # Errors
    ///
    /// All slices must come from one series and have a non-negative
    /// thickness.
    pub fn insert(
        &mut self,
        sop_instance_uid: impl Into<String>,
        slice: ReferencedSlice,
    ) -> Result<bool, StructureSetError> {
        let sop_instance_uid = sop_instance_uid.into();

        if self.slices.contains_key(&sop_instance_uid) {
            return Ok(false);
        }

        if slice.thickness < 0.0 {
            return Err(StructureSetError::NegativeThickness(slice.thickness));
        }

        match self.series_instance_uid() {
            Some(expected) if expected != slice.series_instance_uid => {
                return Err(StructureSetError::MixedSeries {
                    sop_instance_uid,
                    expected: expected.to_owned(),
                    found: slice.series_instance_uid,
                });
            }
            _ => {}
        }

        self.slices.insert(sop_instance_uid, slice);
        Ok(true)
    }

    pub fn get(&self, sop_instance_uid: &str) -> Option<&ReferencedSlice> {
        self.slices.get(sop_instance_uid)
    }

    pub fn contains(&self, sop_instance_uid: &str) -> bool {
        self.slices.contains_key(sop_instance_uid)
    }

    /// Series shared by all registered slices.
    pub fn series_instance_uid(&self) -> Option<&str> {
        self.slices
            .values()
            .next()
            .map(|slice| slice.series_instance_uid.as_str())
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Slices in SOP Instance UID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReferencedSlice)> {
        self.slices.iter().map(|(uid, slice)| (uid.as_str(), slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use dicom::core::{DataElement, PrimitiveValue, VR, dicom_value};

    fn axial(z: f64) -> CoordinateSystem3D {
        CoordinateSystem3D::canonical().with_origin(Point3::new(0.0, 0.0, z))
    }

    #[test]
    fn test_insert_is_first_come() {
        let mut registry = ReferencedSliceRegistry::new();
        assert!(registry.insert("1.2.3", ReferencedSlice::new("9", axial(0.0), 3.0)).unwrap());
        assert!(!registry.insert("1.2.3", ReferencedSlice::new("9", axial(5.0), 3.0)).unwrap());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("1.2.3").unwrap().geometry(), &axial(0.0));
    }

    #[test]
    fn test_insert_rejects_mixed_series_and_negative_thickness() {
        let mut registry = ReferencedSliceRegistry::new();
        registry.insert("a", ReferencedSlice::new("9", axial(0.0), 3.0)).unwrap();

        assert!(matches!(
            registry.insert("b", ReferencedSlice::new("10", axial(3.0), 3.0)),
            Err(StructureSetError::MixedSeries { .. })
        ));
        assert!(matches!(
            registry.insert("c", ReferencedSlice::new("9", axial(3.0), -1.0)),
            Err(StructureSetError::NegativeThickness(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_dataset() {
        let dataset = InMemDicomObject::from_element_iter([
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.3.4\0")),
            DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.3")),
            DataElement::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                dicom_value!(Strs, ["-100", "-100", "42.5"]),
            ),
            DataElement::new(
                tags::IMAGE_ORIENTATION_PATIENT,
                VR::DS,
                dicom_value!(Strs, ["1", "0", "0", "0", "1", "0"]),
            ),
        ]);

        let (uid, slice) = ReferencedSlice::from_dataset(&dataset).unwrap();
        assert_eq!(uid, "1.2.3.4");
        assert_eq!(slice.series_instance_uid(), "1.2.3");
        assert_eq!(slice.thickness(), DEFAULT_THICKNESS);
        assert_eq!(slice.geometry().origin(), &Point3::new(-100.0, -100.0, 42.5));
    }

    #[test]
    fn test_from_dataset_requires_uids() {
        let dataset = InMemDicomObject::from_element_iter([DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4"),
        )]);

        assert!(matches!(
            ReferencedSlice::from_dataset(&dataset),
            Err(StructureSetError::MissingTag(tag)) if tag == tags::SERIES_INSTANCE_UID
        ));
    }
}
