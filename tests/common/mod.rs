#![allow(dead_code)]

use dicom::{
    core::{DataElement, PrimitiveValue, Tag, VR, dicom_value, value::DataSetSequence},
    object::{FileMetaTableBuilder, InMemDicomObject, mem::InMemElement},
};
use dicom_dictionary_std::tags;
use dicom_rtstruct::{
    CoordinateSystem3D, DicomStructureSet, Orientation, geometry::Point3,
    structure_set::{
        CONTOUR_DATA, CONTOUR_GEOMETRIC_TYPE, CONTOUR_IMAGE_SEQUENCE, CONTOUR_SEQUENCE,
        NUMBER_OF_CONTOUR_POINTS, ROI_CONTOUR_SEQUENCE, ROI_DISPLAY_COLOR, ROI_NAME,
        RT_ROI_INTERPRETED_TYPE, RT_ROI_OBSERVATIONS_SEQUENCE, STRUCTURE_SET_ROI_SEQUENCE,
    },
};
use std::path::Path;

pub const SERIES_INSTANCE_UID: &str = "1.2.826.0.1.3680043.2.1125.2";
pub const SLICE_SPACING: f64 = 3.0;
pub const SLICE_COUNT: usize = 10;

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
const RT_STRUCTURE_SET_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.481.3";
const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

pub fn slice_uid(slice: usize) -> String {
    format!("1.2.826.0.1.3680043.2.1125.3.{slice}")
}

pub fn slice_z(slice: usize) -> f64 {
    slice as f64 * SLICE_SPACING
}

#[derive(Clone, Debug)]
pub struct Contour {
    pub sop_instance_uid: String,
    pub geometric_type: &'static str,
    pub points: Vec<[f64; 3]>,
}

/// Axis-aligned square drawn on an axial slice.
pub fn square(slice: usize, x: f64, y: f64, size: f64) -> Contour {
    let z = slice_z(slice);
    Contour {
        sop_instance_uid: slice_uid(slice),
        geometric_type: "CLOSED_PLANAR",
        points: vec![
            [x, y, z],
            [x + size, y, z],
            [x + size, y + size, z],
            [x, y + size, z],
        ],
    }
}

#[derive(Clone, Debug)]
pub struct Roi {
    pub name: Option<&'static str>,
    pub interpretation: Option<&'static str>,
    pub color: Option<[u8; 3]>,
    pub contours: Vec<Contour>,
}

fn sequence(tag: Tag, items: Vec<InMemDicomObject>) -> InMemElement {
    DataElement::new(tag, VR::SQ, DataSetSequence::from(items))
}

fn decimals(values: impl IntoIterator<Item = f64>) -> PrimitiveValue {
    PrimitiveValue::Strs(values.into_iter().map(|v| v.to_string()).collect())
}

fn contour_item(contour: &Contour) -> InMemDicomObject {
    let image = InMemDicomObject::from_element_iter([DataElement::new(
        tags::REFERENCED_SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(contour.sop_instance_uid.as_str()),
    )]);

    InMemDicomObject::from_element_iter([
        sequence(CONTOUR_IMAGE_SEQUENCE, vec![image]),
        DataElement::new(
            CONTOUR_GEOMETRIC_TYPE,
            VR::CS,
            PrimitiveValue::from(contour.geometric_type),
        ),
        DataElement::new(
            NUMBER_OF_CONTOUR_POINTS,
            VR::IS,
            PrimitiveValue::from(contour.points.len().to_string()),
        ),
        DataElement::new(
            CONTOUR_DATA,
            VR::DS,
            decimals(contour.points.iter().flatten().copied()),
        ),
    ])
}

/// RT-STRUCT dataset holding the given regions of interest.
pub fn rt_struct(rois: &[Roi]) -> InMemDicomObject {
    let mut structure_set_rois = Vec::new();
    let mut roi_contours = Vec::new();
    let mut observations = Vec::new();

    for roi in rois {
        let mut elements = Vec::new();
        if let Some(name) = roi.name {
            elements.push(DataElement::new(ROI_NAME, VR::LO, PrimitiveValue::from(name)));
        }
        structure_set_rois.push(InMemDicomObject::from_element_iter(elements));

        let mut elements = vec![sequence(
            CONTOUR_SEQUENCE,
            roi.contours.iter().map(contour_item).collect(),
        )];
        if let Some([r, g, b]) = roi.color {
            elements.push(DataElement::new(
                ROI_DISPLAY_COLOR,
                VR::IS,
                dicom_value!(Strs, [r.to_string(), g.to_string(), b.to_string()]),
            ));
        }
        roi_contours.push(InMemDicomObject::from_element_iter(elements));

        let mut elements = Vec::new();
        if let Some(interpretation) = roi.interpretation {
            elements.push(DataElement::new(
                RT_ROI_INTERPRETED_TYPE,
                VR::CS,
                PrimitiveValue::from(interpretation),
            ));
        }
        observations.push(InMemDicomObject::from_element_iter(elements));
    }

    InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(RT_STRUCTURE_SET_STORAGE)),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("RTSTRUCT")),
        sequence(STRUCTURE_SET_ROI_SEQUENCE, structure_set_rois),
        sequence(ROI_CONTOUR_SEQUENCE, roi_contours),
        sequence(RT_ROI_OBSERVATIONS_SEQUENCE, observations),
    ])
}

pub fn roi(
    name: &'static str,
    interpretation: &'static str,
    color: [u8; 3],
    contours: Vec<Contour>,
) -> Roi {
    Roi {
        name: Some(name),
        interpretation: Some(interpretation),
        color: Some(color),
        contours,
    }
}

/// Phantom with seven structures contoured on axial slices 3 mm apart.
pub fn phantom() -> InMemDicomObject {
    let stack = |slices: std::ops::Range<usize>, x: f64, y: f64, size: f64| -> Vec<Contour> {
        slices.map(|slice| square(slice, x, y, size)).collect()
    };

    rt_struct(&[
        roi("LN300", "ORGAN", [255, 0, 0], stack(2..5, -60.0, -10.0, 20.0)),
        roi("Cortical Bone", "ORGAN", [0, 255, 255], stack(2..5, 40.0, -10.0, 20.0)),
        roi("Adipose", "ORGAN", [255, 0, 255], stack(5..8, -60.0, -10.0, 20.0)),
        roi("CB2-50%", "ORGAN", [0, 0, 255], stack(5..8, 40.0, -10.0, 20.0)),
        roi("Water", "ORGAN", [0, 128, 255], stack(3..7, -10.0, 40.0, 20.0)),
        roi("External", "EXTERNAL", [0, 128, 0], stack(0..SLICE_COUNT, -100.0, -100.0, 200.0)),
        roi("PTV", "PTV", [255, 0, 255], stack(4..6, -10.0, -10.0, 20.0)),
    ])
}

pub fn axial_slice(slice: usize) -> CoordinateSystem3D {
    CoordinateSystem3D::from_orientation(
        Orientation::Axial,
        Point3::new(-128.0, -128.0, slice_z(slice)),
    )
}

/// Registers the geometry of the first `count` axial slices.
pub fn register_slices(structure_set: &mut DicomStructureSet, count: usize, thickness: f64) {
    for slice in 0..count {
        structure_set
            .add_referenced_slice(&slice_uid(slice), SERIES_INSTANCE_UID, axial_slice(slice), thickness)
            .unwrap();
    }
}

/// Header of a CT image of the phantom series.
pub fn ct_header(slice: usize, series_instance_uid: &str) -> InMemDicomObject {
    InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(CT_IMAGE_STORAGE)),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(slice_uid(slice))),
        DataElement::new(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(series_instance_uid),
        ),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
        DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            decimals([-128.0, -128.0, slice_z(slice)]),
        ),
        DataElement::new(
            tags::IMAGE_ORIENTATION_PATIENT,
            VR::DS,
            decimals([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        ),
        DataElement::new(tags::SLICE_THICKNESS, VR::DS, decimals([2.5])),
    ])
}

pub fn write_dicom(
    dataset: InMemDicomObject,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    path: &Path,
) {
    let file = dataset
        .with_meta(
            FileMetaTableBuilder::new()
                .media_storage_sop_class_uid(sop_class_uid)
                .media_storage_sop_instance_uid(sop_instance_uid)
                .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN),
        )
        .unwrap();
    file.write_to_file(path).unwrap();
}

pub fn write_ct_slice(directory: &Path, slice: usize, series_instance_uid: &str) {
    write_dicom(
        ct_header(slice, series_instance_uid),
        CT_IMAGE_STORAGE,
        &slice_uid(slice),
        &directory.join(format!("ct_{slice:03}.dcm")),
    );
}

pub fn write_rt_struct(dataset: InMemDicomObject, path: &Path) {
    write_dicom(dataset, RT_STRUCTURE_SET_STORAGE, "1.2.826.0.1.3680043.2.1125.4", path);
}
