use dicom::core::Tag;
use thiserror::Error;

/// Errors raised while building plane geometry from DICOM values.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("cannot parse vector from {0:?}")]
    InvalidVector(String),

    #[error("expected {expected} values, found {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("orientation axes must be unit vectors")]
    NotUnitAxes,

    #[error("orientation axes must be orthogonal")]
    NotOrthogonal,

    #[error("degenerate plane normal")]
    DegenerateNormal,

    #[error("malformed value in tag {0}")]
    MalformedTag(Tag),
}

/// Errors raised while parsing an RT-STRUCT or registering referenced slices.
#[derive(Debug, Error)]
pub enum StructureSetError {
    #[error("missing mandatory sequence {0}")]
    MissingSequence(Tag),

    #[error("missing mandatory tag {0}")]
    MissingTag(Tag),

    #[error("malformed value in tag {0}")]
    MalformedTag(Tag),

    #[error("ROI sequences disagree in size: {observations} observations, {contours} contours, {rois} ROIs")]
    SequenceSizeMismatch {
        observations: usize,
        contours: usize,
        rois: usize,
    },

    #[error("contour {contour} of structure {structure} must reference exactly one image, found {found}")]
    ContourImageCount {
        structure: usize,
        contour: usize,
        found: usize,
    },

    #[error("contour {contour} of structure {structure} declares {declared} points but holds {values} coordinates")]
    ContourDataLength {
        structure: usize,
        contour: usize,
        declared: usize,
        values: usize,
    },

    #[error("referenced slice {sop_instance_uid} belongs to series {found}, expected {expected}")]
    MixedSeries {
        sop_instance_uid: String,
        expected: String,
        found: String,
    },

    #[error("negative slice thickness {0}")]
    NegativeThickness(f64),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("slice reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
