//! # DICOM RT-STRUCT library
//!
//! This crate serves a high-level API for the contours of DICOM RT
//! Structure Set objects, and for drawing them on arbitrary cutting planes.

//!
//! This library is part of the dicom-rs ecosystem and builds on its object
//! model to read the structures (name, interpretation, color) and their
//! closed planar contours from an RT-STRUCT. An RT-STRUCT only references the
//! images its contours were drawn on by SOP Instance UID, so the geometry of
//! these slices (position, orientation, thickness) has to be supplied
//! afterwards, either directly or by reading the headers of the image files.
//! From the slices the library estimates the slicing normal and slice
//! thickness shared by the structure set, tolerating one stray slice.
//!
//! Structures can then be projected on a cutting plane:
//!  - Parallel to the contours: closed contours within half a slice
//!  - Orthogonal to the contours (e.g. Coronal or Sagittal views of an
//!    Axial series): the outline of the stacked contour slabs
//!  - Oblique: segments where the plane crosses the contours
//!
//!  Projected chains can be collected on a [`PolylineLayer`] (or any
//!  [`PolylineSink`]) and rasterized into label masks. Contours whose slice
//!  is never supplied are never drawn.
//!
//! # Examples
//!
//! ## Drawing a structure on the axial plane of its first contour
//!
//! To read an RT-STRUCT and resolve its slices from the ct/ directory, then
//! rasterize the "PTV" structure.
//!
//! ```no_run
//! # use dicom_rtstruct::{CoordinateSystem3D, Rasterizer, StructureSetLoader, geometry::Point2};
//! # async fn run() {
//! let mut structure_set = StructureSetLoader::load_from_file("rtstruct.dcm")
//!     .expect("should have parsed the structure set");
//! StructureSetLoader::resolve_from_directory(&mut structure_set, "ct")
//!     .await
//!     .expect("should have read the slice headers");
//!
//! let index = structure_set
//!     .lookup_structure_name("PTV")
//!     .expect("should have a PTV structure");
//! let uid = structure_set.structure(index).polygons()[0].sop_instance_uid().to_owned();
//! let plane: CoordinateSystem3D = structure_set
//!     .referenced_slices()
//!     .get(&uid)
//!     .expect("should have resolved the slice")
//!     .geometry()
//!     .clone();
//!
//! let rasterizer = Rasterizer::new(512, 512, Point2::origin(), 1.0);
//! let mask = rasterizer
//!     .rasterize_structure(&structure_set, &plane, index, 255)
//!     .expect("should be visible on its own slice");
//! Rasterizer::to_image(&mask)
//!     .expect("should have built the image")
//!     .save("ptv.png")
//!     .expect("should have written the image");
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coordinate_system;
pub mod enums;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod layer;
pub mod loader;
pub mod normal_estimator;
pub mod polygon;
pub mod raster;
pub mod referenced_slice;
pub mod slabs;
pub mod structure;
pub mod structure_set;

pub use cache::StructureSetCache;
pub use config::GeometryOptions;
pub use coordinate_system::CoordinateSystem3D;
pub use enums::{Axis, Orientation, ProjectionKind};
pub use error::{GeometryError, StructureSetError};
pub use layer::{PolylineLayer, PolylineSink};
pub use loader::{ResolveSummary, StructureSetLoader};
pub use raster::Rasterizer;
pub use structure::{Color, Structure};
pub use structure_set::{DicomStructureSet, GeometryStatus};
