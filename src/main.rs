use std::path::PathBuf;

use dicom_rtstruct::{
    CoordinateSystem3D, Orientation, Rasterizer, StructureSetLoader, geometry::Point2,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const OUTPUT_SIZE: usize = 512;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let rtstruct = PathBuf::from(args.next().unwrap_or_else(|| "rtstruct.dcm".into()));
    let slices = PathBuf::from(args.next().unwrap_or_else(|| "dicom".into()));
    let output = PathBuf::from(args.next().unwrap_or_else(|| "result.png".into()));

    let mut structure_set = StructureSetLoader::load_from_file(&rtstruct)
        .expect("should have loaded the structure set");
    StructureSetLoader::resolve_from_directory(&mut structure_set, &slices)
        .await
        .expect("should have resolved the referenced slices");

    for (index, structure) in structure_set.structures().iter().enumerate() {
        info!(
            index,
            name = structure.name(),
            interpretation = structure.interpretation(),
            color = ?structure.color(),
            "Structure"
        );
    }

    let acquisition = structure_set.normal();
    let Some(normal) = structure_set.estimated_normal() else {
        warn!(?acquisition, "No slicing geometry, nothing to draw");
        return;
    };
    info!(
        ?normal,
        ?acquisition,
        thickness = structure_set.estimated_slice_thickness(),
        "Slicing geometry"
    );

    if structure_set.structures_count() == 0 {
        return;
    }

    let center = structure_set.structure_center(0);
    let plane = CoordinateSystem3D::from_orientation(Orientation::closest_to(&acquisition), center);

    // The plane frame is centered on the structure.
    let half = OUTPUT_SIZE as f64 / 2.0;
    let rasterizer = Rasterizer::new(OUTPUT_SIZE, OUTPUT_SIZE, Point2::new(-half, -half), 1.0);

    match rasterizer.rasterize_structure(&structure_set, &plane, 0, 255) {
        Some(mask) => {
            let image = Rasterizer::to_image(&mask).expect("should have built the image");
            image.save(&output).expect("should have saved the image");
            info!(output = %output.display(), "Saved");
        }
        None => warn!(
            name = structure_set.structure_name(0),
            "Structure not visible on its center plane"
        ),
    }
}
