use crate::{
    coordinate_system::CoordinateSystem3D, geometry::Point2, layer::PolylineLayer,
    polygon::Chain, structure_set::DicomStructureSet,
};

use image::{ImageBuffer, Luma};
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Pixel grid laid over the 2D frame of a cutting plane.
///
/// Pixel `(row, column)` covers the square whose lower corner is
/// `origin + (column, row) * pixel_spacing`; it is inside a contour when its
/// center is.
#[derive(Clone, Debug, PartialEq)]
pub struct Rasterizer {
    width: usize,
    height: usize,
    origin: Point2,
    pixel_spacing: f64,
}

impl Rasterizer {
    pub fn new(width: usize, height: usize, origin: Point2, pixel_spacing: f64) -> Self {
        Self {
            width,
            height,
            origin,
            pixel_spacing,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Empty mask of the grid size.
    pub fn mask(&self) -> Array2<u8> {
        Array2::zeros((self.height, self.width))
    }

    /// Fills the inside of the chains with `label` using the even-odd rule.
    /// Chains are treated as closed whether or not they repeat their first
    /// point.
    pub fn fill(&self, mask: &mut Array2<u8>, chains: &[Chain], label: u8) {
        let edges: Vec<(Point2, Point2)> = chains.iter().flat_map(|chain| edges(chain)).collect();
        if edges.is_empty() {
            return;
        }

        mask.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut line)| {
                let y = self.origin.y + (row as f64 + 0.5) * self.pixel_spacing;

                let mut crossings: Vec<f64> = edges
                    .iter()
                    .filter(|(a, b)| (a.y > y) != (b.y > y))
                    .map(|(a, b)| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
                    .collect();
                crossings.sort_by(f64::total_cmp);

                for pair in crossings.chunks_exact(2) {
                    let (start, end) = (self.column(pair[0]), self.column(pair[1]));
                    for column in start..end.min(self.width) {
                        line[column] = label;
                    }
                }
            });
    }

    /// First column whose center lies at or after `x`.
    fn column(&self, x: f64) -> usize {
        ((x - self.origin.x) / self.pixel_spacing - 0.5).ceil().max(0.0) as usize
    }

    pub fn rasterize(&self, chains: &[Chain], label: u8) -> Array2<u8> {
        let mut mask = self.mask();
        self.fill(&mut mask, chains, label);
        mask
    }

    /// Mask of a structure on a cutting plane parallel to its contours, or
    /// `None` if none of its contours lies on that plane.
    pub fn rasterize_structure(
        &self,
        structure_set: &DicomStructureSet,
        cutting_plane: &CoordinateSystem3D,
        index: usize,
        label: u8,
    ) -> Option<Array2<u8>> {
        let mut layer = PolylineLayer::new();
        structure_set.project_onto_layer(&mut layer, cutting_plane, index);

        let chains: Vec<Chain> = layer
            .closed_chains()
            .map(|colored| colored.chain.clone())
            .collect();

        (!chains.is_empty()).then(|| self.rasterize(&chains, label))
    }

    pub fn to_image(mask: &Array2<u8>) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = mask.dim();
        let pixel_data: Vec<u8> = mask.view().into_par_iter().map(|&v| v).collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

fn edges(chain: &[Point2]) -> impl Iterator<Item = (Point2, Point2)> + '_ {
    let closing = match (chain.first(), chain.last()) {
        (Some(first), Some(last)) if chain.len() > 2 && first != last => Some((*last, *first)),
        _ => None,
    };

    chain
        .windows(2)
        .map(|w| (w[0], w[1]))
        .chain(closing)
}
