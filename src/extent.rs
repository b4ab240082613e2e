/// Axis-aligned 2D bounding box, empty until a point is added.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Extent2D {
    bounds: Option<[f64; 4]>,
}

impl Extent2D {
    pub fn clear(&mut self) {
        self.bounds = None;
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        self.bounds = Some(match self.bounds {
            None => [x, y, x, y],
            Some([x1, y1, x2, y2]) => [x1.min(x), y1.min(y), x2.max(x), y2.max(y)],
        });
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// `(x1, y1, x2, y2)` with `x1 <= x2` and `y1 <= y2`.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.bounds.map(|[x1, y1, x2, y2]| (x1, y1, x2, y2))
    }

    pub fn contains_x(&self, x: f64) -> bool {
        self.bounds
            .is_some_and(|[x1, _, x2, _]| x1 <= x && x <= x2)
    }

    pub fn contains_y(&self, y: f64) -> bool {
        self.bounds
            .is_some_and(|[_, y1, _, y2]| y1 <= y && y <= y2)
    }
}
