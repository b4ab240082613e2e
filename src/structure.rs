use crate::{
    geometry::{Point3, Vector3},
    polygon::Polygon,
};

/// Display color of a structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Default for Color {
    /// Structures without ROI Display Color are drawn in red.
    fn default() -> Self {
        Self::new(255, 0, 0)
    }
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Converts the three components of ROI Display Color, clamping them
    /// to `0..=255`.
    pub fn from_components(components: &[f64]) -> Option<Self> {
        match components {
            [r, g, b] => Some(Self::new(clamp(*r), clamp(*g), clamp(*b))),
            _ => None,
        }
    }
}

#[inline]
fn clamp(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

/// One region of interest of an RT-STRUCT with its contours.
#[derive(Clone, Debug, Default)]
pub struct Structure {
    name: String,
    interpretation: String,
    color: Color,
    polygons: Vec<Polygon>,
}

impl Structure {
    pub fn new(name: impl Into<String>, interpretation: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            interpretation: interpretation.into(),
            color,
            polygons: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interpretation(&self) -> &str {
        &self.interpretation
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub(crate) fn polygons_mut(&mut self) -> &mut [Polygon] {
        &mut self.polygons
    }

    pub(crate) fn push_polygon(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
    }

    /// Average of the first point of every polygon, or the origin for a
    /// structure without contours.
    pub fn center(&self) -> Point3 {
        if self.polygons.is_empty() {
            return Point3::origin();
        }

        let n = self.polygons.len() as f64;
        let sum = self
            .polygons
            .iter()
            .filter_map(|polygon| polygon.points().first())
            .fold(Vector3::zeros(), |acc, p| acc + p.coords / n);

        Point3::from(sum)
    }

    /// Contours drawn on the given instance.
    pub fn points_on_instance<'a>(
        &'a self,
        sop_instance_uid: &'a str,
    ) -> impl Iterator<Item = &'a [Point3]> + 'a {
        self.polygons
            .iter()
            .filter(move |polygon| polygon.sop_instance_uid() == sop_instance_uid)
            .map(Polygon::points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon(uid: &str, points: &[(f64, f64, f64)]) -> Polygon {
        let mut polygon = Polygon::new(uid);
        for &(x, y, z) in points {
            polygon.add_point(Point3::new(x, y, z));
        }
        polygon
    }

    #[test]
    fn test_color_from_components() {
        assert_eq!(
            Color::from_components(&[300.0, -4.0, 128.7]),
            Some(Color::new(255, 0, 128))
        );
        assert_eq!(Color::from_components(&[1.0, 2.0]), None);
        assert_eq!(Color::default(), Color::new(255, 0, 0));
    }

    #[test]
    fn test_center() {
        let mut structure = Structure::new("PTV", "PTV", Color::default());
        assert_eq!(structure.center(), Point3::origin());

        structure.push_polygon(polygon("a", &[(0.0, 0.0, 0.0), (4.0, 0.0, 0.0)]));
        structure.push_polygon(polygon("b", &[(2.0, 4.0, 6.0)]));
        assert_eq!(structure.center(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_points_on_instance() {
        let mut structure = Structure::new("PTV", "PTV", Color::default());
        structure.push_polygon(polygon("a", &[(0.0, 0.0, 0.0)]));
        structure.push_polygon(polygon("b", &[(1.0, 0.0, 0.0)]));
        structure.push_polygon(polygon("a", &[(2.0, 0.0, 0.0)]));

        let points: Vec<_> = structure.points_on_instance("a").collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1][0], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(structure.points_on_instance("c").count(), 0);
    }
}
