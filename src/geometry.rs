use crate::error::GeometryError;

/// 2D point in the local frame of a plane.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point in patient coordinates (mm).
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector in patient coordinates.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Most DICOM geometry is stored as single-precision decimal strings, so
/// comparisons use the float32 machine epsilon.
pub const TOLERANCE: f64 = 10.0 * f32::EPSILON as f64;

#[inline]
pub fn is_close_to_zero(value: f64) -> bool {
    value.abs() < TOLERANCE
}

#[inline]
pub fn is_near(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// [`is_near`] with the default [`TOLERANCE`].
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    is_near(a, b, TOLERANCE)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Parallel,
    Opposite,
}

/// Compares the directions of two vectors through the cosine of their angle.
///
/// Returns `None` when the vectors are not collinear, or when one of them is
/// (close to) zero.
pub fn parallelism(u: &Vector3, v: &Vector3) -> Option<Parallelism> {
    let norm_u = u.norm();
    let norm_v = v.norm();

    if is_close_to_zero(norm_u) || is_close_to_zero(norm_v) {
        return None;
    }

    let cos_angle = u.dot(v) / (norm_u * norm_v);

    if is_close_to_zero(cos_angle - 1.0) {
        Some(Parallelism::Parallel)
    } else if is_close_to_zero(cos_angle.abs() - 1.0) {
        Some(Parallelism::Opposite)
    } else {
        None
    }
}

#[inline]
pub fn is_parallel_or_opposite(u: &Vector3, v: &Vector3) -> bool {
    parallelism(u, v).is_some()
}

#[inline]
pub fn project_along_normal(point: &Point3, normal: &Vector3) -> f64 {
    point.coords.dot(normal)
}

/// Parses a DICOM multi-valued decimal string (`"1.0\\-2\\3.5"`).
pub fn parse_vector(value: &str) -> Result<Vec<f64>, GeometryError> {
    let trimmed = value.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split('\\')
        .map(|item| {
            item.trim()
                .parse::<f64>()
                .map_err(|_| GeometryError::InvalidVector(value.to_owned()))
        })
        .collect()
}

/// Converts a slice of exactly three values into a point.
pub fn to_point(values: &[f64]) -> Result<Point3, GeometryError> {
    match values {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(GeometryError::WrongLength {
            expected: 3,
            found: values.len(),
        }),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Gaps between consecutive distinct values, in increasing order.
///
/// Values closer than [`TOLERANCE`] are considered the same position.
pub fn distinct_gaps(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values
        .windows(2)
        .filter(|pair| !approx_eq(pair[0], pair[1]))
        .map(|pair| pair[1] - pair[0])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parallelism() {
        let z = Vector3::z();
        assert_eq!(parallelism(&z, &(z * 3.0)), Some(Parallelism::Parallel));
        assert_eq!(parallelism(&z, &-z), Some(Parallelism::Opposite));
        assert_eq!(parallelism(&z, &Vector3::x()), None);
        assert_eq!(parallelism(&z, &Vector3::zeros()), None);
        assert!(!is_parallel_or_opposite(&z, &Vector3::new(0.0, 0.1, 1.0)));
    }

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("1\\-2.5\\ 3 ").unwrap(), vec![1.0, -2.5, 3.0]);
        assert_eq!(parse_vector("  ").unwrap(), Vec::<f64>::new());
        assert!(parse_vector("1\\abc").is_err());
    }

    #[test]
    fn test_to_point_rejects_wrong_length() {
        assert!(to_point(&[1.0, 2.0]).is_err());
        assert_eq!(to_point(&[1.0, 2.0, 3.0]).unwrap(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_distinct_gaps() {
        let gaps = distinct_gaps(vec![6.0, 0.0, 3.0, 3.0, 9.0]);
        assert_eq!(gaps, vec![3.0, 3.0, 3.0]);
        assert_relative_eq!(mean(&gaps).unwrap(), 3.0);
        assert!(mean(&[]).is_none());
    }
}
