use geo_types::Point;
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are real numbers (no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

// geo-types points are x = longitude, y = latitude
impl From<Coordinates> for Point {
    fn from(value: Coordinates) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

impl From<Point> for Coordinates {
    fn from(value: Point) -> Self {
        Self::new(value.y(), value.x())
    }
}

#[test]
fn point_conversion_swaps_axes() {
    let coords = Coordinates::new(-21.0, -47.5);
    let point: Point = coords.into();
    assert_eq!(point.x(), -47.5);
    assert_eq!(point.y(), -21.0);
    assert_eq!(Coordinates::from(point), coords);
}

#[test]
fn nan_is_not_finite() {
    assert!(Coordinates::new(1., 2.).is_finite());
    assert!(!Coordinates::new(f64::NAN, 2.).is_finite());
    assert!(!Coordinates::new(1., f64::INFINITY).is_finite());
}
