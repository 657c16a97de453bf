//! Coordinates and great-circle distance.
//!
//! A [`Coordinate`] can only be obtained through validation (either
//! [`Coordinate::new`] or deserialization), so [`distance`] never has to deal
//! with out-of-range input.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    /// 0°N 0°E.
    pub const NULL_ISLAND: Coordinate = Coordinate { lat: 0.0, lng: 0.0 };

    /// Builds a coordinate in decimal degrees (WGS84).
    ///
    /// # Errors
    ///
    /// [`ValidationError::LatitudeOutOfRange`] or
    /// [`ValidationError::LongitudeOutOfRange`] when a component is outside its
    /// range or not finite. Values are never clamped.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::LatitudeOutOfRange(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ValidationError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(*self, *other)
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = ValidationError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        Self {
            lat: c.lat,
            lng: c.lng,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lng)
    }
}

/// Great-circle distance in miles between `a` and `b`.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);

    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(ValidationError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.01),
            Err(ValidationError::LongitudeOutOfRange(-180.01))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn accepts_range_edges() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn same_point_is_zero() {
        let p = c(40.0, -75.0);
        assert_eq!(distance(p, p), 0.0);
    }

    #[test]
    fn philadelphia_to_new_york() {
        let phl = c(39.9526, -75.1652);
        let nyc = c(40.7128, -74.0060);
        let d = distance(phl, nyc);
        assert!((d - 80.6).abs() < 1.0, "expected ~80.6 mi, got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance(c(40.0, -75.0), c(41.0, -75.0));
        let expected = EARTH_RADIUS_MILES * 1f64.to_radians();
        assert!((d - expected).abs() < 1e-9);
    }

    #[test]
    fn symmetric_and_non_negative() {
        let points = [
            c(0.0, 0.0),
            c(40.0, -75.0),
            c(-33.86, 151.21),
            c(89.9, 179.9),
            c(-89.9, -179.9),
            c(51.5, -0.12),
        ];
        for a in points {
            for b in points {
                let ab = distance(a, b);
                let ba = distance(b, a);
                assert!(ab >= 0.0);
                assert!((ab - ba).abs() < 1e-9, "{a} -> {b}: {ab} vs {ba}");
            }
        }
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = distance(c(0.0, 0.0), c(0.0, 180.0));
        assert!((d - EARTH_RADIUS_MILES * std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn deserialization_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"lat": 40.0, "lng": -75.0}"#).unwrap();
        assert_eq!(ok, c(40.0, -75.0));
        assert!(serde_json::from_str::<Coordinate>(r#"{"lat": 120.0, "lng": 0.0}"#).is_err());
    }
}
