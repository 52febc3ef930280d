//! Geographic points and great-circle math.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius used for all distance math.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("latitude must be within [-90, 90], got {0}")]
    Latitude(f64),
    #[error("longitude must be within [-180, 180], got {0}")]
    Longitude(f64),
    #[error("unsupported geometry type: {0}")]
    GeometryType(String),
}

/// A validated WGS84 point.
///
/// Serializes as a GeoJSON point, `{"type":"Point","coordinates":[lon, lat]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    pub fn within_km(&self, other: &GeoPoint, radius_km: f64) -> bool {
        self.distance_km(other) <= radius_km
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(value: GeoJsonPoint) -> Result<Self, Self::Error> {
        if value.kind != "Point" {
            return Err(GeoError::GeometryType(value.kind));
        }
        let [longitude, latitude] = value.coordinates;
        GeoPoint::new(latitude, longitude)
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
        }
    }
}

/// Lat/lon rectangle enclosing a circle on the sphere.
///
/// `min_lon > max_lon` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn around(center: &GeoPoint, radius_km: f64) -> Self {
        let angular = radius_km.max(0.0) / EARTH_RADIUS_KM;
        let lat = center.latitude.to_radians();
        let lon = center.longitude.to_radians();

        let mut min_lat = lat - angular;
        let mut max_lat = lat + angular;

        let (min_lon, max_lon) = if min_lat > -std::f64::consts::FRAC_PI_2
            && max_lat < std::f64::consts::FRAC_PI_2
            && angular.sin() < lat.cos()
        {
            let d_lon = (angular.sin() / lat.cos()).asin();
            let mut min_lon = lon - d_lon;
            let mut max_lon = lon + d_lon;
            if min_lon < -std::f64::consts::PI {
                min_lon += 2.0 * std::f64::consts::PI;
            }
            if max_lon > std::f64::consts::PI {
                max_lon -= 2.0 * std::f64::consts::PI;
            }
            (min_lon.to_degrees(), max_lon.to_degrees())
        } else {
            // Pole inside the circle: every meridian is touched.
            min_lat = min_lat.max(-std::f64::consts::FRAC_PI_2);
            max_lat = max_lat.min(std::f64::consts::FRAC_PI_2);
            (-180.0, 180.0)
        };

        Self {
            min_lat: min_lat.to_degrees(),
            max_lat: max_lat.to_degrees(),
            min_lon,
            max_lon,
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// One range normally, two when the box wraps at ±180.
    pub fn lon_ranges(&self) -> Vec<(f64, f64)> {
        if self.crosses_antimeridian() {
            vec![(self.min_lon, 180.0), (-180.0, self.max_lon)]
        } else {
            vec![(self.min_lon, self.max_lon)]
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        let lat_ok = (self.min_lat..=self.max_lat).contains(&point.latitude);
        lat_ok
            && self
                .lon_ranges()
                .iter()
                .any(|(min, max)| (*min..=*max).contains(&point.longitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(GeoPoint::new(91.0, 0.0), Err(GeoError::Latitude(91.0)));
        assert_eq!(GeoPoint::new(0.0, -181.0), Err(GeoError::Longitude(-181.0)));
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_geojson_shape() {
        let p = point(-23.55, -46.63);
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"][0], -46.63);
        assert_eq!(json["coordinates"][1], -23.55);

        let bad = serde_json::json!({"type": "LineString", "coordinates": [0.0, 0.0]});
        assert!(serde_json::from_value::<GeoPoint>(bad).is_err());
    }

    #[test]
    fn test_known_distance() {
        // São Paulo Sé to Avenida Paulista, roughly 2.3 km apart.
        let se = point(-23.5505, -46.6333);
        let paulista = point(-23.5614, -46.6559);
        let d = se.distance_km(&paulista);
        assert!((2.0..2.8).contains(&d), "distance was {d}");
        assert_eq!(se.distance_km(&se), 0.0);
    }

    #[test]
    fn test_bbox_contains_circle_edge() {
        let center = point(-23.55, -46.63);
        let bbox = BoundingBox::around(&center, 10.0);
        assert!(bbox.contains(&center));
        // Due north, just inside 10 km.
        assert!(bbox.contains(&point(-23.55 + 0.089, -46.63)));
        assert!(!bbox.contains(&point(-23.55 + 0.1, -46.63)));
    }

    #[test]
    fn test_bbox_wraps_antimeridian() {
        let bbox = BoundingBox::around(&point(0.0, 179.99), 10.0);
        assert!(bbox.crosses_antimeridian());
        assert_eq!(bbox.lon_ranges().len(), 2);
        assert!(bbox.contains(&point(0.0, -179.99)));
    }

    #[test]
    fn test_bbox_near_pole_spans_all_longitudes() {
        let bbox = BoundingBox::around(&point(89.95, 10.0), 10.0);
        assert_eq!((bbox.min_lon, bbox.max_lon), (-180.0, 180.0));
        assert!((bbox.max_lat - 90.0).abs() < 1e-9);
    }
}
