//! Geographic locations and positions, with great-circle, rhumb-line, and
//! linear navigation between them.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use crate::Angle;

/// A latitude/longitude pair on the globe's surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatLon {
    pub latitude: Angle,
    pub longitude: Angle,
}

impl LatLon {
    /// Latitude and longitude both zero.
    pub const ZERO: LatLon = LatLon {
        latitude: Angle::ZERO,
        longitude: Angle::ZERO,
    };

    pub fn new(latitude: Angle, longitude: Angle) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::new(Angle::from_degrees(latitude), Angle::from_degrees(longitude))
    }

    /// Bit pattern of the two angles, suitable as a hash-map key.
    pub fn key_bits(&self) -> (u64, u64) {
        (
            self.latitude.radians().to_bits(),
            self.longitude.radians().to_bits(),
        )
    }

    /// Angular great-circle distance between two locations (haversine).
    pub fn great_circle_distance(a: LatLon, b: LatLon) -> Angle {
        let lat1 = a.latitude.radians();
        let lat2 = b.latitude.radians();
        let dlat = lat2 - lat1;
        let dlon = b.longitude.radians() - a.longitude.radians();
        if dlat == 0.0 && dlon == 0.0 {
            return Angle::ZERO;
        }
        let s_lat = (dlat / 2.0).sin();
        let s_lon = (dlon / 2.0).sin();
        let h = s_lat * s_lat + lat1.cos() * lat2.cos() * s_lon * s_lon;
        Angle::from_radians(2.0 * h.sqrt().min(1.0).asin())
    }

    /// Initial azimuth (clockwise from north) of the great circle from `a` to `b`.
    pub fn great_circle_azimuth(a: LatLon, b: LatLon) -> Angle {
        let lat1 = a.latitude.radians();
        let lat2 = b.latitude.radians();
        let dlon = b.longitude.radians() - a.longitude.radians();
        if lat1 == lat2 && dlon == 0.0 {
            return Angle::ZERO;
        }
        let y = lat2.cos() * dlon.sin();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        Angle::from_radians(y.atan2(x))
    }

    /// Location reached by travelling `distance` along the great circle leaving
    /// `origin` at `azimuth`.
    pub fn great_circle_end_position(origin: LatLon, azimuth: Angle, distance: Angle) -> LatLon {
        let lat1 = origin.latitude.radians();
        let lon1 = origin.longitude.radians();
        let d = distance.radians();
        let az = azimuth.radians();
        if d == 0.0 {
            return origin;
        }
        let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * az.cos()).asin();
        let lon2 = lon1
            + (az.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());
        LatLon::new(
            Angle::from_radians(lat2).clamped_latitude(),
            Angle::from_radians(lon2).normalized_longitude(),
        )
    }

    /// Location a fraction `t` of the way along the great circle from `a` to `b`.
    pub fn interpolate_great_circle(t: f64, a: LatLon, b: LatLon) -> LatLon {
        if t <= 0.0 {
            return a;
        }
        if t >= 1.0 {
            return b;
        }
        let azimuth = Self::great_circle_azimuth(a, b);
        let distance = Self::great_circle_distance(a, b);
        Self::great_circle_end_position(a, azimuth, distance * t)
    }

    /// Angular length of the rhumb line from `a` to `b`.
    pub fn rhumb_distance(a: LatLon, b: LatLon) -> Angle {
        let lat1 = a.latitude.radians();
        let lat2 = b.latitude.radians();
        let dlat = lat2 - lat1;
        let dlon = wrap_delta_longitude(b.longitude.radians() - a.longitude.radians());
        if dlat == 0.0 && dlon == 0.0 {
            return Angle::ZERO;
        }
        let dphi = mercator_delta(lat1, lat2);
        let q = if dphi.abs() > 1e-12 {
            dlat / dphi
        } else {
            lat1.cos()
        };
        Angle::from_radians((dlat * dlat + q * q * dlon * dlon).sqrt())
    }

    /// Constant azimuth of the rhumb line from `a` to `b`.
    pub fn rhumb_azimuth(a: LatLon, b: LatLon) -> Angle {
        let lat1 = a.latitude.radians();
        let lat2 = b.latitude.radians();
        let dlon = wrap_delta_longitude(b.longitude.radians() - a.longitude.radians());
        let dphi = mercator_delta(lat1, lat2);
        if dlon == 0.0 && dphi == 0.0 {
            return Angle::ZERO;
        }
        Angle::from_radians(dlon.atan2(dphi))
    }

    /// Location reached by travelling `distance` along the rhumb line leaving
    /// `origin` at `azimuth`.
    pub fn rhumb_end_position(origin: LatLon, azimuth: Angle, distance: Angle) -> LatLon {
        let lat1 = origin.latitude.radians();
        let lon1 = origin.longitude.radians();
        let d = distance.radians();
        let az = azimuth.radians();
        if d == 0.0 {
            return origin;
        }
        let mut lat2 = lat1 + d * az.cos();
        let dphi = mercator_delta(lat1, lat2);
        let q = if dphi.abs() > 1e-12 {
            (lat2 - lat1) / dphi
        } else {
            lat1.cos()
        };
        let dlon = d * az.sin() / q;
        if lat2.abs() > FRAC_PI_2 {
            lat2 = if lat2 > 0.0 { PI - lat2 } else { -PI - lat2 };
        }
        LatLon::new(
            Angle::from_radians(lat2),
            Angle::from_radians(lon1 + dlon).normalized_longitude(),
        )
    }

    /// Location a fraction `t` of the way along the rhumb line from `a` to `b`.
    pub fn interpolate_rhumb(t: f64, a: LatLon, b: LatLon) -> LatLon {
        if t <= 0.0 {
            return a;
        }
        if t >= 1.0 {
            return b;
        }
        let azimuth = Self::rhumb_azimuth(a, b);
        let distance = Self::rhumb_distance(a, b);
        Self::rhumb_end_position(a, azimuth, distance * t)
    }

    /// Azimuth of the straight line from `a` to `b` in the lat/lon plane.
    pub fn linear_azimuth(a: LatLon, b: LatLon) -> Angle {
        let dlat = b.latitude.radians() - a.latitude.radians();
        let dlon = wrap_delta_longitude(b.longitude.radians() - a.longitude.radians());
        if dlat == 0.0 && dlon == 0.0 {
            return Angle::ZERO;
        }
        Angle::from_radians(dlon.atan2(dlat))
    }

    /// Length of the straight line from `a` to `b` in the lat/lon plane.
    pub fn linear_distance(a: LatLon, b: LatLon) -> Angle {
        let dlat = b.latitude.radians() - a.latitude.radians();
        let dlon = wrap_delta_longitude(b.longitude.radians() - a.longitude.radians());
        Angle::from_radians((dlat * dlat + dlon * dlon).sqrt())
    }

    /// Lat/lon-plane interpolation between two locations.
    pub fn interpolate_linear(t: f64, a: LatLon, b: LatLon) -> LatLon {
        if t <= 0.0 {
            return a;
        }
        if t >= 1.0 {
            return b;
        }
        let dlon = wrap_delta_longitude(b.longitude.radians() - a.longitude.radians());
        LatLon::new(
            Angle::mix(t, a.latitude, b.latitude),
            Angle::from_radians(a.longitude.radians() + t * dlon).normalized_longitude(),
        )
    }
}

/// A location plus an elevation in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub latitude: Angle,
    pub longitude: Angle,
    pub elevation: f64,
}

impl Position {
    pub fn new(latitude: Angle, longitude: Angle, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self::new(
            Angle::from_degrees(latitude),
            Angle::from_degrees(longitude),
            elevation,
        )
    }

    pub fn from_lat_lon(location: LatLon, elevation: f64) -> Self {
        Self::new(location.latitude, location.longitude, elevation)
    }

    pub fn lat_lon(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }

    /// Whether two positions share latitude and longitude (elevation ignored).
    pub fn same_location(&self, other: &Position) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

impl From<Position> for LatLon {
    fn from(p: Position) -> Self {
        p.lat_lon()
    }
}

fn wrap_delta_longitude(dlon: f64) -> f64 {
    if dlon.abs() > PI {
        if dlon > 0.0 { dlon - TAU } else { dlon + TAU }
    } else {
        dlon
    }
}

fn mercator_delta(lat1: f64, lat2: f64) -> f64 {
    ((lat2 / 2.0 + FRAC_PI_4).tan() / (lat1 / 2.0 + FRAC_PI_4).tan()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    /// A quarter of the equator is a right angle of arc.
    #[test]
    fn test_great_circle_distance_along_equator() {
        let a = LatLon::from_degrees(0.0, 0.0);
        let b = LatLon::from_degrees(0.0, 90.0);
        assert!(close(LatLon::great_circle_distance(a, b).degrees(), 90.0, 1e-9));
    }

    #[test]
    fn test_great_circle_azimuth_due_east_and_north() {
        let a = LatLon::from_degrees(0.0, 0.0);
        let east = LatLon::from_degrees(0.0, 10.0);
        let north = LatLon::from_degrees(10.0, 0.0);
        assert!(close(LatLon::great_circle_azimuth(a, east).degrees(), 90.0, 1e-9));
        assert!(close(LatLon::great_circle_azimuth(a, north).degrees(), 0.0, 1e-9));
    }

    /// Travelling the computed azimuth and distance lands on the target.
    #[test]
    fn test_great_circle_end_position_reaches_target() {
        let a = LatLon::from_degrees(34.0, -118.0);
        let b = LatLon::from_degrees(40.7, -74.0);
        let az = LatLon::great_circle_azimuth(a, b);
        let d = LatLon::great_circle_distance(a, b);
        let end = LatLon::great_circle_end_position(a, az, d);
        assert!(close(end.latitude.degrees(), 40.7, 1e-7));
        assert!(close(end.longitude.degrees(), -74.0, 1e-7));
    }

    #[test]
    fn test_rhumb_end_position_reaches_target() {
        let a = LatLon::from_degrees(10.0, 20.0);
        let b = LatLon::from_degrees(30.0, 50.0);
        let az = LatLon::rhumb_azimuth(a, b);
        let d = LatLon::rhumb_distance(a, b);
        let end = LatLon::rhumb_end_position(a, az, d);
        assert!(close(end.latitude.degrees(), 30.0, 1e-7));
        assert!(close(end.longitude.degrees(), 50.0, 1e-7));
    }

    #[test]
    fn test_interpolation_endpoints() {
        let a = LatLon::from_degrees(10.0, 20.0);
        let b = LatLon::from_degrees(30.0, 50.0);
        assert_eq!(LatLon::interpolate_great_circle(0.0, a, b), a);
        assert_eq!(LatLon::interpolate_rhumb(1.0, a, b), b);
        let mid = LatLon::interpolate_linear(0.5, a, b);
        assert!(close(mid.latitude.degrees(), 20.0, 1e-9));
        assert!(close(mid.longitude.degrees(), 35.0, 1e-9));
    }

    /// Linear interpolation takes the short way across the antimeridian.
    #[test]
    fn test_linear_interpolation_crosses_antimeridian() {
        let a = LatLon::from_degrees(0.0, 170.0);
        let b = LatLon::from_degrees(0.0, -170.0);
        let mid = LatLon::interpolate_linear(0.5, a, b);
        assert!(close(mid.longitude.degrees().abs(), 180.0, 1e-9));
    }
}
