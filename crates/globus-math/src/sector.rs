//! Latitude/longitude-aligned rectangular regions of the globe.

use crate::{Angle, LatLon};

/// A region bounded by two parallels and two meridians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sector {
    pub min_latitude: Angle,
    pub max_latitude: Angle,
    pub min_longitude: Angle,
    pub max_longitude: Angle,
}

impl Sector {
    /// The whole globe.
    pub const FULL_SPHERE: Sector = Sector {
        min_latitude: Angle::from_radians(-std::f64::consts::FRAC_PI_2),
        max_latitude: Angle::from_radians(std::f64::consts::FRAC_PI_2),
        min_longitude: Angle::from_radians(-std::f64::consts::PI),
        max_longitude: Angle::from_radians(std::f64::consts::PI),
    };

    pub fn new(
        min_latitude: Angle,
        max_latitude: Angle,
        min_longitude: Angle,
        max_longitude: Angle,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    pub fn from_degrees(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self::new(
            Angle::from_degrees(min_lat),
            Angle::from_degrees(max_lat),
            Angle::from_degrees(min_lon),
            Angle::from_degrees(max_lon),
        )
    }

    /// Smallest sector containing every location, or `None` for an empty input.
    pub fn bounding<I>(locations: I) -> Option<Sector>
    where
        I: IntoIterator<Item = LatLon>,
    {
        let mut iter = locations.into_iter();
        let first = iter.next()?;
        let mut sector = Sector::new(
            first.latitude,
            first.latitude,
            first.longitude,
            first.longitude,
        );
        for ll in iter {
            if ll.latitude < sector.min_latitude {
                sector.min_latitude = ll.latitude;
            }
            if ll.latitude > sector.max_latitude {
                sector.max_latitude = ll.latitude;
            }
            if ll.longitude < sector.min_longitude {
                sector.min_longitude = ll.longitude;
            }
            if ll.longitude > sector.max_longitude {
                sector.max_longitude = ll.longitude;
            }
        }
        Some(sector)
    }

    pub fn delta_latitude(&self) -> Angle {
        self.max_latitude - self.min_latitude
    }

    pub fn delta_longitude(&self) -> Angle {
        self.max_longitude - self.min_longitude
    }

    pub fn centroid(&self) -> LatLon {
        LatLon::new(
            self.min_latitude.midpoint(self.max_latitude),
            self.min_longitude.midpoint(self.max_longitude),
        )
    }

    /// Corners in counter-clockwise order starting at the south-west corner.
    pub fn corners(&self) -> [LatLon; 4] {
        [
            LatLon::new(self.min_latitude, self.min_longitude),
            LatLon::new(self.min_latitude, self.max_longitude),
            LatLon::new(self.max_latitude, self.max_longitude),
            LatLon::new(self.max_latitude, self.min_longitude),
        ]
    }

    pub fn contains(&self, location: LatLon) -> bool {
        location.latitude >= self.min_latitude
            && location.latitude <= self.max_latitude
            && location.longitude >= self.min_longitude
            && location.longitude <= self.max_longitude
    }

    pub fn intersects(&self, other: &Sector) -> bool {
        !(other.max_longitude < self.min_longitude
            || other.min_longitude > self.max_longitude
            || other.max_latitude < self.min_latitude
            || other.min_latitude > self.max_latitude)
    }

    /// Overlap of the two sectors, `None` when they are disjoint.
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        if !self.intersects(other) {
            return None;
        }
        let min_lat = max_angle(self.min_latitude, other.min_latitude);
        let max_lat = min_angle(self.max_latitude, other.max_latitude);
        let min_lon = max_angle(self.min_longitude, other.min_longitude);
        let max_lon = min_angle(self.max_longitude, other.max_longitude);
        Some(Sector::new(min_lat, max_lat, min_lon, max_lon))
    }

    /// Split into cells of at most `cell_size` on a side, aligned to this
    /// sector's south-west corner. Edge cells are clipped to the sector.
    pub fn subdivide_by_size(&self, cell_size: Angle) -> Vec<Sector> {
        let size = cell_size.radians();
        if size <= 0.0 {
            return vec![*self];
        }
        let rows = (self.delta_latitude().radians() / size).ceil().max(1.0) as usize;
        let cols = (self.delta_longitude().radians() / size).ceil().max(1.0) as usize;
        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let lat0 = self.min_latitude.radians() + row as f64 * size;
            let lat1 = (lat0 + size).min(self.max_latitude.radians());
            for col in 0..cols {
                let lon0 = self.min_longitude.radians() + col as f64 * size;
                let lon1 = (lon0 + size).min(self.max_longitude.radians());
                cells.push(Sector::new(
                    Angle::from_radians(lat0),
                    Angle::from_radians(lat1),
                    Angle::from_radians(lon0),
                    Angle::from_radians(lon1),
                ));
            }
        }
        cells
    }
}

fn max_angle(a: Angle, b: Angle) -> Angle {
    if a > b { a } else { b }
}

fn min_angle(a: Angle, b: Angle) -> Angle {
    if a < b { a } else { b }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_sector() {
        let s = Sector::bounding([
            LatLon::from_degrees(10.0, 20.0),
            LatLon::from_degrees(-5.0, 40.0),
            LatLon::from_degrees(3.0, 25.0),
        ])
        .unwrap();
        assert!((s.min_latitude.degrees() + 5.0).abs() < 1e-12);
        assert!((s.max_longitude.degrees() - 40.0).abs() < 1e-12);
        assert!(Sector::bounding(std::iter::empty()).is_none());
    }

    /// Subdivision covers the sector with clipped edge cells.
    #[test]
    fn test_subdivide_by_size_clips_edges() {
        let s = Sector::from_degrees(0.0, 25.0, 0.0, 10.0);
        let cells = s.subdivide_by_size(Angle::from_degrees(10.0));
        assert_eq!(cells.len(), 3);
        assert!((cells[2].max_latitude.degrees() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersection_of_disjoint_sectors_is_none() {
        let a = Sector::from_degrees(0.0, 10.0, 0.0, 10.0);
        let b = Sector::from_degrees(20.0, 30.0, 0.0, 10.0);
        assert!(a.intersection(&b).is_none());
        let c = Sector::from_degrees(5.0, 30.0, 5.0, 30.0);
        let i = a.intersection(&c).unwrap();
        assert!((i.min_latitude.degrees() - 5.0).abs() < 1e-12);
    }
}
