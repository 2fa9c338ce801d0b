//! Orbit: a racetrack between two locations, the round ends centered on the
//! (optionally offset) center line.

use std::cell::RefCell;
use std::rc::Rc;

use globus_geometry::{CacheKey, DrawMode, GeometryBuilder, GeometryCache, Orientation};
use globus_math::{Angle, Globe, LatLon};
use globus_render::DrawContext;

use super::base::{template_location, Placement};
use super::{Airspace, AirspaceBase, AirspaceGeometry, GeometryPart};
use crate::detail::DetailLevel;
use crate::error::invalid;
use crate::ShapeError;

/// Side of the defining line the racetrack lies on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OrbitType {
    Left,
    #[default]
    Center,
    Right,
}

impl OrbitType {
    fn code(self) -> i64 {
        match self {
            OrbitType::Left => -1,
            OrbitType::Center => 0,
            OrbitType::Right => 1,
        }
    }
}

/// Racetrack center line: midpoint, straight-side length in meters, heading.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CenterLine {
    center: LatLon,
    length: f64,
    heading: Angle,
}

#[derive(Debug)]
pub struct Orbit {
    base: AirspaceBase,
    locations: Option<[LatLon; 2]>,
    orbit_type: OrbitType,
    width: f64,
}

impl Orbit {
    pub fn new(cache: Rc<RefCell<GeometryCache>>) -> Self {
        Self {
            base: AirspaceBase::new(cache),
            locations: None,
            orbit_type: OrbitType::default(),
            width: 1.0,
        }
    }

    pub fn locations(&self) -> Option<(LatLon, LatLon)> {
        self.locations.map(|[a, b]| (a, b))
    }

    pub fn set_locations(&mut self, a: LatLon, b: LatLon) {
        self.locations = Some([a, b]);
        self.base.set_extent_out_of_date();
    }

    pub fn orbit_type(&self) -> OrbitType {
        self.orbit_type
    }

    pub fn set_orbit_type(&mut self, orbit_type: OrbitType) {
        self.orbit_type = orbit_type;
        self.base.set_extent_out_of_date();
    }

    /// Full width (twice the end radius) in meters.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_width(&mut self, width: f64) -> Result<(), ShapeError> {
        if !width.is_finite() || width < 0.0 {
            return Err(invalid(format!("orbit width must be non-negative, got {width}")));
        }
        self.width = width;
        self.base.set_extent_out_of_date();
        Ok(())
    }

    fn center_line(&self, globe: &dyn Globe) -> Option<CenterLine> {
        let [a, b] = self.locations?;
        let radius = globe.radius();
        let offset = Angle::from_radians(self.width / 2.0 / radius);
        let quarter = Angle::from_degrees(90.0);
        let (a, b) = match self.orbit_type {
            OrbitType::Center => (a, b),
            side => {
                let turn = if side == OrbitType::Left { -quarter } else { quarter };
                let forward = LatLon::great_circle_azimuth(a, b);
                let back = LatLon::great_circle_azimuth(b, a);
                (
                    LatLon::great_circle_end_position(a, forward + turn, offset),
                    LatLon::great_circle_end_position(b, back - turn, offset),
                )
            }
        };
        let center = LatLon::interpolate_great_circle(0.5, a, b);
        Some(CenterLine {
            center,
            length: LatLon::great_circle_distance(a, b).radians() * radius,
            heading: LatLon::great_circle_azimuth(center, b),
        })
    }
}

impl Airspace for Orbit {
    fn base(&self) -> &AirspaceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AirspaceBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "Orbit"
    }

    fn reference_location(&self) -> Option<LatLon> {
        self.locations.map(|[a, _]| a)
    }

    fn extent_locations(&self, globe: &dyn Globe) -> Vec<LatLon> {
        let Some(line) = self.center_line(globe) else {
            return Vec::new();
        };
        let radius = globe.radius();
        GeometryBuilder::new()
            .long_perimeter(self.width / 2.0, line.length, line.heading, 8, 2)
            .map(|ring| {
                ring.into_iter()
                    .map(|t| template_location(line.center, t, radius))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn make_geometry(
        &mut self,
        dc: &DrawContext,
        level: &DetailLevel,
    ) -> Result<AirspaceGeometry, ShapeError> {
        let globe = dc.globe()?;
        let (line, reference) = match (self.center_line(globe.as_ref()), self.reference_location()) {
            (Some(l), Some(r)) => (l, r),
            _ => return Err(invalid("orbit has no locations")),
        };
        let stamp = AirspaceBase::frame_stamp(dc)?;
        let placement = Placement {
            center: line.center,
            reference,
            reference_center: self.base.reference_center(globe.as_ref(), reference),
            terrain_enabled: !level.disable_terrain_conformance,
        };
        let radius = self.width / 2.0;
        let arc = (level.slices / 2).max(1);
        let length_slices = level.length_slices.max(1);
        let stacks = level.stacks.max(1);
        let loops = level.loops.max(1);
        let ring = 2 * (arc + length_slices);

        let shape_key = |part: &'static str| {
            CacheKey::new("Orbit.vertices")
                .text(part)
                .int(self.orbit_type.code())
                .float(radius)
                .float(line.length)
                .float(line.heading.degrees())
                .int(i64::from(arc))
                .int(i64::from(length_slices))
                .int(i64::from(stacks))
                .int(i64::from(loops))
        };
        let wall_key = shape_key("wall");
        let disk_keys = [shape_key("bottom"), shape_key("top")];
        let mut geometry = AirspaceGeometry::default();

        let builder = GeometryBuilder::new();
        let wall = self.base.cached_template_vertices(dc, &stamp, wall_key, placement, || {
            let template = builder.long_cylinder(radius, line.length, line.heading, arc, length_slices, stacks)?;
            Ok((template, builder.long_cylinder_indices(arc, length_slices, stacks)))
        })?;
        let fill = self.base.cached_indices(
            CacheKey::new("LongCylinder.indices")
                .int(i64::from(arc))
                .int(i64::from(length_slices))
                .int(i64::from(stacks)),
            DrawMode::Triangles,
            || builder.long_cylinder_indices(arc, length_slices, stacks),
        );
        let outline = self.base.cached_indices(
            CacheKey::new("LongCylinder.outline")
                .int(i64::from(ring))
                .int(i64::from(stacks)),
            DrawMode::Lines,
            || {
                let mut indices = builder.closed_ring_outline_indices(ring, 0);
                indices.extend(builder.closed_ring_outline_indices(ring, stacks));
                indices
            },
        );
        geometry.fill.push(GeometryPart::new(Rc::clone(&wall), fill));
        geometry.outline.push(GeometryPart::new(wall, outline));

        let disks = [(0.0, Orientation::Inside), (1.0, Orientation::Outside)];
        for ((z, orientation), key) in disks.into_iter().zip(disk_keys) {
            let builder = GeometryBuilder::with_orientation(orientation);
            let vertices = self.base.cached_template_vertices(dc, &stamp, key, placement, || {
                let mut template =
                    builder.long_disk(radius, line.length, line.heading, arc, length_slices, loops)?;
                template.iter_mut().for_each(|p| p.z = z);
                Ok((template, builder.long_disk_indices(arc, length_slices, loops)))
            })?;
            let fill = self.base.cached_indices(
                CacheKey::new("LongDisk.indices")
                    .int(i64::from(arc))
                    .int(i64::from(length_slices))
                    .int(i64::from(loops))
                    .flag(orientation == Orientation::Inside),
                DrawMode::Triangles,
                || builder.long_disk_indices(arc, length_slices, loops),
            );
            geometry.fill.push(GeometryPart::new(vertices, fill));
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::SphericalGlobe;

    fn orbit(orbit_type: OrbitType) -> Orbit {
        let mut o = Orbit::new(Rc::new(RefCell::new(GeometryCache::new(16 << 20))));
        o.set_locations(LatLon::from_degrees(0.0, 0.0), LatLon::from_degrees(0.0, 0.2));
        o.set_width(4000.0).unwrap();
        o.set_orbit_type(orbit_type);
        o
    }

    /// Left and right orbits shift the center line by half the width.
    #[test]
    fn test_center_line_offset() {
        let globe = SphericalGlobe::earth();
        let center = orbit(OrbitType::Center).center_line(&globe).unwrap();
        let left = orbit(OrbitType::Left).center_line(&globe).unwrap();
        let right = orbit(OrbitType::Right).center_line(&globe).unwrap();
        let d = |a, b| LatLon::great_circle_distance(a, b).radians() * globe.radius();
        assert!((d(center.center, left.center) - 2000.0).abs() < 1.0);
        assert!(left.center.latitude.degrees() > 0.0);
        assert!(right.center.latitude.degrees() < 0.0);
        assert!((center.heading.degrees() - 90.0).abs() < 1e-6);
        assert!((center.length - d(LatLon::from_degrees(0.0, 0.0), LatLon::from_degrees(0.0, 0.2))).abs() < 1e-6);
    }

    /// Wall plus two caps, the wall ring sized by the detail level.
    #[test]
    fn test_orbit_geometry() {
        let Frame { dc, .. } = test_support::frame();
        let mut o = orbit(OrbitType::Center);
        let level = DetailLevel {
            slices: 8,
            length_slices: 3,
            stacks: 1,
            loops: 2,
            ..DetailLevel::new(0.0)
        };
        let g = o.make_geometry(&dc, &level).unwrap();
        assert_eq!(g.fill.len(), 3);
        let ring = 2 * (4 + 3);
        assert_eq!(g.fill[0].vertices.vertex_count(), ring * 2);
        assert_eq!(g.fill[1].vertices.vertex_count(), ring * 3);
        assert_eq!(g.outline[0].indices.element_count(), ring * 4);
    }

    #[test]
    fn test_extent_covers_ends() {
        let globe = SphericalGlobe::earth();
        let o = orbit(OrbitType::Center);
        let locations = o.extent_locations(&globe);
        assert!(!locations.is_empty());
        let max_lon = locations
            .iter()
            .map(|l| l.longitude.degrees())
            .fold(f64::MIN, f64::max);
        // The east end cap reaches a radius beyond the second location.
        assert!(max_lon > 0.2);
    }
}
