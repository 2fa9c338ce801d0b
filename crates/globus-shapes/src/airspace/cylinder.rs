//! Partial capped cylinder: an annular wedge between two azimuths, optionally
//! closed by radial walls.

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

/// Line segments along the bottom and top rows of a wall grid, plus its
/// vertical end edges when the wall does not close on itself.
pub(crate) fn wall_outline_indices(cols: u32, rows: u32, closed: bool) -> Vec<u32> {
    let stride = cols + 1;
    let mut out = Vec::new();
    for row in [0, rows] {
        for i in 0..cols {
            out.extend([row * stride + i, row * stride + i + 1]);
        }
    }
    if !closed {
        for j in 0..rows {
            out.extend([j * stride, (j + 1) * stride]);
            out.extend([j * stride + cols, (j + 1) * stride + cols]);
        }
    }
    out
}

#[derive(Debug)]
pub struct PartialCappedCylinder {
    base: AirspaceBase,
    center: Option<LatLon>,
    inner_radius: f64,
    outer_radius: f64,
    left_azimuth: Angle,
    right_azimuth: Angle,
    enable_caps: bool,
}

impl PartialCappedCylinder {
    pub fn new(cache: Rc<RefCell<GeometryCache>>) -> Self {
        Self {
            base: AirspaceBase::new(cache),
            center: None,
            inner_radius: 0.0,
            outer_radius: 1.0,
            left_azimuth: Angle::ZERO,
            right_azimuth: Angle::ZERO,
            enable_caps: true,
        }
    }

    pub fn center(&self) -> Option<LatLon> {
        self.center
    }

    pub fn set_center(&mut self, center: LatLon) {
        self.center = Some(center);
        self.base.set_extent_out_of_date();
    }

    /// Inner and outer radius in meters.
    pub fn radii(&self) -> (f64, f64) {
        (self.inner_radius, self.outer_radius)
    }

    pub fn set_radii(&mut self, inner: f64, outer: f64) -> Result<(), ShapeError> {
        if !inner.is_finite() || !outer.is_finite() || inner < 0.0 || outer <= inner {
            return Err(invalid(format!(
                "cylinder radii must satisfy 0 <= inner < outer, got {inner} and {outer}"
            )));
        }
        self.inner_radius = inner;
        self.outer_radius = outer;
        self.base.set_extent_out_of_date();
        Ok(())
    }

    pub fn azimuths(&self) -> (Angle, Angle) {
        (self.left_azimuth, self.right_azimuth)
    }

    /// Limit the cylinder to the clockwise wedge from `left` to `right`.
    /// Equal azimuths give a full cylinder.
    pub fn set_azimuths(&mut self, left: Angle, right: Angle) {
        self.left_azimuth = left;
        self.right_azimuth = right;
        self.base.set_extent_out_of_date();
    }

    pub fn is_enable_caps(&self) -> bool {
        self.enable_caps
    }

    pub fn set_enable_caps(&mut self, enable: bool) {
        self.enable_caps = enable;
    }

    /// Clockwise sweep from the left azimuth, in `(0, 360]` degrees.
    pub fn sweep(&self) -> Angle {
        let degrees = (self.right_azimuth - self.left_azimuth).degrees().rem_euclid(360.0);
        if degrees == 0.0 {
            Angle::from_degrees(360.0)
        } else {
            Angle::from_degrees(degrees)
        }
    }

    fn is_full(&self) -> bool {
        self.sweep().degrees() >= 360.0
    }
}

impl Airspace for PartialCappedCylinder {
    fn base(&self) -> &AirspaceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AirspaceBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "PartialCappedCylinder"
    }

    fn reference_location(&self) -> Option<LatLon> {
        self.center
    }

    fn extent_locations(&self, globe: &dyn Globe) -> Vec<LatLon> {
        let Some(center) = self.center else {
            return Vec::new();
        };
        let radius = globe.radius();
        let start = self.left_azimuth.radians();
        let sweep = self.sweep().radians();
        let mut out = vec![center];
        for k in 0..=16 {
            let az = start + sweep * f64::from(k) / 16.0;
            let t = glam::DVec3::new(self.outer_radius * az.sin(), self.outer_radius * az.cos(), 0.0);
            out.push(template_location(center, t, radius));
        }
        out
    }

    fn make_geometry(
        &mut self,
        dc: &DrawContext,
        level: &DetailLevel,
    ) -> Result<AirspaceGeometry, ShapeError> {
        let center = self.center.ok_or_else(|| invalid("cylinder has no center"))?;
        let globe = dc.globe()?;
        let stamp = AirspaceBase::frame_stamp(dc)?;
        let placement = Placement {
            center,
            reference: center,
            reference_center: self.base.reference_center(globe.as_ref(), center),
            terrain_enabled: !level.disable_terrain_conformance,
        };
        let slices = level.slices.max(1);
        let stacks = level.stacks.max(1);
        let loops = level.loops.max(1);
        let pillars = level.pillars.max(1);
        let (inner, outer) = (self.inner_radius, self.outer_radius);
        let start = self.left_azimuth;
        let sweep = self.sweep();
        let full = self.is_full();

        let shape_key = |part: &'static str| {
            CacheKey::new("PartialCappedCylinder.vertices")
                .text(part)
                .float(inner)
                .float(outer)
                .float(start.degrees())
                .float(sweep.degrees())
                .int(i64::from(slices))
                .int(i64::from(stacks))
                .int(i64::from(loops))
                .int(i64::from(pillars))
        };
        let mut geometry = AirspaceGeometry::default();

        // Walls.
        let mut walls = vec![(outer, Orientation::Outside, "outer")];
        if inner > 0.0 {
            walls.push((inner, Orientation::Inside, "inner"));
        }
        for (radius, orientation, part) in walls {
            let builder = GeometryBuilder::with_orientation(orientation);
            let vertices = self.base.cached_template_vertices(dc, &stamp, shape_key(part), placement, || {
                let template = builder.partial_cylinder(radius, slices, stacks, start, sweep)?;
                Ok((template, builder.partial_cylinder_indices(slices, stacks)))
            })?;
            let fill = self.base.cached_indices(
                CacheKey::new("PartialCylinder.indices")
                    .int(i64::from(slices))
                    .int(i64::from(stacks))
                    .flag(orientation == Orientation::Inside),
                DrawMode::Triangles,
                || builder.partial_cylinder_indices(slices, stacks),
            );
            let outline = self.base.cached_indices(
                CacheKey::new("PartialCylinder.outline")
                    .int(i64::from(slices))
                    .int(i64::from(stacks))
                    .flag(full),
                DrawMode::Lines,
                || wall_outline_indices(slices, stacks, full),
            );
            geometry.fill.push(GeometryPart::new(Rc::clone(&vertices), fill));
            geometry.outline.push(GeometryPart::new(vertices, outline));
        }

        // Bottom and top disks.
        for (z, orientation, part) in [(0.0, Orientation::Inside, "bottom"), (1.0, Orientation::Outside, "top")] {
            let builder = GeometryBuilder::with_orientation(orientation);
            let vertices = self.base.cached_template_vertices(dc, &stamp, shape_key(part), placement, || {
                let mut template = builder.partial_disk(inner, outer, slices, loops, start, sweep)?;
                template.iter_mut().for_each(|p| p.z = z);
                Ok((template, builder.partial_disk_indices(slices, loops)))
            })?;
            let fill = self.base.cached_indices(
                CacheKey::new("PartialDisk.indices")
                    .int(i64::from(slices))
                    .int(i64::from(loops))
                    .flag(orientation == Orientation::Inside),
                DrawMode::Triangles,
                || builder.partial_disk_indices(slices, loops),
            );
            geometry.fill.push(GeometryPart::new(vertices, fill));
        }

        // Radial caps closing a partial wedge.
        if self.enable_caps && !full {
            let caps = [
                (start, Orientation::Inside, "left"),
                (start + sweep, Orientation::Outside, "right"),
            ];
            for (azimuth, orientation, part) in caps {
                let builder = GeometryBuilder::with_orientation(orientation);
                let vertices = self.base.cached_template_vertices(dc, &stamp, shape_key(part), placement, || {
                    let template = builder.radial_wall(inner, outer, azimuth, pillars, stacks)?;
                    Ok((template, builder.radial_wall_indices(pillars, stacks)))
                })?;
                let fill = self.base.cached_indices(
                    CacheKey::new("RadialWall.indices")
                        .int(i64::from(pillars))
                        .int(i64::from(stacks))
                        .flag(orientation == Orientation::Inside),
                    DrawMode::Triangles,
                    || builder.radial_wall_indices(pillars, stacks),
                );
                let outline = self.base.cached_indices(
                    CacheKey::new("RadialWall.outline")
                        .int(i64::from(pillars))
                        .int(i64::from(stacks)),
                    DrawMode::Lines,
                    || builder.grid_outline_indices(pillars, stacks),
                );
                geometry.fill.push(GeometryPart::new(Rc::clone(&vertices), fill));
                geometry.outline.push(GeometryPart::new(vertices, outline));
            }
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};

    fn cylinder() -> PartialCappedCylinder {
        let mut c = PartialCappedCylinder::new(Rc::new(RefCell::new(GeometryCache::new(16 << 20))));
        c.set_center(LatLon::from_degrees(0.0, 0.0));
        c.set_radii(1000.0, 5000.0).unwrap();
        c.base_mut().set_altitudes(100.0, 2000.0).unwrap();
        c
    }

    fn level() -> DetailLevel {
        DetailLevel {
            slices: 12,
            stacks: 2,
            loops: 3,
            pillars: 4,
            ..DetailLevel::new(0.0)
        }
    }

    #[test]
    fn test_sweep_normalized() {
        let mut c = cylinder();
        assert_eq!(c.sweep().degrees(), 360.0);
        c.set_azimuths(Angle::from_degrees(300.0), Angle::from_degrees(30.0));
        assert!((c.sweep().degrees() - 90.0).abs() < 1e-9);
        c.set_azimuths(Angle::from_degrees(10.0), Angle::from_degrees(370.0));
        assert_eq!(c.sweep().degrees(), 360.0);
    }

    /// A full cylinder has two walls and two disks and no radial caps.
    #[test]
    fn test_full_cylinder_parts() {
        let Frame { dc, .. } = test_support::frame();
        let mut c = cylinder();
        let g = c.make_geometry(&dc, &level()).unwrap();
        assert_eq!(g.fill.len(), 4);
        assert_eq!(g.outline.len(), 2);
        // Outer wall vertices lie at the outer radius from the center axis.
        let wall = &g.fill[0].vertices;
        assert_eq!(wall.vertex_count(), 13 * 3);
    }

    /// A wedge with caps adds the two radial walls.
    #[test]
    fn test_wedge_adds_radial_caps() {
        let Frame { dc, .. } = test_support::frame();
        let mut c = cylinder();
        c.set_azimuths(Angle::from_degrees(0.0), Angle::from_degrees(90.0));
        assert_eq!(c.make_geometry(&dc, &level()).unwrap().fill.len(), 6);
        c.set_enable_caps(false);
        assert_eq!(c.make_geometry(&dc, &level()).unwrap().fill.len(), 4);
    }

    /// Without an inner radius only the outer wall is built.
    #[test]
    fn test_solid_cylinder_has_one_wall() {
        let Frame { dc, .. } = test_support::frame();
        let mut c = cylinder();
        c.set_radii(0.0, 5000.0).unwrap();
        assert_eq!(c.make_geometry(&dc, &level()).unwrap().fill.len(), 3);
    }

    /// Disk heights follow the lower and upper altitudes.
    #[test]
    fn test_disks_at_altitudes() {
        let Frame { dc, globe, .. } = test_support::frame();
        let mut c = cylinder();
        let g = c.make_geometry(&dc, &level()).unwrap();
        let height = |part: &GeometryPart| {
            let p = part.vertices.vertices()[0].to_dvec3() + part.vertices.reference_center();
            globe.compute_position_from_point(p).elevation
        };
        assert!((height(&g.fill[2]) - 100.0).abs() < 0.5);
        assert!((height(&g.fill[3]) - 2000.0).abs() < 0.5);
    }

    #[test]
    fn test_invalid_radii() {
        let mut c = cylinder();
        assert!(c.set_radii(5.0, 5.0).is_err());
        assert!(c.set_radii(-1.0, 5.0).is_err());
        assert_eq!(c.radii(), (1000.0, 5000.0));
    }

    #[test]
    fn test_open_wall_outline_has_end_edges() {
        assert_eq!(wall_outline_indices(4, 1, true).len(), 16);
        assert_eq!(wall_outline_indices(4, 1, false).len(), 20);
    }
}
