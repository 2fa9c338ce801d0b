//! Tracks: chains of box legs whose shared ends are mitred together, and
//! routes, tracks built from a polyline and a single width.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use globus_geometry::GeometryCache;
use globus_math::{Angle, Globe, LatLon, Plane, Sphere};
use globus_render::DrawContext;

use super::{Airspace, AirspaceBase, AirspaceGeometry, BoxAirspace};
use crate::detail::DetailLevel;
use crate::error::invalid;
use crate::ShapeError;

/// Turn angles below this use extend-and-clip joins instead of bisection.
pub const DEFAULT_SMALL_ANGLE_THRESHOLD_DEG: f64 = 22.5;

/// Replacement corners for the shared edge between two legs.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Join {
    /// New `[left, right]` end corners of the first leg.
    end: [LatLon; 2],
    /// New `[left, right]` begin corners of the second leg.
    begin: [LatLon; 2],
}

/// A sequence of box legs drawn as one airspace.
#[derive(Debug)]
pub struct TrackAirspace {
    base: AirspaceBase,
    legs: Vec<BoxAirspace>,
    enable_legs_joining: bool,
    small_angle_threshold: Angle,
    /// Legs take altitudes and datums from the track rather than their own.
    legs_follow_track: bool,
}

impl TrackAirspace {
    pub fn new(cache: Rc<RefCell<GeometryCache>>) -> Self {
        Self {
            base: AirspaceBase::new(cache),
            legs: Vec::new(),
            enable_legs_joining: true,
            small_angle_threshold: Angle::from_degrees(DEFAULT_SMALL_ANGLE_THRESHOLD_DEG),
            legs_follow_track: false,
        }
    }

    pub fn legs(&self) -> &[BoxAirspace] {
        &self.legs
    }

    /// Append a leg sharing the track's geometry cache.
    pub fn add_leg(
        &mut self,
        begin: LatLon,
        end: LatLon,
        altitudes: (f64, f64),
        widths: (f64, f64),
    ) -> Result<&mut BoxAirspace, ShapeError> {
        let mut leg = BoxAirspace::new(Rc::clone(self.base.cache()));
        leg.set_locations(begin, end);
        leg.set_widths(widths.0, widths.1)?;
        leg.base_mut().set_altitudes(altitudes.0, altitudes.1)?;
        let (lower, upper) = self.base.datums();
        leg.base_mut().set_altitude_datums(lower, upper);
        self.legs.push(leg);
        self.base.set_extent_out_of_date();
        let last = self.legs.len() - 1;
        Ok(&mut self.legs[last])
    }

    pub fn leg_mut(&mut self, index: usize) -> Option<&mut BoxAirspace> {
        self.base.set_extent_out_of_date();
        self.legs.get_mut(index)
    }

    pub fn remove_all_legs(&mut self) {
        self.legs.clear();
        self.base.set_extent_out_of_date();
    }

    pub fn is_enable_legs_joining(&self) -> bool {
        self.enable_legs_joining
    }

    pub fn set_enable_legs_joining(&mut self, enable: bool) {
        self.enable_legs_joining = enable;
        self.base.set_extent_out_of_date();
    }

    pub fn small_angle_threshold(&self) -> Angle {
        self.small_angle_threshold
    }

    pub fn set_small_angle_threshold(&mut self, threshold: Angle) -> Result<(), ShapeError> {
        let degrees = threshold.degrees();
        if !(0.0..=180.0).contains(&degrees) {
            return Err(invalid(format!(
                "small angle threshold must be in [0, 180] degrees, got {degrees}"
            )));
        }
        self.small_angle_threshold = threshold;
        self.base.set_extent_out_of_date();
        Ok(())
    }

    fn sync_legs(&mut self) -> Result<(), ShapeError> {
        if !self.legs_follow_track {
            return Ok(());
        }
        let (lower, upper) = self.base.altitudes();
        let (lower_datum, upper_datum) = self.base.datums();
        let ground = self.base.ground_reference();
        for leg in &mut self.legs {
            let b = leg.base_mut();
            if b.altitudes() != (lower, upper) {
                b.set_altitudes(lower, upper)?;
            }
            if b.datums() != (lower_datum, upper_datum) {
                b.set_altitude_datums(lower_datum, upper_datum);
            }
            if b.ground_reference() != ground {
                b.set_ground_reference(ground);
            }
        }
        Ok(())
    }

    /// Recompute the mitred corners between consecutive legs.
    fn join_legs(&mut self, globe: &dyn Globe) {
        let mut begins: Vec<Option<[LatLon; 2]>> = vec![None; self.legs.len()];
        let mut ends: Vec<Option<[LatLon; 2]>> = vec![None; self.legs.len()];
        if self.enable_legs_joining {
            for i in 1..self.legs.len() {
                let join = compute_join(globe, &self.legs[i - 1], &self.legs[i], self.small_angle_threshold);
                if let Some(join) = join {
                    ends[i - 1] = Some(join.end);
                    begins[i] = Some(join.begin);
                }
            }
        }
        for (leg, (begin, end)) in self.legs.iter_mut().zip(begins.into_iter().zip(ends)) {
            leg.set_begin_corners(begin);
            leg.set_end_corners(end);
        }
    }
}

/// Whether two consecutive legs meet at one location with matching
/// altitudes and datums.
fn can_join(a: &BoxAirspace, b: &BoxAirspace) -> bool {
    let (Some((_, a_end)), Some((b_begin, _))) = (a.locations(), b.locations()) else {
        return false;
    };
    a_end == b_begin
        && a.base().altitudes() == b.base().altitudes()
        && a.base().datums() == b.base().datums()
}

fn surface_point(globe: &dyn Globe, location: LatLon) -> DVec3 {
    globe.compute_point_from_position(location.latitude, location.longitude, 0.0)
}

/// Component of `v` in the plane perpendicular to `normal`, normalized.
fn tangent_direction(v: DVec3, normal: DVec3) -> Option<DVec3> {
    (v - normal * v.dot(normal)).try_normalize()
}

/// Parameter along `origin + t * direction` where it meets `plane`.
fn intersection_parameter(origin: DVec3, direction: DVec3, plane: &Plane) -> Option<f64> {
    let denom = plane.normal.dot(direction);
    if denom.abs() <= f64::EPSILON {
        return None;
    }
    Some(-plane.signed_distance(origin) / denom)
}

fn compute_join(globe: &dyn Globe, first: &BoxAirspace, second: &BoxAirspace, small_angle: Angle) -> Option<Join> {
    if !can_join(first, second) {
        return None;
    }
    let (begin, shared) = first.locations()?;
    let (_, end) = second.locations()?;
    let [fbl, fbr, fel, fer] = first.standard_corners(globe)?.map(|c| surface_point(globe, c));
    let [sbl, sbr, sel, ser] = second.standard_corners(globe)?.map(|c| surface_point(globe, c));

    let vertex = surface_point(globe, shared);
    let normal = globe.surface_normal_at_location(shared);
    let d1 = tangent_direction(vertex - surface_point(globe, begin), normal)?;
    let d2 = tangent_direction(surface_point(globe, end) - vertex, normal)?;
    let bisector = (d1 + d2).try_normalize()?;
    let plane = Plane::from_point_normal(vertex, bisector)?;

    // The mitre must not cut through either leg's far cap.
    if plane.intersects_segment(fbl, fbr) || plane.intersects_segment(sel, ser) {
        tracing::trace!("track legs overlap at their join, leaving caps in place");
        return None;
    }

    let interior = (-d1).dot(d2).clamp(-1.0, 1.0).acos();
    let clip = interior < small_angle.radians();
    let max_width = first.widths().0.max(first.widths().1).max(second.widths().0).max(second.widths().1);

    // Each edge runs from the far corner (t = 0) to the shared-end corner (t = 1).
    let join_edge = |from: DVec3, to: DVec3| -> Option<DVec3> {
        let direction = to - from;
        let length = direction.length();
        let mut t = intersection_parameter(from, direction, &plane)?;
        if clip && length > 0.0 {
            t = t.min(1.0 + max_width / length);
        }
        Some(from + direction * t)
    };
    let to_location = |p: DVec3| globe.compute_position_from_point(p).lat_lon();

    Some(Join {
        end: [to_location(join_edge(fbl, fel)?), to_location(join_edge(fbr, fer)?)],
        begin: [to_location(join_edge(sel, sbl)?), to_location(join_edge(ser, sbr)?)],
    })
}

impl Airspace for TrackAirspace {
    fn base(&self) -> &AirspaceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AirspaceBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "TrackAirspace"
    }

    fn reference_location(&self) -> Option<LatLon> {
        self.legs.first().and_then(|l| l.reference_location())
    }

    fn extent_locations(&self, globe: &dyn Globe) -> Vec<LatLon> {
        self.legs.iter().flat_map(|l| l.extent_locations(globe)).collect()
    }

    /// Sphere around every leg's bounding points, each leg at its own
    /// altitudes. Cached per globe like any other airspace extent.
    fn compute_extent(&mut self, dc: &DrawContext) -> Result<Sphere, ShapeError> {
        if let Some(info) = self.base.info(dc) {
            return Ok(info.extent);
        }
        if self.legs.is_empty() {
            return Err(invalid("track has no legs"));
        }
        self.sync_legs()?;
        let globe = dc.globe()?;
        self.join_legs(globe.as_ref());
        let mut points = Vec::new();
        for leg in &mut self.legs {
            leg.compute_extent(dc)?;
            if let Some(info) = leg.base().info(dc) {
                points.extend_from_slice(&info.minimal_geometry);
            }
        }
        self.base.store_extent(dc, points)
    }

    fn make_geometry(
        &mut self,
        dc: &DrawContext,
        level: &DetailLevel,
    ) -> Result<AirspaceGeometry, ShapeError> {
        self.sync_legs()?;
        let globe = dc.globe()?;
        self.join_legs(globe.as_ref());
        let mut geometry = AirspaceGeometry::default();
        for leg in &mut self.legs {
            geometry.extend(leg.make_geometry(dc, level)?);
        }
        Ok(geometry)
    }
}

/// A track whose legs follow a polyline at one width, centered on it.
#[derive(Debug)]
pub struct Route {
    track: TrackAirspace,
    locations: Vec<LatLon>,
    width: f64,
}

impl Route {
    pub fn new(cache: Rc<RefCell<GeometryCache>>) -> Self {
        let mut track = TrackAirspace::new(cache);
        track.legs_follow_track = true;
        Self {
            track,
            locations: Vec::new(),
            width: 1.0,
        }
    }

    pub fn locations(&self) -> &[LatLon] {
        &self.locations
    }

    pub fn set_locations(&mut self, locations: Vec<LatLon>) -> Result<(), ShapeError> {
        self.locations = locations;
        self.rebuild_legs()
    }

    /// Full width in meters.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_width(&mut self, width: f64) -> Result<(), ShapeError> {
        if !width.is_finite() || width < 0.0 {
            return Err(invalid(format!("route width must be non-negative, got {width}")));
        }
        self.width = width;
        self.rebuild_legs()
    }

    pub fn track(&self) -> &TrackAirspace {
        &self.track
    }

    pub fn track_mut(&mut self) -> &mut TrackAirspace {
        &mut self.track
    }

    fn rebuild_legs(&mut self) -> Result<(), ShapeError> {
        self.track.remove_all_legs();
        let altitudes = self.track.base.altitudes();
        let half = self.width / 2.0;
        for pair in self.locations.windows(2) {
            self.track.add_leg(pair[0], pair[1], altitudes, (half, half))?;
        }
        Ok(())
    }
}

impl Airspace for Route {
    fn base(&self) -> &AirspaceBase {
        &self.track.base
    }

    fn base_mut(&mut self) -> &mut AirspaceBase {
        &mut self.track.base
    }

    fn kind(&self) -> &'static str {
        "Route"
    }

    fn reference_location(&self) -> Option<LatLon> {
        self.track.reference_location()
    }

    fn extent_locations(&self, globe: &dyn Globe) -> Vec<LatLon> {
        self.track.extent_locations(globe)
    }

    fn compute_extent(&mut self, dc: &DrawContext) -> Result<Sphere, ShapeError> {
        self.track.compute_extent(dc)
    }

    fn make_geometry(
        &mut self,
        dc: &DrawContext,
        level: &DetailLevel,
    ) -> Result<AirspaceGeometry, ShapeError> {
        self.track.make_geometry(dc, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::SphericalGlobe;

    fn cache() -> Rc<RefCell<GeometryCache>> {
        Rc::new(RefCell::new(GeometryCache::new(16 << 20)))
    }

    fn close(a: LatLon, b: LatLon) -> bool {
        LatLon::great_circle_distance(a, b).radians() * 6_378_137.0 < 0.01
    }

    /// A right-angle turn mitres both legs to the same shared edge.
    #[test]
    fn test_right_angle_legs_share_mitred_edge() {
        let globe = SphericalGlobe::earth();
        let mut track = TrackAirspace::new(cache());
        let a = LatLon::from_degrees(0.0, 0.0);
        let v = LatLon::from_degrees(0.0, 0.2);
        let b = LatLon::from_degrees(0.2, 0.2);
        track.add_leg(a, v, (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
        track.add_leg(v, b, (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
        track.join_legs(&globe);

        let first = track.legs()[0].corners(&globe).unwrap();
        let second = track.legs()[1].corners(&globe).unwrap();
        assert!(close(first[2], second[0]));
        assert!(close(first[3], second[1]));
        // The far caps are untouched.
        let standard = track.legs()[0].standard_corners(&globe).unwrap();
        assert_eq!(first[0], standard[0]);
        assert_eq!(first[1], standard[1]);
    }

    /// A bisecting plane that cuts a leg's far cap leaves both legs unjoined.
    #[test]
    fn test_overlapping_legs_are_not_joined() {
        let globe = SphericalGlobe::earth();
        let mut track = TrackAirspace::new(cache());
        let a = LatLon::from_degrees(0.0, 0.0);
        let v = LatLon::from_degrees(0.0, 0.01);
        let b = LatLon::from_degrees(0.1, 0.01);
        track.add_leg(a, v, (0.0, 1000.0), (5000.0, 5000.0)).unwrap();
        track.add_leg(v, b, (0.0, 1000.0), (5000.0, 5000.0)).unwrap();
        track.join_legs(&globe);

        for leg in track.legs() {
            assert_eq!(leg.corners(&globe), leg.standard_corners(&globe));
        }
    }

    /// Legs at different altitudes keep their own caps.
    #[test]
    fn test_mismatched_altitudes_not_joined() {
        let globe = SphericalGlobe::earth();
        let mut track = TrackAirspace::new(cache());
        let v = LatLon::from_degrees(0.0, 0.2);
        track.add_leg(LatLon::from_degrees(0.0, 0.0), v, (0.0, 1000.0), (100.0, 100.0)).unwrap();
        track.add_leg(v, LatLon::from_degrees(0.2, 0.2), (0.0, 2000.0), (100.0, 100.0)).unwrap();
        track.join_legs(&globe);
        for leg in track.legs() {
            assert_eq!(leg.corners(&globe), leg.standard_corners(&globe));
        }
    }

    /// A hairpin below the small-angle threshold clips the outer corner near
    /// the leg end instead of flinging it far past the turn.
    #[test]
    fn test_acute_turn_is_clipped() {
        let globe = SphericalGlobe::earth();
        let a = LatLon::from_degrees(0.0, 0.0);
        let v = LatLon::from_degrees(0.0, 0.5);
        let b = LatLon::from_degrees(0.05, 0.0);
        let outer_shift = |threshold: f64| {
            let mut track = TrackAirspace::new(cache());
            track.set_small_angle_threshold(Angle::from_degrees(threshold)).unwrap();
            track.add_leg(a, v, (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
            track.add_leg(v, b, (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
            track.join_legs(&globe);
            let corners = track.legs()[0].corners(&globe).unwrap();
            let standard = track.legs()[0].standard_corners(&globe).unwrap();
            // Turning left, the right edge is on the outside of the turn.
            LatLon::great_circle_distance(corners[3], standard[3]).radians() * globe.radius()
        };

        let clipped = outer_shift(DEFAULT_SMALL_ANGLE_THRESHOLD_DEG);
        assert!(clipped <= 1000.0 + 1.0, "outer corner moved {clipped} m");
        let mitred = outer_shift(0.0);
        assert!(mitred > 10_000.0, "outer corner moved {mitred} m");
    }

    /// Joined ends drop their caps: two legs give 4 + 4 + 2 outer caps.
    #[test]
    fn test_joined_track_geometry() {
        let Frame { dc, .. } = test_support::frame();
        let mut track = TrackAirspace::new(cache());
        let v = LatLon::from_degrees(0.0, 0.2);
        track.add_leg(LatLon::from_degrees(0.0, 0.0), v, (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
        track.add_leg(v, LatLon::from_degrees(0.2, 0.2), (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
        let g = track.make_geometry(&dc, &DetailLevel::new(0.0)).unwrap();
        assert_eq!(g.fill.len(), 10);

        track.set_enable_legs_joining(false);
        let g = track.make_geometry(&dc, &DetailLevel::new(0.0)).unwrap();
        assert_eq!(g.fill.len(), 12);
    }

    /// A route builds one centered leg per polyline segment at the route's altitudes.
    #[test]
    fn test_route_legs_follow_route() {
        let Frame { dc, .. } = test_support::frame();
        let mut route = Route::new(cache());
        route.set_width(2000.0).unwrap();
        route
            .set_locations(vec![
                LatLon::from_degrees(0.0, 0.0),
                LatLon::from_degrees(0.0, 0.2),
                LatLon::from_degrees(0.2, 0.2),
            ])
            .unwrap();
        route.base_mut().set_altitudes(500.0, 1500.0).unwrap();
        assert_eq!(route.track().legs().len(), 2);
        assert_eq!(route.track().legs()[0].widths(), (1000.0, 1000.0));

        let extent = route.compute_extent(&dc).unwrap();
        assert!(extent.radius > 10_000.0);
        for leg in route.track().legs() {
            assert_eq!(leg.base().altitudes(), (500.0, 1500.0));
        }
        assert!(route.set_width(-1.0).is_err());
    }

    /// The track extent is cached per globe and dropped when a leg changes.
    #[test]
    fn test_track_extent_cached_per_globe() {
        let Frame { dc, .. } = test_support::frame();
        let mut track = TrackAirspace::new(cache());
        let v = LatLon::from_degrees(0.0, 0.2);
        track.add_leg(LatLon::from_degrees(0.0, 0.0), v, (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
        assert!(track.base().info(&dc).is_none());

        let first = track.compute_extent(&dc).unwrap();
        let info = track.base().info(&dc).unwrap();
        assert_eq!(info.extent, first);
        assert_eq!(info.minimal_geometry.len(), track.legs()[0].base().info(&dc).unwrap().minimal_geometry.len());
        assert_eq!(track.compute_extent(&dc).unwrap(), first);

        track.add_leg(v, LatLon::from_degrees(0.5, 0.2), (0.0, 1000.0), (1000.0, 1000.0)).unwrap();
        assert!(track.base().info(&dc).is_none());
        let grown = track.compute_extent(&dc).unwrap();
        assert!(grown.radius > first.radius);

        let Frame { dc: other, .. } = test_support::frame();
        assert!(track.base().info(&other).is_none());
        assert!(TrackAirspace::new(cache()).compute_extent(&dc).is_err());
    }
}
