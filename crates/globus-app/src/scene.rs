//! The shapes the driver renders, and the shared renderers and caches they
//! draw through.

use std::cell::RefCell;
use std::rc::Rc;

use globus_config::Config;
use globus_geometry::{ExpiryPolicy, GeometryCache};
use globus_math::{Angle, Color, LatLon, Position, Sector};
use globus_render::{DepthOffset, DrawContext, SurfaceObject};
use globus_shapes::{
    Airspace, AirspaceRenderer, BoxAirspace, ImageSource, MultiResolutionPath, Orbit, OrbitType,
    PartialCappedCylinder, Path, PathType, PlacemarkRenderer, PointPlacemark, Route, ShapeError,
    SurfaceImage, SurfacePolygon, SurfaceText, Track, TrackAirspace, TrackPoint, TrackRenderer,
    TrackSegment,
};
use tracing::{debug, warn};

/// Shapes queued during one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub airspaces: usize,
    pub paths: usize,
    pub placemarks: usize,
    pub surface_objects: usize,
    pub track_markers: usize,
}

pub struct Scene {
    geometry_cache: Rc<RefCell<GeometryCache>>,
    airspace_renderer: Rc<AirspaceRenderer>,
    placemark_renderer: Rc<PlacemarkRenderer>,
    airspaces: Vec<Box<dyn Airspace>>,
    paths: Vec<Path>,
    multi_resolution_paths: Vec<MultiResolutionPath>,
    placemarks: Vec<PointPlacemark>,
    surface_objects: Vec<Box<dyn SurfaceObject>>,
    track_renderer: TrackRenderer,
    tracks: Vec<Track>,
}

impl Scene {
    /// An empty scene whose renderers follow `config`.
    pub fn new(config: &Config) -> Self {
        let mut airspace_renderer = AirspaceRenderer::new();
        airspace_renderer.set_enable_batch_rendering(config.render.enable_batch_rendering);
        airspace_renderer.set_enable_batch_picking(config.render.enable_batch_picking);
        airspace_renderer.set_enable_depth_offset(config.render.enable_depth_offset);
        airspace_renderer.set_depth_offset(DepthOffset {
            factor: config.render.depth_offset_factor,
            units: config.render.depth_offset_units,
        });

        let mut placemark_renderer = PlacemarkRenderer::new();
        placemark_renderer.set_enable_batch_rendering(config.render.enable_batch_rendering);
        placemark_renderer.set_enable_batch_picking(config.render.enable_batch_picking);

        Self {
            geometry_cache: Rc::new(RefCell::new(GeometryCache::new(
                config.cache.geometry_cache_capacity,
            ))),
            airspace_renderer: Rc::new(airspace_renderer),
            placemark_renderer: Rc::new(placemark_renderer),
            airspaces: Vec::new(),
            paths: Vec::new(),
            multi_resolution_paths: Vec::new(),
            placemarks: Vec::new(),
            surface_objects: Vec::new(),
            track_renderer: TrackRenderer::new(),
            tracks: Vec::new(),
        }
    }

    /// One of every shape, placed within a couple of degrees of (0, 0).
    pub fn demo(config: &Config) -> Result<Self, ShapeError> {
        let mut scene = Self::new(config);
        let cache = Rc::clone(&scene.geometry_cache);
        let expiry = ExpiryPolicy::new(config.airspace.min_expiry_ms, config.airspace.max_expiry_ms);

        let mut box_airspace = BoxAirspace::new(Rc::clone(&cache));
        box_airspace.set_locations(LatLon::from_degrees(0.2, -1.0), LatLon::from_degrees(0.6, -0.4));
        box_airspace.set_widths(10_000.0, 10_000.0)?;
        box_airspace.base_mut().set_altitudes(0.0, 8_000.0)?;
        scene.add_airspace(box_airspace, expiry);

        let mut cylinder = PartialCappedCylinder::new(Rc::clone(&cache));
        cylinder.set_center(LatLon::from_degrees(-0.5, 0.5));
        cylinder.set_radii(5_000.0, 20_000.0)?;
        cylinder.set_azimuths(Angle::from_degrees(30.0), Angle::from_degrees(300.0));
        cylinder.base_mut().set_altitudes(1_000.0, 6_000.0)?;
        cylinder.base_mut().set_terrain_conforming(true, false);
        scene.add_airspace(cylinder, expiry);

        let mut orbit = Orbit::new(Rc::clone(&cache));
        orbit.set_locations(LatLon::from_degrees(0.8, 0.2), LatLon::from_degrees(0.8, 0.9));
        orbit.set_orbit_type(OrbitType::Center);
        orbit.set_width(15_000.0)?;
        orbit.base_mut().set_altitudes(2_000.0, 4_000.0)?;
        scene.add_airspace(orbit, expiry);

        let mut track = TrackAirspace::new(Rc::clone(&cache));
        track.set_enable_legs_joining(config.airspace.enable_legs_joining);
        track.set_small_angle_threshold(Angle::from_degrees(config.airspace.small_angle_threshold_deg))?;
        let corners = [(-1.0, -1.2), (-0.8, -0.6), (-1.1, 0.0)].map(|(lat, lon)| LatLon::from_degrees(lat, lon));
        for leg in corners.windows(2) {
            track.add_leg(leg[0], leg[1], (0.0, 3_000.0), (4_000.0, 4_000.0))?;
        }
        scene.add_airspace(track, expiry);

        let mut route = Route::new(Rc::clone(&cache));
        route.set_locations(vec![
            LatLon::from_degrees(1.2, -1.0),
            LatLon::from_degrees(1.3, 0.0),
            LatLon::from_degrees(1.1, 1.0),
        ])?;
        route.set_width(6_000.0)?;
        route.base_mut().set_altitudes(500.0, 2_500.0)?;
        scene.add_airspace(route, expiry);

        let mut path = Path::new(
            [(-0.3, -1.5), (0.0, -0.5), (0.3, 0.5), (0.1, 1.5)]
                .iter()
                .map(|&(lat, lon)| Position::from_degrees(lat, lon, 5_000.0))
                .collect(),
        );
        path.set_path_type(PathType::GreatCircle);
        path.set_extrude(true);
        path.set_show_positions(true);
        scene.add_path(config, path)?;

        let mut trail = Path::new(
            (0..50)
                .map(|i| {
                    let t = f64::from(i) / 49.0;
                    Position::from_degrees(-1.5 + t * 0.5, -1.5 + t * 3.0, 2_000.0)
                })
                .collect(),
        );
        configure_path(config, &mut trail)?;
        scene.multi_resolution_paths.push(MultiResolutionPath::new(trail));

        let mut placemark = PointPlacemark::new(Position::from_degrees(0.0, 0.0, 0.0));
        placemark.set_label(Some("Origin".to_string()));
        scene.placemarks.push(placemark);

        let checker: Rc<[u8]> = [255, 255, 255, 255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255, 255]
            .as_slice()
            .into();
        let image = ImageSource::new("demo/checker", 2, 2, checker)?;
        let mut surface_image = SurfaceImage::new(Sector::from_degrees(-0.4, -0.1, -0.4, -0.1), image);
        surface_image.set_opacity(0.8)?;
        scene.surface_objects.push(Box::new(surface_image));

        let mut polygon = SurfacePolygon::new(
            [(0.1, 0.1), (0.1, 0.5), (0.4, 0.5), (0.4, 0.3), (0.25, 0.3), (0.25, 0.1)]
                .map(|(lat, lon)| LatLon::from_degrees(lat, lon)),
        );
        polygon.set_path_type(PathType::Linear);
        scene.surface_objects.push(Box::new(polygon));

        let mut text = SurfaceText::new("Equator", LatLon::from_degrees(0.0, 0.8));
        text.set_text_height(20_000.0)?;
        text.set_color(Color::rgb(255, 255, 0));
        scene.surface_objects.push(Box::new(text));

        let mut points: Vec<TrackPoint> = (0..10u32)
            .map(|i| {
                let lat = -0.8 + f64::from(i) * 0.05;
                TrackPoint::new(Position::from_degrees(lat, 1.0, 1_000.0)).with_time(u64::from(i) * 1_000)
            })
            .collect();
        let tail = points.split_off(6);
        scene.tracks.push(Track::new(
            "demo",
            vec![TrackSegment::new(points), TrackSegment::new(tail)],
        ));

        debug!(
            airspaces = scene.airspaces.len(),
            surface_objects = scene.surface_objects.len(),
            "demo scene built"
        );
        Ok(scene)
    }

    fn add_airspace(&mut self, mut airspace: impl Airspace + 'static, expiry: ExpiryPolicy) {
        airspace.base_mut().set_expiry_policy(expiry);
        self.airspaces.push(Box::new(airspace));
    }

    fn add_path(&mut self, config: &Config, mut path: Path) -> Result<(), ShapeError> {
        configure_path(config, &mut path)?;
        self.paths.push(path);
        Ok(())
    }

    pub fn geometry_cache(&self) -> &Rc<RefCell<GeometryCache>> {
        &self.geometry_cache
    }

    pub fn surface_object_count(&self) -> usize {
        self.surface_objects.len()
    }

    pub fn airspace_count(&self) -> usize {
        self.airspaces.len()
    }

    /// Bring surface objects up to date before either pass.
    pub fn pre_render(&mut self, dc: &mut DrawContext) {
        for object in &mut self.surface_objects {
            if let Err(e) = object.pre_render(dc) {
                warn!(error = %e, "surface object failed to prepare");
            }
        }
    }

    /// Queue every shape for the render pass.
    pub fn render(&mut self, dc: &mut DrawContext) -> QueueCounts {
        self.queue(dc, false)
    }

    /// Queue every shape for the pick pass.
    pub fn pick(&mut self, dc: &mut DrawContext) -> QueueCounts {
        self.queue(dc, true)
    }

    fn queue(&mut self, dc: &mut DrawContext, picking: bool) -> QueueCounts {
        let mut counts = QueueCounts::default();

        for object in &mut self.surface_objects {
            let result = if picking { object.pick(dc) } else { object.render(dc) };
            match result {
                Ok(()) => counts.surface_objects += 1,
                Err(e) => warn!(error = %e, "surface object failed to queue"),
            }
        }
        for airspace in &mut self.airspaces {
            counts.airspaces += queued(airspace.kind(), airspace.render(dc, &self.airspace_renderer));
        }
        for path in &mut self.paths {
            counts.paths += queued("Path", path.render(dc));
        }
        for path in &mut self.multi_resolution_paths {
            counts.paths += queued("MultiResolutionPath", path.render(dc));
        }
        for placemark in &mut self.placemarks {
            counts.placemarks += queued("PointPlacemark", placemark.render(dc, &self.placemark_renderer));
        }
        match self.track_renderer.render(dc, &self.tracks) {
            Ok(n) => counts.track_markers = n,
            Err(e) => warn!(error = %e, "track markers failed to queue"),
        }
        counts
    }
}

fn configure_path(config: &Config, path: &mut Path) -> Result<(), ShapeError> {
    path.set_num_subsegments(config.path.num_subsegments)?;
    path.set_terrain_conformance(config.path.terrain_conformance_px)?;
    path.set_small_segment_pixels(config.path.small_segment_px)?;
    Ok(())
}

fn queued(kind: &str, result: Result<bool, ShapeError>) -> usize {
    match result {
        Ok(queued) => usize::from(queued),
        Err(e) => {
            warn!(error = %e, kind, "shape failed to queue");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globus_math::{Globe, Rect, SphericalGlobe};
    use globus_render::{BasicView, GlobeTerrain, HeadlessBackend};

    fn context() -> DrawContext {
        let globe: Rc<dyn Globe> = Rc::new(SphericalGlobe::earth());
        let gl = Rc::new(RefCell::new(HeadlessBackend::new(400, 300)));
        let mut dc = DrawContext::default();
        dc.set_globe(Rc::clone(&globe));
        dc.set_terrain(Rc::new(GlobeTerrain::new(Rc::clone(&globe))));
        dc.set_view(Rc::new(BasicView::nadir(
            globe.as_ref(),
            Position::from_degrees(0.0, 0.0, 1_000_000.0),
            Rect::new(0, 0, 400, 300),
            Angle::from_degrees(45.0),
        )));
        dc.initialize(gl);
        dc.set_frame_timestamp(1_000);
        dc
    }

    /// The demo scene holds one of every shape kind.
    #[test]
    fn test_demo_scene_contents() {
        let scene = Scene::demo(&Config::default()).unwrap();
        assert_eq!(scene.airspace_count(), 5);
        assert_eq!(scene.surface_object_count(), 3);
        assert_eq!(scene.tracks[0].num_points(), 10);
    }

    /// Every surface object lands in the surface FIFO, the rest in the
    /// ordered queue.
    #[test]
    fn test_render_queues_shapes() {
        let mut scene = Scene::demo(&Config::default()).unwrap();
        let mut dc = context();
        scene.pre_render(&mut dc);
        let counts = scene.render(&mut dc);

        assert_eq!(counts.surface_objects, 3);
        assert_eq!(dc.ordered_surface_renderable_count(), 3);
        assert!(counts.airspaces >= 1);
        assert_eq!(counts.placemarks, 1);
        assert_eq!(counts.track_markers, 10);
        assert!(dc.ordered_renderable_count() >= counts.airspaces + counts.placemarks);
    }

    /// An empty scene queues nothing.
    #[test]
    fn test_empty_scene_queues_nothing() {
        let mut scene = Scene::new(&Config::default());
        let mut dc = context();
        assert_eq!(scene.render(&mut dc), QueueCounts::default());
        assert_eq!(dc.ordered_renderable_count(), 0);
    }

    /// Airspace geometry lands in the shared geometry cache.
    #[test]
    fn test_airspaces_fill_geometry_cache() {
        let mut scene = Scene::demo(&Config::default()).unwrap();
        let mut dc = context();
        scene.render(&mut dc);
        assert!(!scene.geometry_cache().borrow().is_empty());
    }
}
