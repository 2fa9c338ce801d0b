//! One frame of the headless renderer: per-frame reset, an optional pick pass,
//! then the render pass, each draining the surface FIFO before the ordered
//! queue.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec2;
use globus_config::Config;
use globus_math::{Angle, Color, Globe, Position, Rect, SphericalGlobe};
use globus_render::stats::keys;
use globus_render::{
    BasicGpuResourceCache, BasicView, DrawContext, GlobeTerrain, HeadlessBackend, PickedObject,
    RenderBackend, TextRendererCache,
};
use tracing::{debug, info, info_span};

use crate::scene::{QueueCounts, Scene};
use crate::AppError;

/// What one frame queued, drew, and picked.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub timestamp_ms: u64,
    pub queued: QueueCounts,
    pub ordered_renderables: usize,
    pub ordered_surface_renderables: usize,
    pub draw_calls: usize,
    /// Top object under the pick point; `None` without a pick pass.
    pub picked: Option<PickedObject>,
}

pub struct FrameDriver {
    dc: DrawContext,
    backend: Rc<RefCell<HeadlessBackend>>,
    pick_point: Option<DVec2>,
    show_statistics: bool,
}

impl FrameDriver {
    /// Globe, camera, caches, and draw state from `config`.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let render = &config.render;
        let globe_config = &config.globe;
        let globe: Rc<dyn Globe> = Rc::new(SphericalGlobe::new(globe_config.radius_m));
        let viewport = Rect::new(0, 0, render.viewport_width as i32, render.viewport_height as i32);
        let view = BasicView::nadir(
            globe.as_ref(),
            Position::from_degrees(
                globe_config.eye_latitude_deg,
                globe_config.eye_longitude_deg,
                globe_config.eye_altitude_m,
            ),
            viewport,
            Angle::from_degrees(globe_config.field_of_view_deg),
        );

        let mut dc = DrawContext::new(
            Rc::new(RefCell::new(BasicGpuResourceCache::new(
                config.cache.gpu_resource_cache_capacity,
            ))),
            Rc::new(RefCell::new(TextRendererCache::new())),
        );
        dc.set_terrain(Rc::new(GlobeTerrain::new(Rc::clone(&globe))));
        dc.set_globe(globe);
        dc.set_view(Rc::new(view));
        dc.set_vertical_exaggeration(render.vertical_exaggeration);
        let [r, g, b] = render.clear_color;
        dc.set_clear_color(Color::rgb(r, g, b));
        dc.set_pick_point_frustum_dimension(render.pick_point_frustum_dimension)?;
        if config.debug.show_statistics {
            dc.set_per_frame_statistic_keys([keys::ALL]);
        }

        Ok(Self {
            dc,
            backend: Rc::new(RefCell::new(HeadlessBackend::new(
                render.viewport_width,
                render.viewport_height,
            ))),
            pick_point: None,
            show_statistics: config.debug.show_statistics,
        })
    }

    /// Run a pick pass at this top-left-origin window point every frame.
    pub fn set_pick_point(&mut self, point: Option<DVec2>) {
        self.pick_point = point;
    }

    pub fn backend(&self) -> &Rc<RefCell<HeadlessBackend>> {
        &self.backend
    }

    pub fn draw_context(&self) -> &DrawContext {
        &self.dc
    }

    pub fn render_frame(&mut self, scene: &mut Scene, timestamp_ms: u64) -> Result<FrameReport, AppError> {
        self.backend.borrow_mut().take_commands();
        let backend: Rc<RefCell<dyn RenderBackend>> = self.backend.clone();
        self.dc.initialize(backend);
        self.dc.set_frame_timestamp(timestamp_ms);
        let frame = self.dc.frame_number();
        let _span = info_span!("frame", frame).entered();

        scene.pre_render(&mut self.dc);

        let picked = match self.pick_point {
            Some(point) => self.pick(scene, point)?,
            None => None,
        };

        self.dc.gl()?.clear(self.dc.clear_color());
        let queued = scene.render(&mut self.dc);
        let ordered_surface_renderables = self.dc.ordered_surface_renderable_count();
        let ordered_renderables = self.dc.ordered_renderable_count();
        self.dc.draw_ordered_surface_renderables();
        self.dc.draw_ordered_renderables();

        let report = FrameReport {
            frame,
            timestamp_ms,
            queued,
            ordered_renderables,
            ordered_surface_renderables,
            draw_calls: self.backend.borrow().draw_count(),
            picked,
        };
        debug!(queued = ?report.queued, draw_calls = report.draw_calls, "frame rendered");
        if self.show_statistics {
            for stat in self.dc.per_frame_statistics() {
                info!(key = %stat.key, value = stat.value, "{}", stat.display_name);
            }
        }
        Ok(report)
    }

    fn pick(&mut self, scene: &mut Scene, point: DVec2) -> Result<Option<PickedObject>, AppError> {
        self.dc.set_picking_mode(true);
        self.dc.set_pick_point(Some(point));
        let result = self.pick_pass(scene);
        self.dc.set_picking_mode(false);
        self.dc.set_pick_point(None);
        result?;

        let picked = self.dc.picked_objects().top_picked_object().cloned();
        let count = self.dc.picked_objects().len();
        self.dc
            .set_per_frame_statistic(keys::PICKED_OBJECTS, "Picked objects", count as f64);
        if let Some(object) = &picked {
            info!(kind = object.kind, id = object.object.0, ?point, "picked");
        }
        Ok(picked)
    }

    fn pick_pass(&mut self, scene: &mut Scene) -> Result<(), AppError> {
        self.dc.add_pick_point_frustum()?;
        self.dc.gl()?.clear(self.dc.clear_color());
        scene.pick(&mut self.dc);
        self.dc.draw_ordered_surface_renderables();
        self.dc.draw_ordered_renderables();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globus_render::Command;

    fn config() -> Config {
        let mut config = Config::default();
        config.render.viewport_width = 400;
        config.render.viewport_height = 300;
        config
    }

    /// A frame drains both queues and issues draw calls.
    #[test]
    fn test_render_frame_draws_scene() {
        let config = config();
        let mut scene = Scene::demo(&config).unwrap();
        let mut driver = FrameDriver::new(&config).unwrap();
        let report = driver.render_frame(&mut scene, 16).unwrap();

        assert_eq!(report.frame, 1);
        assert_eq!(report.ordered_surface_renderables, 3);
        assert!(report.ordered_renderables > 0);
        assert!(report.draw_calls > 0);
        assert!(report.picked.is_none());
        assert_eq!(driver.draw_context().ordered_renderable_count(), 0);
        assert_eq!(driver.draw_context().ordered_surface_renderable_count(), 0);
    }

    /// The frame clears with the configured color before drawing.
    #[test]
    fn test_frame_clears_first() {
        let mut config = config();
        config.render.clear_color = [10, 20, 30];
        let mut scene = Scene::new(&config);
        let mut driver = FrameDriver::new(&config).unwrap();
        driver.render_frame(&mut scene, 0).unwrap();
        let commands = driver.backend().borrow_mut().take_commands();
        assert_eq!(commands.first(), Some(&Command::Clear(Color::rgb(10, 20, 30))));
    }

    /// Each frame starts with a fresh command stream and frame number.
    #[test]
    fn test_frames_are_independent() {
        let config = config();
        let mut scene = Scene::demo(&config).unwrap();
        let mut driver = FrameDriver::new(&config).unwrap();
        let first = driver.render_frame(&mut scene, 16).unwrap();
        let second = driver.render_frame(&mut scene, 33).unwrap();
        assert_eq!(second.frame, 2);
        assert_eq!(second.timestamp_ms, 33);
        assert_eq!(first.ordered_renderables, second.ordered_renderables);
        assert_eq!(first.ordered_surface_renderables, second.ordered_surface_renderables);
    }

    /// A pick pass reads back pixels before the render pass clears again.
    #[test]
    fn test_pick_pass_reads_pixels() {
        let config = config();
        let mut scene = Scene::demo(&config).unwrap();
        let mut driver = FrameDriver::new(&config).unwrap();
        driver.set_pick_point(Some(DVec2::new(200.0, 150.0)));
        driver.render_frame(&mut scene, 16).unwrap();

        let commands = driver.backend().borrow_mut().take_commands();
        let read = commands
            .iter()
            .position(|c| matches!(c, Command::ReadPixels(_)))
            .unwrap();
        let clears: Vec<usize> = commands
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Command::Clear(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(clears.len(), 2);
        assert!(clears[0] < read && read < clears[1]);
        assert!(!driver.draw_context().is_picking_mode());
    }

    /// Statistics are collected only when enabled.
    #[test]
    fn test_statistics_follow_config() {
        let mut config = config();
        let mut scene = Scene::demo(&config).unwrap();
        let mut quiet = FrameDriver::new(&config).unwrap();
        quiet.render_frame(&mut scene, 16).unwrap();
        assert_eq!(quiet.draw_context().per_frame_statistics().count(), 0);

        config.debug.show_statistics = true;
        let mut verbose = FrameDriver::new(&config).unwrap();
        verbose.render_frame(&mut scene, 16).unwrap();
        assert_eq!(
            verbose.draw_context().per_frame_statistic(keys::ORDERED_SURFACE_RENDERABLES),
            Some(3.0)
        );
    }

    /// An invalid pick region size is rejected at construction.
    #[test]
    fn test_invalid_pick_dimension() {
        let mut config = config();
        config.render.pick_point_frustum_dimension = 0;
        assert!(matches!(FrameDriver::new(&config), Err(AppError::Render(_))));
    }
}
