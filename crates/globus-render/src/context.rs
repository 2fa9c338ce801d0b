//! The per-frame draw context.
//!
//! One [`DrawContext`] lives for the life of the application and is reset by
//! [`DrawContext::initialize`] at the start of every frame. It owns the two
//! ordered queues and the frame's pick state, and holds shared handles to the
//! globe, view, terrain, graphics backend, and the long-lived GPU and text
//! caches. Nothing here is thread-safe; all access happens on the thread that
//! owns the graphics context.

use std::cell::{RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::{DMat4, DVec2, DVec3};
use globus_math::{
    Angle, Color, Frustum, Globe, GlobeStateKey, LatLon, Rect, Sector, Sphere,
};
use rustc_hash::{FxHashSet, FxHasher};

use crate::ordered::OrderedQueue;
use crate::pick::{LayerId, PickedObject, PickedObjectList};
use crate::stats::keys;
use crate::{
    BasicGpuResourceCache, GpuResourceCache, OrderedRenderable, PerFrameStatistic, QueueOutcome,
    RenderBackend, RenderError, ScreenCredit, Terrain, TextRendererCache, View,
};

/// Largest 24-bit color code; reserved along with zero.
const MAX_PICK_NUMBER: u32 = 0xFF_FFFF;

/// Default side in pixels of the square pick-point frustum.
pub const DEFAULT_PICK_POINT_FRUSTUM_DIMENSION: i32 = 5;

struct VisibleSectorsMemo {
    frame_number: u64,
    request: u64,
    sectors: Vec<Sector>,
}

/// Per-frame rendering state shared by every renderer.
pub struct DrawContext {
    backend: Option<Rc<RefCell<dyn RenderBackend>>>,
    globe: Option<Rc<dyn Globe>>,
    view: Option<Rc<dyn View>>,
    terrain: Option<Rc<dyn Terrain>>,
    vertical_exaggeration: f64,
    gpu_resource_cache: Rc<RefCell<dyn GpuResourceCache>>,
    text_renderer_cache: Rc<RefCell<TextRendererCache>>,
    clear_color: Color,

    frame_timestamp: u64,
    frame_number: u64,

    ordered_renderables: OrderedQueue,
    ordered_surface_renderables: VecDeque<Box<dyn OrderedRenderable>>,
    ordered_rendering_mode: bool,

    picking_mode: bool,
    deep_picking: bool,
    pick_point: Option<DVec2>,
    pick_rectangle: Option<Rect>,
    pick_point_frustum_dimension: i32,
    pick_frustums: Vec<Frustum>,
    picked_objects: PickedObjectList,
    objects_in_pick_rectangle: PickedObjectList,
    unique_pick_number: u32,
    current_layer: Option<LayerId>,

    modelview_stack: Vec<DMat4>,

    statistics_keys: FxHashSet<String>,
    statistics: BTreeMap<String, PerFrameStatistic>,
    screen_credits: Vec<(ScreenCredit, u64)>,
    visible_sectors: Option<VisibleSectorsMemo>,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self::new(
            Rc::new(RefCell::new(BasicGpuResourceCache::default())),
            Rc::new(RefCell::new(TextRendererCache::new())),
        )
    }
}

impl DrawContext {
    /// Create a context over externally owned, long-lived caches.
    pub fn new(
        gpu_resource_cache: Rc<RefCell<dyn GpuResourceCache>>,
        text_renderer_cache: Rc<RefCell<TextRendererCache>>,
    ) -> Self {
        Self {
            backend: None,
            globe: None,
            view: None,
            terrain: None,
            vertical_exaggeration: 1.0,
            gpu_resource_cache,
            text_renderer_cache,
            clear_color: Color::BLACK,
            frame_timestamp: 0,
            frame_number: 0,
            ordered_renderables: OrderedQueue::new(),
            ordered_surface_renderables: VecDeque::new(),
            ordered_rendering_mode: false,
            picking_mode: false,
            deep_picking: false,
            pick_point: None,
            pick_rectangle: None,
            pick_point_frustum_dimension: DEFAULT_PICK_POINT_FRUSTUM_DIMENSION,
            pick_frustums: Vec::new(),
            picked_objects: PickedObjectList::default(),
            objects_in_pick_rectangle: PickedObjectList::default(),
            unique_pick_number: 0,
            current_layer: None,
            modelview_stack: Vec::new(),
            statistics_keys: FxHashSet::default(),
            statistics: BTreeMap::new(),
            screen_credits: Vec::new(),
            visible_sectors: None,
        }
    }

    /// Reset per-frame state and attach the graphics backend for the frame.
    ///
    /// Globe, view, terrain, caches, credits, and statistic keys survive; the
    /// queues, pick state, statistics values, and visible-sector memo do not.
    pub fn initialize(&mut self, backend: Rc<RefCell<dyn RenderBackend>>) {
        self.backend = Some(backend);
        self.frame_number += 1;
        self.ordered_renderables.clear();
        self.ordered_surface_renderables.clear();
        self.ordered_rendering_mode = false;
        self.picking_mode = false;
        self.deep_picking = false;
        self.pick_frustums.clear();
        self.picked_objects.clear();
        self.objects_in_pick_rectangle.clear();
        self.unique_pick_number = 0;
        self.current_layer = None;
        self.modelview_stack.clear();
        self.statistics.clear();
        self.visible_sectors = None;
    }

    // --- Frame identity and collaborators ---

    pub fn set_frame_timestamp(&mut self, timestamp_ms: u64) {
        self.frame_timestamp = timestamp_ms;
    }

    /// Frame time in milliseconds, set by the frame driver.
    pub fn frame_timestamp(&self) -> u64 {
        self.frame_timestamp
    }

    /// Number of frames initialized so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The graphics backend for this frame.
    pub fn gl(&self) -> Result<RefMut<'_, dyn RenderBackend + 'static>, RenderError> {
        self.backend
            .as_ref()
            .map(|b| b.borrow_mut())
            .ok_or(RenderError::MissingGraphicsContext)
    }

    pub fn has_graphics_context(&self) -> bool {
        self.backend.is_some()
    }

    pub fn set_globe(&mut self, globe: Rc<dyn Globe>) {
        self.globe = Some(globe);
    }

    pub fn globe(&self) -> Result<Rc<dyn Globe>, RenderError> {
        self.globe.clone().ok_or(RenderError::MissingGlobe)
    }

    pub fn globe_state_key(&self) -> Result<GlobeStateKey, RenderError> {
        Ok(self.globe()?.state_key())
    }

    pub fn set_view(&mut self, view: Rc<dyn View>) {
        self.view = Some(view);
    }

    pub fn view(&self) -> Result<Rc<dyn View>, RenderError> {
        self.view.clone().ok_or(RenderError::MissingView)
    }

    pub fn set_terrain(&mut self, terrain: Rc<dyn Terrain>) {
        self.terrain = Some(terrain);
    }

    pub fn terrain(&self) -> Result<Rc<dyn Terrain>, RenderError> {
        self.terrain.clone().ok_or(RenderError::MissingTerrain)
    }

    pub fn set_vertical_exaggeration(&mut self, vertical_exaggeration: f64) {
        self.vertical_exaggeration = vertical_exaggeration;
    }

    pub fn vertical_exaggeration(&self) -> f64 {
        self.vertical_exaggeration
    }

    pub fn gpu_resource_cache(&self) -> Rc<RefCell<dyn GpuResourceCache>> {
        Rc::clone(&self.gpu_resource_cache)
    }

    pub fn text_renderer_cache(&self) -> Rc<RefCell<TextRendererCache>> {
        Rc::clone(&self.text_renderer_cache)
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn set_current_layer(&mut self, layer: Option<LayerId>) {
        self.current_layer = layer;
    }

    pub fn current_layer(&self) -> Option<LayerId> {
        self.current_layer
    }

    // --- Ordered renderables ---

    /// Queue with the renderable's own eye distance.
    pub fn add_ordered_renderable(&mut self, renderable: Box<dyn OrderedRenderable>) {
        self.ordered_renderables.push(renderable);
    }

    /// Queue as if infinitely far, so the renderable is drawn before (beneath)
    /// every finite-distance item. Behind items keep their insertion order.
    pub fn add_ordered_renderable_behind(&mut self, renderable: Box<dyn OrderedRenderable>) {
        self.ordered_renderables.push_behind(renderable);
    }

    /// Queue a renderable a producer may not have. `None` is a no-op.
    pub fn try_add_ordered_renderable(
        &mut self,
        renderable: Option<Box<dyn OrderedRenderable>>,
        is_behind: bool,
    ) -> QueueOutcome {
        match renderable {
            Some(r) if is_behind => {
                self.add_ordered_renderable_behind(r);
                QueueOutcome::Queued
            }
            Some(r) => {
                self.add_ordered_renderable(r);
                QueueOutcome::Queued
            }
            None => {
                tracing::debug!("ordered renderable is none, nothing queued");
                QueueOutcome::Ignored
            }
        }
    }

    pub fn peek_ordered_renderable(&self) -> Option<&dyn OrderedRenderable> {
        self.ordered_renderables.peek()
    }

    pub fn poll_ordered_renderable(&mut self) -> Option<Box<dyn OrderedRenderable>> {
        self.ordered_renderables.poll()
    }

    /// Poll the next item only if `accept` approves it. Batching renderers use
    /// this to consume a run of their own items without disturbing the queue.
    pub fn poll_ordered_renderable_if(
        &mut self,
        accept: impl FnOnce(&dyn OrderedRenderable) -> bool,
    ) -> Option<Box<dyn OrderedRenderable>> {
        if accept(self.ordered_renderables.peek()?) {
            self.ordered_renderables.poll()
        } else {
            None
        }
    }

    pub fn ordered_renderable_count(&self) -> usize {
        self.ordered_renderables.len()
    }

    // --- Ordered surface renderables ---

    pub fn add_ordered_surface_renderable(&mut self, renderable: Box<dyn OrderedRenderable>) {
        self.ordered_surface_renderables.push_back(renderable);
    }

    pub fn peek_ordered_surface_renderable(&self) -> Option<&dyn OrderedRenderable> {
        self.ordered_surface_renderables.front().map(|r| r.as_ref())
    }

    pub fn poll_ordered_surface_renderable(&mut self) -> Option<Box<dyn OrderedRenderable>> {
        self.ordered_surface_renderables.pop_front()
    }

    pub fn poll_ordered_surface_renderable_if(
        &mut self,
        accept: impl FnOnce(&dyn OrderedRenderable) -> bool,
    ) -> Option<Box<dyn OrderedRenderable>> {
        if accept(self.ordered_surface_renderables.front()?.as_ref()) {
            self.ordered_surface_renderables.pop_front()
        } else {
            None
        }
    }

    pub fn ordered_surface_renderable_count(&self) -> usize {
        self.ordered_surface_renderables.len()
    }

    pub fn is_ordered_rendering_mode(&self) -> bool {
        self.ordered_rendering_mode
    }

    pub fn set_ordered_rendering_mode(&mut self, enabled: bool) {
        self.ordered_rendering_mode = enabled;
    }

    /// Drain the surface FIFO, rendering or picking each item per the current
    /// mode. A failing item is logged and skipped.
    pub fn draw_ordered_surface_renderables(&mut self) {
        let count = self.ordered_surface_renderables.len();
        self.increment_per_frame_statistic(
            keys::ORDERED_SURFACE_RENDERABLES,
            "Ordered surface renderables",
            count as f64,
        );
        while let Some(item) = self.poll_ordered_surface_renderable() {
            self.draw_item(item.as_ref());
        }
    }

    /// Drain the ordered queue farthest-first, rendering or picking each item
    /// per the current mode. A failing item is logged and skipped.
    pub fn draw_ordered_renderables(&mut self) {
        let count = self.ordered_renderables.len();
        self.increment_per_frame_statistic(
            keys::ORDERED_RENDERABLES,
            "Ordered renderables",
            count as f64,
        );
        self.ordered_rendering_mode = true;
        while let Some(item) = self.poll_ordered_renderable() {
            self.draw_item(item.as_ref());
        }
        self.ordered_rendering_mode = false;
    }

    fn draw_item(&mut self, item: &dyn OrderedRenderable) {
        let result = if self.picking_mode {
            let point = self.pick_point;
            item.pick(self, point)
        } else {
            item.render(self)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "ordered renderable failed");
        }
    }

    // --- Picking ---

    pub fn set_picking_mode(&mut self, picking: bool) {
        self.picking_mode = picking;
    }

    pub fn is_picking_mode(&self) -> bool {
        self.picking_mode
    }

    pub fn set_deep_picking(&mut self, deep: bool) {
        self.deep_picking = deep;
    }

    pub fn is_deep_picking(&self) -> bool {
        self.deep_picking
    }

    /// Current pick point in window coordinates with a top-left origin.
    pub fn set_pick_point(&mut self, point: Option<DVec2>) {
        self.pick_point = point;
    }

    pub fn pick_point(&self) -> Option<DVec2> {
        self.pick_point
    }

    /// Current pick rectangle in window coordinates with a top-left origin.
    pub fn set_pick_rectangle(&mut self, rect: Option<Rect>) {
        self.pick_rectangle = rect;
    }

    pub fn pick_rectangle(&self) -> Option<Rect> {
        self.pick_rectangle
    }

    pub fn set_pick_point_frustum_dimension(&mut self, pixels: i32) -> Result<(), RenderError> {
        if pixels <= 0 {
            return Err(RenderError::InvalidArgument(format!(
                "pick point frustum dimension must be positive, got {pixels}"
            )));
        }
        self.pick_point_frustum_dimension = pixels;
        Ok(())
    }

    pub fn pick_point_frustum_dimension(&self) -> i32 {
        self.pick_point_frustum_dimension
    }

    /// Next unique 24-bit pick color. Skips zero, the top code, and the clear
    /// color, wrapping to one when exhausted.
    pub fn unique_pick_color(&mut self) -> Color {
        let clear = self.clear_color.rgb_code();
        loop {
            self.unique_pick_number += 1;
            if self.unique_pick_number >= MAX_PICK_NUMBER {
                self.unique_pick_number = 1;
            }
            if self.unique_pick_number != clear {
                break;
            }
        }
        Color::from_rgb_code(self.unique_pick_number)
    }

    /// Reserve `count` consecutive pick colors, returning the first and last.
    /// The range never contains zero, the top code, or the clear color.
    pub fn unique_pick_color_range(&mut self, count: u32) -> Result<(Color, Color), RenderError> {
        if count == 0 || count >= MAX_PICK_NUMBER - 1 {
            return Err(RenderError::InvalidArgument(format!(
                "pick color range count must be in 1..{}, got {count}",
                MAX_PICK_NUMBER - 1
            )));
        }
        let clear = self.clear_color.rgb_code();
        let fits = |min: u32| {
            let max = min + count - 1;
            min >= 1 && max < MAX_PICK_NUMBER && !(min..=max).contains(&clear)
        };

        let next = self.unique_pick_number + 1;
        let min = [next, clear.saturating_add(1), 1]
            .into_iter()
            .filter(|&m| m >= next || m == 1)
            .find(|&m| fits(m))
            .or_else(|| Some(clear.saturating_add(1)).filter(|&m| fits(m)))
            .ok_or_else(|| {
                RenderError::InvalidArgument(format!("no free pick color range of {count}"))
            })?;
        let max = min + count - 1;
        self.unique_pick_number = max;
        Ok((Color::from_rgb_code(min), Color::from_rgb_code(max)))
    }

    /// Color code under a point measured from the viewport's top-left corner,
    /// or `None` when the point is outside the viewport or shows the clear
    /// color.
    pub fn pick_color_at_point(&mut self, point: DVec2) -> Result<Option<u32>, RenderError> {
        let clear = self.clear_color.rgb_code();
        let mut gl = self.gl()?;
        let viewport = gl.viewport();
        let x = viewport.x + point.x.floor() as i32;
        let y = viewport.y + viewport.height - point.y.floor() as i32 - 1;
        if !viewport.contains(f64::from(x), f64::from(y)) {
            return Ok(None);
        }
        let code = gl
            .read_pixels(Rect::new(x, y, 1, 1))
            .first()
            .copied()
            .unwrap_or(0);
        Ok((code != clear).then_some(code))
    }

    /// Distinct non-background color codes inside a rectangle measured from
    /// the viewport's top-left corner, in first-seen order. Empty when the rectangle has no area or lies
    /// outside the viewport. `min_max` restricts the codes returned.
    pub fn pick_colors_in_rectangle(
        &mut self,
        rect: Rect,
        min_max: Option<(u32, u32)>,
    ) -> Result<Vec<u32>, RenderError> {
        let clear = self.clear_color.rgb_code();
        let mut gl = self.gl()?;
        let viewport = gl.viewport();
        let flipped = Rect::new(
            viewport.x + rect.x,
            viewport.y + viewport.height - rect.y - rect.height,
            rect.width,
            rect.height,
        );
        let clipped = flipped.intersection(&viewport);
        if rect.is_empty() || clipped.is_empty() {
            tracing::debug!(?rect, "pick rectangle is empty or outside the viewport");
            return Ok(Vec::new());
        }

        let mut seen = FxHashSet::default();
        let mut codes = Vec::new();
        for code in gl.read_pixels(clipped) {
            if code == 0 || code == clear {
                continue;
            }
            if let Some((min, max)) = min_max
                && !(min..=max).contains(&code)
            {
                continue;
            }
            if seen.insert(code) {
                codes.push(code);
            }
        }
        Ok(codes)
    }

    /// Append a model-space frustum around the pick point. No-op without a
    /// pick point.
    pub fn add_pick_point_frustum(&mut self) -> Result<(), RenderError> {
        let Some(point) = self.pick_point else {
            return Ok(());
        };
        let view = self.view()?;
        let viewport = view.viewport();
        let y = f64::from(viewport.height) - point.y - 1.0;
        let rect = Rect::centered(point.x, y, self.pick_point_frustum_dimension);
        self.push_pick_frustum(view.as_ref(), &rect);
        Ok(())
    }

    /// Append a model-space frustum around the pick rectangle. No-op without a
    /// pick rectangle or when it has no area.
    pub fn add_pick_rectangle_frustum(&mut self) -> Result<(), RenderError> {
        let Some(rect) = self.pick_rectangle.filter(|r| !r.is_empty()) else {
            return Ok(());
        };
        let view = self.view()?;
        let viewport = view.viewport();
        let flipped = Rect::new(
            rect.x,
            viewport.height - rect.y - rect.height,
            rect.width,
            rect.height,
        );
        self.push_pick_frustum(view.as_ref(), &flipped);
        Ok(())
    }

    fn push_pick_frustum(&mut self, view: &dyn View, rect: &Rect) {
        let eye_frustum = Frustum::from_screen_rect(
            rect,
            &view.viewport(),
            view.field_of_view().radians(),
            view.near_clip_distance(),
            view.far_clip_distance(),
        );
        self.pick_frustums
            .push(eye_frustum.transform_by(&view.modelview().transpose()));
    }

    pub fn pick_frustums(&self) -> &[Frustum] {
        &self.pick_frustums
    }

    pub fn add_picked_object(&mut self, object: PickedObject) {
        self.picked_objects.add(object);
    }

    pub fn picked_objects(&self) -> &PickedObjectList {
        &self.picked_objects
    }

    pub fn add_object_in_pick_rectangle(&mut self, object: PickedObject) {
        self.objects_in_pick_rectangle.add(object);
    }

    pub fn objects_in_pick_rectangle(&self) -> &PickedObjectList {
        &self.objects_in_pick_rectangle
    }

    // --- Visibility ---

    /// Whether `extent` intersects the pick frusta while picking, or the view
    /// frustum otherwise. Without a view everything is visible.
    pub fn is_visible(&self, extent: &Sphere) -> bool {
        if self.picking_mode && !self.pick_frustums.is_empty() {
            return self
                .pick_frustums
                .iter()
                .any(|f| extent.intersects_frustum(f));
        }
        match &self.view {
            Some(view) => extent.intersects_frustum(&view.frustum_in_model_coordinates()),
            None => true,
        }
    }

    /// Whether `extent` covers at most `pixels` pixels on screen.
    pub fn is_small(&self, extent: &Sphere, pixels: f64) -> bool {
        let Some(view) = &self.view else {
            return false;
        };
        let distance = (view.eye_point() - extent.center).length() - extent.radius;
        extent.diameter() <= pixels * view.compute_pixel_size_at_distance(distance)
    }

    /// Refine `sector` through successively finer `resolutions`, keeping only
    /// cells that intersect the view frustum. Refinement stops once
    /// `time_limit` has elapsed, returning the last complete level. Results are
    /// memoized for the frame.
    pub fn visible_sectors(
        &mut self,
        resolutions: &[Angle],
        time_limit: Duration,
        sector: Sector,
    ) -> Result<Vec<Sector>, RenderError> {
        if resolutions.is_empty() {
            return Err(RenderError::InvalidArgument(
                "visible sector resolutions are empty".into(),
            ));
        }
        let request = visible_sectors_request(resolutions, time_limit, &sector);
        if let Some(memo) = &self.visible_sectors
            && memo.frame_number == self.frame_number
            && memo.request == request
        {
            return Ok(memo.sectors.clone());
        }

        let globe = self.globe()?;
        let frustum = self.view()?.frustum_in_model_coordinates();
        let max_elevation = globe.max_elevation() * self.vertical_exaggeration;
        let visible = |s: &Sector| sector_visible(globe.as_ref(), &frustum, s, max_elevation);

        let start = Instant::now();
        let mut sectors: Vec<Sector> = std::iter::once(sector).filter(visible).collect();
        for resolution in resolutions {
            if start.elapsed() >= time_limit {
                tracing::trace!(
                    resolution = resolution.degrees(),
                    "visible sector refinement hit its time limit"
                );
                break;
            }
            sectors = sectors
                .iter()
                .flat_map(|s| s.subdivide_by_size(*resolution))
                .filter(visible)
                .collect();
        }

        self.visible_sectors = Some(VisibleSectorsMemo {
            frame_number: self.frame_number,
            request,
            sectors: sectors.clone(),
        });
        Ok(sectors)
    }

    // --- Reference centers ---

    /// Load the view's modelview translated to `reference_center`, so vertices
    /// stored relative to it land in the right place.
    pub fn push_reference_center(&mut self, reference_center: DVec3) -> Result<(), RenderError> {
        let matrix = self.view()?.modelview() * DMat4::from_translation(reference_center);
        self.gl()?.load_modelview(matrix);
        self.modelview_stack.push(matrix);
        Ok(())
    }

    /// Restore the modelview in effect before the matching push.
    pub fn pop_reference_center(&mut self) -> Result<(), RenderError> {
        if self.modelview_stack.pop().is_none() {
            tracing::debug!("pop_reference_center without a matching push");
        }
        let matrix = match self.modelview_stack.last() {
            Some(m) => *m,
            None => self.view()?.modelview(),
        };
        self.gl()?.load_modelview(matrix);
        Ok(())
    }

    pub fn reference_center_depth(&self) -> usize {
        self.modelview_stack.len()
    }

    /// Switch to pixel coordinates with a bottom-left origin for drawing
    /// screen-space overlays.
    pub fn begin_screen_space(&mut self) -> Result<(), RenderError> {
        let mut gl = self.gl()?;
        let v = gl.viewport();
        gl.load_projection(DMat4::orthographic_rh_gl(
            f64::from(v.x),
            f64::from(v.max_x()),
            f64::from(v.y),
            f64::from(v.max_y()),
            -1.0,
            1.0,
        ));
        gl.load_modelview(DMat4::IDENTITY);
        Ok(())
    }

    /// Restore the view's projection and modelview after screen-space drawing.
    pub fn end_screen_space(&mut self) -> Result<(), RenderError> {
        let view = self.view()?;
        let mut gl = self.gl()?;
        gl.load_projection(view.projection());
        gl.load_modelview(view.modelview());
        Ok(())
    }

    // --- Statistics and credits ---

    /// Report only these statistic keys. [`keys::ALL`] reports everything.
    pub fn set_per_frame_statistic_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statistics_keys = keys.into_iter().map(Into::into).collect();
    }

    fn statistic_enabled(&self, key: &str) -> bool {
        self.statistics_keys.contains(key) || self.statistics_keys.contains(keys::ALL)
    }

    pub fn set_per_frame_statistic(&mut self, key: &str, display_name: &str, value: f64) {
        if !self.statistic_enabled(key) {
            return;
        }
        self.statistics.insert(
            key.to_owned(),
            PerFrameStatistic {
                key: key.to_owned(),
                display_name: display_name.to_owned(),
                value,
            },
        );
    }

    /// Add `delta` to a statistic, starting from zero this frame.
    pub fn increment_per_frame_statistic(&mut self, key: &str, display_name: &str, delta: f64) {
        if !self.statistic_enabled(key) {
            return;
        }
        self.statistics
            .entry(key.to_owned())
            .or_insert_with(|| PerFrameStatistic {
                key: key.to_owned(),
                display_name: display_name.to_owned(),
                value: 0.0,
            })
            .value += delta;
    }

    pub fn per_frame_statistics(&self) -> impl Iterator<Item = &PerFrameStatistic> {
        self.statistics.values()
    }

    pub fn per_frame_statistic(&self, key: &str) -> Option<f64> {
        self.statistics.get(key).map(|s| s.value)
    }

    /// Record that `credit` was shown this frame. New credits keep their
    /// insertion position; credits not re-added are kept until removed.
    pub fn add_screen_credit(&mut self, credit: ScreenCredit) {
        let now = self.frame_timestamp;
        match self.screen_credits.iter_mut().find(|(c, _)| c.name == credit.name) {
            Some(entry) => *entry = (credit, now),
            None => self.screen_credits.push((credit, now)),
        }
    }

    /// Credits with the frame timestamp each was last added.
    pub fn screen_credits(&self) -> &[(ScreenCredit, u64)] {
        &self.screen_credits
    }

    pub fn remove_screen_credit(&mut self, name: &str) -> bool {
        let before = self.screen_credits.len();
        self.screen_credits.retain(|(c, _)| c.name != name);
        self.screen_credits.len() != before
    }
}

fn visible_sectors_request(resolutions: &[Angle], time_limit: Duration, sector: &Sector) -> u64 {
    use std::hash::Hasher;
    let mut h = FxHasher::default();
    for r in resolutions {
        h.write_u64(r.radians().to_bits());
    }
    h.write_u128(time_limit.as_nanos());
    for a in [
        sector.min_latitude,
        sector.max_latitude,
        sector.min_longitude,
        sector.max_longitude,
    ] {
        h.write_u64(a.radians().to_bits());
    }
    h.finish()
}

/// Conservative frustum test for a sector's terrain volume.
fn sector_visible(globe: &dyn Globe, frustum: &Frustum, sector: &Sector, max_elevation: f64) -> bool {
    // Large sectors bulge well beyond the sphere bounding their sample points.
    if sector.delta_latitude().degrees() > 90.0 || sector.delta_longitude().degrees() > 90.0 {
        return true;
    }
    let c = sector.centroid();
    let mut samples: Vec<LatLon> = sector.corners().to_vec();
    samples.push(c);
    samples.extend([
        LatLon::new(sector.min_latitude, c.longitude),
        LatLon::new(sector.max_latitude, c.longitude),
        LatLon::new(c.latitude, sector.min_longitude),
        LatLon::new(c.latitude, sector.max_longitude),
    ]);
    let points: Vec<DVec3> = samples
        .iter()
        .flat_map(|l| {
            [0.0, max_elevation]
                .map(|h| globe.compute_point_from_position(l.latitude, l.longitude, h))
        })
        .collect();
    Sphere::from_points(&points).is_some_and(|s| s.intersects_frustum(frustum))
}
