//! Drawing of queued airspaces.
//!
//! An [`AirspaceRenderer`] is shared by every airspace it draws. When the
//! ordered queue reaches one of its airspaces it sets up state once, draws
//! the run of consecutive airspaces queued for the same renderer, then
//! restores state.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec2;
use globus_math::{Color, Position};
use globus_render::{
    DepthOffset, DrawContext, LayerId, ObjectId, OrderedRenderable, PickSupport, PickedObject,
    RenderError,
};

use super::{AirspaceGeometry, GeometryPart};
use crate::ShapeAttributes;

/// An airspace's draw data captured for the ordered-rendering phase.
pub struct OrderedAirspace {
    renderer: Rc<AirspaceRenderer>,
    id: ObjectId,
    kind: &'static str,
    geometry: AirspaceGeometry,
    attributes: ShapeAttributes,
    eye_distance: f64,
    layer: Option<LayerId>,
    position: Option<Position>,
}

impl OrderedAirspace {
    pub fn new(
        renderer: Rc<AirspaceRenderer>,
        id: ObjectId,
        kind: &'static str,
        geometry: AirspaceGeometry,
        attributes: ShapeAttributes,
        eye_distance: f64,
    ) -> Self {
        Self {
            renderer,
            id,
            kind,
            geometry,
            attributes,
            eye_distance,
            layer: None,
            position: None,
        }
    }

    pub fn with_layer(mut self, layer: Option<LayerId>) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn geometry(&self) -> &AirspaceGeometry {
        &self.geometry
    }

    fn picked_object(&self, color: Color) -> PickedObject {
        let object = PickedObject::new(color.rgb_code(), self.id, self.kind).with_layer(self.layer);
        match self.position {
            Some(p) => object.with_position(p),
            None => object,
        }
    }
}

impl OrderedRenderable for OrderedAirspace {
    fn distance_from_eye(&self) -> f64 {
        self.eye_distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.renderer.render_ordered(dc, self)
    }

    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError> {
        self.renderer.pick_ordered(dc, self, pick_point)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared renderer for airspaces.
#[derive(Debug)]
pub struct AirspaceRenderer {
    enable_batch_rendering: bool,
    enable_batch_picking: bool,
    enable_depth_offset: bool,
    depth_offset: DepthOffset,
    pick_support: RefCell<PickSupport>,
}

impl Default for AirspaceRenderer {
    fn default() -> Self {
        Self {
            enable_batch_rendering: true,
            enable_batch_picking: true,
            enable_depth_offset: true,
            depth_offset: DepthOffset::default(),
            pick_support: RefCell::new(PickSupport::new()),
        }
    }
}

impl AirspaceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enable_batch_rendering(&self) -> bool {
        self.enable_batch_rendering
    }

    pub fn set_enable_batch_rendering(&mut self, enable: bool) {
        self.enable_batch_rendering = enable;
    }

    pub fn is_enable_batch_picking(&self) -> bool {
        self.enable_batch_picking
    }

    pub fn set_enable_batch_picking(&mut self, enable: bool) {
        self.enable_batch_picking = enable;
    }

    pub fn is_enable_depth_offset(&self) -> bool {
        self.enable_depth_offset
    }

    pub fn set_enable_depth_offset(&mut self, enable: bool) {
        self.enable_depth_offset = enable;
    }

    pub fn depth_offset(&self) -> DepthOffset {
        self.depth_offset
    }

    pub fn set_depth_offset(&mut self, offset: DepthOffset) {
        self.depth_offset = offset;
    }

    /// Draw `first` and, when batching, the run of airspaces queued right
    /// behind it for this renderer.
    pub fn render_ordered(
        &self,
        dc: &mut DrawContext,
        first: &OrderedAirspace,
    ) -> Result<(), RenderError> {
        self.begin_rendering(dc, false)?;
        self.draw_logged(dc, first, None);
        if self.enable_batch_rendering {
            while let Some(next) = dc.poll_ordered_renderable_if(|r| same_renderer(r, first, false)) {
                if let Some(airspace) = next.as_any().downcast_ref::<OrderedAirspace>() {
                    self.draw_logged(dc, airspace, None);
                }
            }
        }
        self.end_rendering(dc)
    }

    /// Draw `first` (and its batch) in unique pick colors, then resolve what
    /// lies under the pick point and inside the pick rectangle.
    pub fn pick_ordered(
        &self,
        dc: &mut DrawContext,
        first: &OrderedAirspace,
        pick_point: Option<DVec2>,
    ) -> Result<(), RenderError> {
        self.pick_support.borrow_mut().clear_pick_list();
        self.begin_rendering(dc, true)?;
        self.pick_one(dc, first);
        if self.enable_batch_picking {
            while let Some(next) = dc.poll_ordered_renderable_if(|r| same_renderer(r, first, true)) {
                if let Some(airspace) = next.as_any().downcast_ref::<OrderedAirspace>() {
                    self.pick_one(dc, airspace);
                }
            }
        }
        self.end_rendering(dc)?;
        self.pick_support
            .borrow_mut()
            .resolve_pick(dc, pick_point, first.layer)?;
        Ok(())
    }

    fn pick_one(&self, dc: &mut DrawContext, airspace: &OrderedAirspace) {
        let color = dc.unique_pick_color();
        self.pick_support
            .borrow_mut()
            .add_pickable_object(airspace.picked_object(color));
        self.draw_logged(dc, airspace, Some(color));
    }

    fn draw_logged(&self, dc: &mut DrawContext, airspace: &OrderedAirspace, pick_color: Option<Color>) {
        if let Err(e) = self.draw(dc, airspace, pick_color) {
            tracing::warn!(error = %e, kind = airspace.kind, id = airspace.id.0, "airspace failed to draw");
        }
    }

    fn begin_rendering(&self, dc: &mut DrawContext, picking: bool) -> Result<(), RenderError> {
        let mut gl = dc.gl()?;
        gl.set_depth_test(true);
        gl.set_depth_mask(true);
        gl.set_color_mask(true);
        gl.set_blending(!picking);
        Ok(())
    }

    fn end_rendering(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        let mut gl = dc.gl()?;
        gl.set_blending(false);
        gl.set_lighting(false);
        gl.set_polygon_offset(None);
        gl.set_depth_mask(true);
        gl.set_color_mask(true);
        gl.set_line_width(1.0);
        Ok(())
    }

    fn draw(
        &self,
        dc: &mut DrawContext,
        airspace: &OrderedAirspace,
        pick_color: Option<Color>,
    ) -> Result<(), RenderError> {
        if dc.is_picking_mode() && dc.is_deep_picking() {
            self.draw_interior(dc, airspace, pick_color)?;
            self.draw_outline(dc, airspace, pick_color)
        } else {
            self.draw_outlined_shape(dc, airspace, pick_color)
        }
    }

    /// Outline first without depth writes, the interior depth-correct, then
    /// the outline again over the interior.
    fn draw_outlined_shape(
        &self,
        dc: &mut DrawContext,
        airspace: &OrderedAirspace,
        pick_color: Option<Color>,
    ) -> Result<(), RenderError> {
        let attributes = &airspace.attributes;
        let interior = attributes.draw_interior();
        let outline = attributes.draw_outline();

        if interior && outline {
            dc.gl()?.set_depth_mask(false);
            self.draw_outline(dc, airspace, pick_color)?;
            dc.gl()?.set_depth_mask(true);
        }

        if interior {
            if self.enable_depth_offset {
                {
                    let mut gl = dc.gl()?;
                    gl.set_color_mask(false);
                    gl.set_polygon_offset(Some(self.depth_offset));
                }
                self.draw_interior(dc, airspace, pick_color)?;
                {
                    let mut gl = dc.gl()?;
                    gl.set_color_mask(true);
                    gl.set_polygon_offset(None);
                    gl.set_depth_mask(false);
                }
                self.draw_interior(dc, airspace, pick_color)?;
                dc.gl()?.set_depth_mask(true);
            } else {
                self.draw_interior(dc, airspace, pick_color)?;
            }
        }

        if outline {
            self.draw_outline(dc, airspace, pick_color)?;
        }
        Ok(())
    }

    fn draw_interior(
        &self,
        dc: &mut DrawContext,
        airspace: &OrderedAirspace,
        pick_color: Option<Color>,
    ) -> Result<(), RenderError> {
        let attributes = &airspace.attributes;
        {
            let mut gl = dc.gl()?;
            gl.set_lighting(pick_color.is_none() && attributes.enable_lighting());
            gl.set_color(pick_color.unwrap_or_else(|| attributes.effective_interior_color()));
        }
        draw_parts(dc, &airspace.geometry.fill)?;
        dc.gl()?.set_lighting(false);
        Ok(())
    }

    fn draw_outline(
        &self,
        dc: &mut DrawContext,
        airspace: &OrderedAirspace,
        pick_color: Option<Color>,
    ) -> Result<(), RenderError> {
        let attributes = &airspace.attributes;
        {
            let mut gl = dc.gl()?;
            gl.set_line_width(attributes.outline_width() as f32);
            gl.set_color(pick_color.unwrap_or_else(|| attributes.effective_outline_color()));
        }
        draw_parts(dc, &airspace.geometry.outline)
    }
}

fn draw_parts(dc: &mut DrawContext, parts: &[GeometryPart]) -> Result<(), RenderError> {
    for part in parts {
        dc.push_reference_center(part.vertices.reference_center())?;
        dc.gl()?.draw_elements(
            part.indices.mode(),
            part.vertices.vertices(),
            part.vertices.normals(),
            part.indices.indices(),
        );
        dc.pop_reference_center()?;
    }
    Ok(())
}

/// Whether `candidate` is an airspace queued for the same renderer as
/// `first` (and, while picking, in the same layer).
fn same_renderer(candidate: &dyn OrderedRenderable, first: &OrderedAirspace, picking: bool) -> bool {
    candidate
        .as_any()
        .downcast_ref::<OrderedAirspace>()
        .is_some_and(|a| Rc::ptr_eq(&a.renderer, &first.renderer) && (!picking || a.layer == first.layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use glam::DVec3;
    use globus_geometry::{DrawMode, Geometry};
    use globus_render::Command;

    fn triangle() -> AirspaceGeometry {
        let center = DVec3::new(0.0, 0.0, 7_000_000.0);
        let vertices = Rc::new(Geometry::from_points(
            &[center, center + DVec3::X, center + DVec3::Y],
            center,
        ));
        let part = GeometryPart::new(
            vertices,
            Rc::new(Geometry::from_indices(DrawMode::Triangles, vec![0, 1, 2])),
        );
        let outline = GeometryPart::new(
            Rc::clone(&part.vertices),
            Rc::new(Geometry::from_indices(DrawMode::Lines, vec![0, 1, 1, 2, 2, 0])),
        );
        AirspaceGeometry {
            fill: vec![part],
            outline: vec![outline],
        }
    }

    fn ordered(renderer: &Rc<AirspaceRenderer>, attributes: ShapeAttributes, distance: f64) -> OrderedAirspace {
        OrderedAirspace::new(
            Rc::clone(renderer),
            ObjectId::next(),
            "Test",
            triangle(),
            attributes,
            distance,
        )
    }

    fn outlined() -> ShapeAttributes {
        let mut a = ShapeAttributes::default();
        a.set_draw_outline(true);
        a
    }

    fn protocol(commands: &[Command]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::DepthMask(on) => Some(format!("depth:{on}")),
                Command::ColorMask(on) => Some(format!("color:{on}")),
                Command::PolygonOffset(o) => Some(format!("offset:{}", o.is_some())),
                Command::DrawElements { mode, .. } => Some(format!("draw:{mode:?}")),
                _ => None,
            })
            .collect()
    }

    /// With interior, outline, and depth offset the passes run outline,
    /// depth-only interior, color-only interior, outline.
    #[test]
    fn test_outlined_shape_pass_sequence() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let renderer = Rc::new(AirspaceRenderer::new());
        dc.add_ordered_renderable(Box::new(ordered(&renderer, outlined(), 10.0)));
        gl.borrow_mut().take_commands();
        dc.draw_ordered_renderables();

        let steps = protocol(gl.borrow().commands());
        let expected = [
            "depth:true", "color:true", // begin
            "depth:false", "draw:Lines", "depth:true",
            "color:false", "offset:true", "draw:Triangles",
            "color:true", "offset:false", "depth:false", "draw:Triangles", "depth:true",
            "draw:Lines",
            "offset:false", "depth:true", "color:true", // end
        ];
        assert_eq!(steps, expected);
    }

    /// Without depth offset the interior is drawn once with both writes on.
    #[test]
    fn test_interior_without_depth_offset() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut renderer = AirspaceRenderer::new();
        renderer.set_enable_depth_offset(false);
        let renderer = Rc::new(renderer);
        dc.add_ordered_renderable(Box::new(ordered(&renderer, ShapeAttributes::default(), 10.0)));
        gl.borrow_mut().take_commands();
        dc.draw_ordered_renderables();

        let steps = protocol(gl.borrow().commands());
        assert_eq!(
            steps,
            ["depth:true", "color:true", "draw:Triangles", "offset:false", "depth:true", "color:true"]
        );
    }

    /// One state setup covers a run of airspaces sharing a renderer; another
    /// renderer breaks the run.
    #[test]
    fn test_batch_consumes_run_of_same_renderer() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let shared = Rc::new(AirspaceRenderer::new());
        let other = Rc::new(AirspaceRenderer::new());
        let attrs = ShapeAttributes::default();
        dc.add_ordered_renderable(Box::new(ordered(&shared, attrs.clone(), 30.0)));
        dc.add_ordered_renderable(Box::new(ordered(&shared, attrs.clone(), 20.0)));
        dc.add_ordered_renderable(Box::new(ordered(&other, attrs.clone(), 10.0)));
        dc.add_ordered_renderable(Box::new(ordered(&shared, attrs, 5.0)));
        gl.borrow_mut().take_commands();
        dc.draw_ordered_renderables();

        let commands = gl.borrow().commands().to_vec();
        let begins = commands.iter().filter(|c| **c == Command::Blending(true)).count();
        assert_eq!(begins, 3);
        // Depth-only plus color-only interior per airspace.
        assert_eq!(gl.borrow().draw_count(), 8);
        assert_eq!(dc.ordered_renderable_count(), 0);
    }

    /// Picking draws in unique colors and resolves the color under the point.
    #[test]
    fn test_pick_resolves_airspace_under_point() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let renderer = Rc::new(AirspaceRenderer::new());
        let a = ordered(&renderer, ShapeAttributes::default(), 20.0);
        let b = ordered(&renderer, ShapeAttributes::default(), 10.0);
        let (id_a, id_b) = (a.id(), b.id());
        dc.add_ordered_renderable(Box::new(a));
        dc.add_ordered_renderable(Box::new(b));

        // The second pick color lands under the pick point.
        gl.borrow_mut().fill_rect(globus_math::Rect::new(0, 0, 100, 80), 2);
        dc.set_picking_mode(true);
        dc.set_pick_point(Some(DVec2::new(10.0, 10.0)));
        dc.draw_ordered_renderables();

        let picked = dc.picked_objects().top_picked_object().cloned();
        assert_eq!(picked.map(|p| p.object), Some(id_b));
        assert!(!dc.picked_objects().contains(id_a));
        let blending = gl.borrow().commands().contains(&Command::Blending(true));
        assert!(!blending);
    }

    /// A failing airspace in a batch is skipped and the rest still draw.
    #[test]
    fn test_batch_survives_missing_view() {
        let Frame { mut dc, gl, .. } = test_support::frame_without_view();
        let renderer = Rc::new(AirspaceRenderer::new());
        dc.add_ordered_renderable(Box::new(ordered(&renderer, ShapeAttributes::default(), 2.0)));
        dc.add_ordered_renderable(Box::new(ordered(&renderer, ShapeAttributes::default(), 1.0)));
        dc.draw_ordered_renderables();
        assert_eq!(gl.borrow().draw_count(), 0);
        assert_eq!(dc.ordered_renderable_count(), 0);
    }
}
