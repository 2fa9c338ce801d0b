//! Shared drawing protocol of terrain-draped shapes.
//!
//! Surface shapes queue one item each on the draw context's ordered-surface
//! FIFO. The first item of a run sets up state, draws itself and every
//! consecutive item of the same type, then restores state.

use std::cell::RefCell;

use glam::{DVec2, DVec3};
use globus_math::{Color, Globe, LatLon};
use globus_render::{
    DrawContext, LayerId, OrderedRenderable, PickSupport, PickedObject, RenderError, Terrain,
};

/// A queued surface item that can draw itself in a run of its own type.
pub(crate) trait SurfaceItem: OrderedRenderable + Sized {
    fn draw(&self, dc: &mut DrawContext, pick_color: Option<Color>) -> Result<(), RenderError>;

    fn picked_object(&self, color: Color) -> PickedObject;

    fn layer(&self) -> Option<LayerId>;

    fn kind(&self) -> &'static str;
}

fn begin(dc: &DrawContext, picking: bool) -> Result<(), RenderError> {
    let mut gl = dc.gl()?;
    gl.set_depth_test(false);
    gl.set_depth_mask(false);
    gl.set_blending(!picking);
    Ok(())
}

fn end(dc: &DrawContext) -> Result<(), RenderError> {
    let mut gl = dc.gl()?;
    gl.bind_texture(None);
    gl.set_blending(false);
    gl.set_depth_mask(true);
    gl.set_depth_test(true);
    gl.set_line_width(1.0);
    Ok(())
}

fn draw_logged<T: SurfaceItem>(dc: &mut DrawContext, item: &T, pick_color: Option<Color>) {
    if let Err(e) = item.draw(dc, pick_color) {
        tracing::warn!(error = %e, kind = item.kind(), "surface shape failed to draw");
    }
}

/// Draw `first` and the run of same-type items queued right behind it.
pub(crate) fn render_run<T: SurfaceItem>(dc: &mut DrawContext, first: &T) -> Result<(), RenderError> {
    begin(dc, false)?;
    draw_logged(dc, first, None);
    while let Some(next) = dc.poll_ordered_surface_renderable_if(|r| r.as_any().is::<T>()) {
        if let Some(item) = next.as_any().downcast_ref::<T>() {
            draw_logged(dc, item, None);
        }
    }
    end(dc)
}

/// Draw `first` and its run in unique pick colors and resolve the pick.
pub(crate) fn pick_run<T: SurfaceItem>(
    dc: &mut DrawContext,
    first: &T,
    pick_point: Option<DVec2>,
) -> Result<(), RenderError> {
    let support = RefCell::new(PickSupport::new());
    let pick_one = |dc: &mut DrawContext, item: &T| {
        let color = dc.unique_pick_color();
        support.borrow_mut().add_pickable_object(item.picked_object(color));
        draw_logged(dc, item, Some(color));
    };
    begin(dc, true)?;
    pick_one(dc, first);
    while let Some(next) = dc.poll_ordered_surface_renderable_if(|r| {
        r.as_any()
            .downcast_ref::<T>()
            .is_some_and(|item| item.layer() == first.layer())
    }) {
        if let Some(item) = next.as_any().downcast_ref::<T>() {
            pick_one(dc, item);
        }
    }
    end(dc)?;
    let mut support = support.into_inner();
    support.resolve_pick(dc, pick_point, first.layer())?;
    Ok(())
}

/// Terrain point at `location` raised by `vertical_exaggeration`, or the bare
/// globe point where no terrain is loaded.
pub(crate) fn draped_point(
    globe: &dyn Globe,
    terrain: Option<&dyn Terrain>,
    vertical_exaggeration: f64,
    location: LatLon,
) -> DVec3 {
    terrain
        .and_then(|t| t.surface_point(location.latitude, location.longitude, 0.0, vertical_exaggeration))
        .unwrap_or_else(|| globe.compute_point_from_position(location.latitude, location.longitude, 0.0))
}
