//! Fixtures shared by the shape tests: a headless backend, a spherical earth,
//! and a nadir view.

use std::cell::RefCell;
use std::rc::Rc;

use globus_math::{Angle, Globe, Position, Rect, SphericalGlobe};
use globus_render::{BasicView, DrawContext, GlobeTerrain, HeadlessBackend};

pub(crate) const WIDTH: i32 = 100;
pub(crate) const HEIGHT: i32 = 80;

pub(crate) struct Frame {
    pub dc: DrawContext,
    pub gl: Rc<RefCell<HeadlessBackend>>,
    pub globe: Rc<dyn Globe>,
}

/// Frame over the earth seen from 1000 km above (0, 0).
pub(crate) fn frame() -> Frame {
    frame_over(SphericalGlobe::earth(), Position::from_degrees(0.0, 0.0, 1_000_000.0))
}

pub(crate) fn frame_over(globe: SphericalGlobe, eye: Position) -> Frame {
    let mut f = frame_without_view_on(globe);
    let view = nadir_view(f.globe.as_ref(), eye);
    f.dc.set_view(Rc::new(view));
    f
}

/// A 45 degree view over the fixture viewport looking straight down from `eye`.
pub(crate) fn nadir_view(globe: &dyn Globe, eye: Position) -> BasicView {
    BasicView::nadir(globe, eye, Rect::new(0, 0, WIDTH, HEIGHT), Angle::from_degrees(45.0))
}

pub(crate) fn frame_without_view() -> Frame {
    frame_without_view_on(SphericalGlobe::earth())
}

fn frame_without_view_on(globe: SphericalGlobe) -> Frame {
    let globe: Rc<dyn Globe> = Rc::new(globe);
    let gl = Rc::new(RefCell::new(HeadlessBackend::new(WIDTH as u32, HEIGHT as u32)));
    let mut dc = DrawContext::default();
    dc.set_globe(Rc::clone(&globe));
    dc.set_terrain(Rc::new(GlobeTerrain::new(Rc::clone(&globe))));
    dc.initialize(gl.clone());
    dc.set_frame_timestamp(1_000);
    Frame { dc, gl, globe }
}
