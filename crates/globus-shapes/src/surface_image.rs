//! Images draped over the terrain.
//!
//! A [`SurfaceImage`] covers a sector with a textured grid whose vertices sit
//! on the terrain. The grid is rebuilt when the globe or vertical exaggeration
//! changes and is shared with the ordered item drawn in the surface phase.

use std::any::Any;
use std::rc::Rc;

use glam::{DVec2, DVec3};
use globus_geometry::{DrawMode, Geometry, GeometryBuilder};
use globus_math::{Color, GlobeStateKey, LatLon, Sector, Sphere};
use globus_render::{
    DrawContext, LayerId, ObjectId, OrderedRenderable, PickedObject, RenderError, SurfaceObject,
    SurfaceStateKey, SurfaceTile,
};

use crate::error::invalid;
use crate::image::ImageSource;
use crate::surface::{self, SurfaceItem};
use crate::ShapeError;

/// Category under which surface image textures are stored in the GPU resource cache.
pub const TEXTURE_CACHE_CATEGORY: &str = "SurfaceImage";
/// Grid cells along each side of the sector.
pub const DEFAULT_GRID_DENSITY: u32 = 16;

#[derive(Debug)]
struct SurfaceGrid {
    globe_key: GlobeStateKey,
    vertical_exaggeration: f64,
    vertices: Rc<Geometry>,
    indices: Rc<[u32]>,
    extent: Sphere,
}

/// A texture bound to the sector it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTile {
    sector: Sector,
    image: ImageSource,
}

impl SurfaceTile for ImageTile {
    fn sector(&self) -> Sector {
        self.sector
    }

    fn bind(&self, dc: &mut DrawContext) -> Result<bool, RenderError> {
        let texture = self.image.texture(dc, TEXTURE_CACHE_CATEGORY)?;
        dc.gl()?.bind_texture(Some(texture));
        Ok(true)
    }
}

/// An image stretched over a sector of the terrain.
#[derive(Debug)]
pub struct SurfaceImage {
    id: ObjectId,
    tile: ImageTile,
    opacity: f64,
    grid_density: u32,
    visible: bool,
    version: u64,
    grid: Option<SurfaceGrid>,
}

impl SurfaceImage {
    pub fn new(sector: Sector, image: ImageSource) -> Self {
        Self {
            id: ObjectId::next(),
            tile: ImageTile { sector, image },
            opacity: 1.0,
            grid_density: DEFAULT_GRID_DENSITY,
            visible: true,
            version: 0,
            grid: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn image(&self) -> &ImageSource {
        &self.tile.image
    }

    pub fn set_image(&mut self, image: ImageSource) {
        self.tile.image = image;
        self.version += 1;
    }

    pub fn set_sector(&mut self, sector: Sector) {
        self.tile.sector = sector;
        self.grid = None;
        self.version += 1;
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) -> Result<(), ShapeError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(invalid(format!("opacity must be within [0, 1], got {opacity}")));
        }
        self.opacity = opacity;
        self.version += 1;
        Ok(())
    }

    pub fn grid_density(&self) -> u32 {
        self.grid_density
    }

    pub fn set_grid_density(&mut self, cells: u32) -> Result<(), ShapeError> {
        if cells == 0 {
            return Err(invalid("surface image grid density must be positive"));
        }
        self.grid_density = cells;
        self.grid = None;
        self.version += 1;
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Vertex count of the current grid, if built.
    pub fn grid_vertex_count(&self) -> Option<usize> {
        self.grid.as_ref().map(|g| g.vertices.vertex_count())
    }

    fn grid_is_stale(&self, dc: &DrawContext) -> bool {
        match &self.grid {
            Some(grid) => {
                dc.globe_state_key().ok() != Some(grid.globe_key)
                    || grid.vertical_exaggeration != dc.vertical_exaggeration()
            }
            None => true,
        }
    }

    fn build_grid(&self, dc: &DrawContext) -> Result<SurfaceGrid, ShapeError> {
        let s = &self.tile.sector;
        let corner = |lat: globus_math::Angle, lon: globus_math::Angle| {
            DVec3::new(lon.degrees(), lat.degrees(), 0.0)
        };
        let control = [
            corner(s.min_latitude, s.min_longitude),
            corner(s.min_latitude, s.max_longitude),
            corner(s.max_latitude, s.min_longitude),
            corner(s.max_latitude, s.max_longitude),
        ];
        let builder = GeometryBuilder::new();
        let n = self.grid_density;
        let cells = builder.bilinear_surface(&control, n, n)?;

        let globe = dc.globe()?;
        let terrain = dc.terrain().ok();
        let ve = dc.vertical_exaggeration();
        let drape = |l: LatLon| surface::draped_point(globe.as_ref(), terrain.as_deref(), ve, l);
        let points: Vec<DVec3> = cells.iter().map(|c| drape(LatLon::from_degrees(c.y, c.x))).collect();
        let center = drape(s.centroid());
        let extent = Sphere::from_points(&points).ok_or_else(|| invalid("surface image grid is empty"))?;
        tracing::trace!(id = self.id.0, vertices = points.len(), "built surface image grid");
        Ok(SurfaceGrid {
            globe_key: dc.globe_state_key()?,
            vertical_exaggeration: dc.vertical_exaggeration(),
            vertices: Rc::new(Geometry::from_points(&points, center).with_mode(DrawMode::Triangles)),
            indices: Rc::from(builder.bilinear_surface_indices(n, n)),
            extent,
        })
    }

    fn enqueue(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        if !self.visible {
            return Ok(());
        }
        self.pre_render(dc)?;
        let Some(grid) = &self.grid else {
            return Ok(());
        };
        if !dc.is_visible(&grid.extent) {
            return Ok(());
        }
        let distance = dc
            .view()
            .map(|v| grid.extent.distance_to(v.eye_point()))
            .unwrap_or(0.0);
        dc.add_ordered_surface_renderable(Box::new(OrderedSurfaceImage {
            id: self.id,
            tile: self.tile.clone(),
            opacity: self.opacity,
            vertices: Rc::clone(&grid.vertices),
            indices: Rc::clone(&grid.indices),
            layer: dc.current_layer(),
            distance,
        }));
        Ok(())
    }
}

impl SurfaceTile for SurfaceImage {
    fn sector(&self) -> Sector {
        self.tile.sector
    }

    fn bind(&self, dc: &mut DrawContext) -> Result<bool, RenderError> {
        self.tile.bind(dc)
    }
}

impl SurfaceObject for SurfaceImage {
    fn pre_render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        if self.grid_is_stale(dc) {
            self.grid = Some(self.build_grid(dc)?);
        }
        Ok(())
    }

    fn state_key(&self, dc: &DrawContext) -> SurfaceStateKey {
        SurfaceStateKey {
            object: self.id,
            version: self.version,
            globe: dc.globe_state_key().ok(),
        }
    }

    fn sectors(&self, _dc: &DrawContext) -> Vec<Sector> {
        vec![self.tile.sector]
    }

    fn render(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.enqueue(dc)
    }

    fn pick(&mut self, dc: &mut DrawContext) -> Result<(), RenderError> {
        self.enqueue(dc)
    }
}

/// A surface image queued for the ordered-surface phase.
pub struct OrderedSurfaceImage {
    id: ObjectId,
    tile: ImageTile,
    opacity: f64,
    vertices: Rc<Geometry>,
    indices: Rc<[u32]>,
    layer: Option<LayerId>,
    distance: f64,
}

impl OrderedSurfaceImage {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl SurfaceItem for OrderedSurfaceImage {
    fn draw(&self, dc: &mut DrawContext, pick_color: Option<Color>) -> Result<(), RenderError> {
        let bound = match pick_color {
            Some(_) => false,
            None => self.tile.bind(dc)?,
        };
        dc.push_reference_center(self.vertices.reference_center())?;
        {
            let mut gl = dc.gl()?;
            gl.set_color(pick_color.unwrap_or_else(|| Color::WHITE.with_opacity(self.opacity)));
            gl.draw_elements(DrawMode::Triangles, self.vertices.vertices(), None, &self.indices);
            if bound {
                gl.bind_texture(None);
            }
        }
        dc.pop_reference_center()
    }

    fn picked_object(&self, color: Color) -> PickedObject {
        PickedObject::new(color.rgb_code(), self.id, self.kind()).with_layer(self.layer)
    }

    fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    fn kind(&self) -> &'static str {
        "SurfaceImage"
    }
}

impl OrderedRenderable for OrderedSurfaceImage {
    fn distance_from_eye(&self) -> f64 {
        self.distance
    }

    fn render(&self, dc: &mut DrawContext) -> Result<(), RenderError> {
        surface::render_run(dc, self)
    }

    fn pick(&self, dc: &mut DrawContext, pick_point: Option<DVec2>) -> Result<(), RenderError> {
        surface::pick_run(dc, self, pick_point)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Frame};
    use globus_math::Rect;
    use globus_render::Command;

    fn image(key: &str) -> ImageSource {
        ImageSource::new(key, 2, 2, Rc::from(vec![200u8; 16])).unwrap()
    }

    fn sector() -> Sector {
        Sector::from_degrees(-1.0, 1.0, -1.0, 1.0)
    }

    /// The grid has one vertex per cell corner and sits on the globe.
    #[test]
    fn test_grid_drapes_sector() {
        let Frame { mut dc, globe, .. } = test_support::frame();
        let mut surface = SurfaceImage::new(sector(), image("a"));
        surface.set_grid_density(4).unwrap();
        surface.pre_render(&mut dc).unwrap();
        assert_eq!(surface.grid_vertex_count(), Some(25));
        let grid = surface.grid.as_ref().unwrap();
        for v in grid.vertices.vertices() {
            let p = v.to_dvec3() + grid.vertices.reference_center();
            assert!((p.length() - globe.radius()).abs() < 1.0);
        }
        assert_eq!(grid.indices.len(), 4 * 4 * 6);
    }

    /// The grid is rebuilt when the vertical exaggeration changes.
    #[test]
    fn test_grid_rebuilt_on_exaggeration_change() {
        let Frame { mut dc, .. } = test_support::frame();
        let mut surface = SurfaceImage::new(sector(), image("a"));
        surface.pre_render(&mut dc).unwrap();
        let first = Rc::clone(&surface.grid.as_ref().unwrap().vertices);
        surface.pre_render(&mut dc).unwrap();
        assert!(Rc::ptr_eq(&first, &surface.grid.as_ref().unwrap().vertices));
        dc.set_vertical_exaggeration(2.0);
        surface.pre_render(&mut dc).unwrap();
        assert!(!Rc::ptr_eq(&first, &surface.grid.as_ref().unwrap().vertices));
    }

    /// Consecutive images draw as one run, each with its own texture uploaded once.
    #[test]
    fn test_run_binds_each_texture() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut a = SurfaceImage::new(sector(), image("a"));
        let mut b = SurfaceImage::new(Sector::from_degrees(1.0, 2.0, 1.0, 2.0), image("b"));
        for _ in 0..2 {
            a.render(&mut dc).unwrap();
            b.render(&mut dc).unwrap();
            dc.draw_ordered_surface_renderables();
        }
        let commands = gl.borrow().commands().to_vec();
        let count = |f: &dyn Fn(&Command) -> bool| commands.iter().filter(|c| f(c)).count();
        assert_eq!(count(&|c| matches!(c, Command::CreateTexture { .. })), 2);
        assert_eq!(count(&|c| *c == Command::Blending(true)), 2);
        assert_eq!(
            count(&|c| matches!(c, Command::DrawElements { mode: DrawMode::Triangles, .. })),
            4
        );
        assert_eq!(dc.ordered_surface_renderable_count(), 0);
    }

    /// The state key changes with the image's version.
    #[test]
    fn test_state_key_tracks_changes() {
        let Frame { dc, .. } = test_support::frame();
        let mut surface = SurfaceImage::new(sector(), image("a"));
        let before = surface.state_key(&dc);
        surface.set_opacity(0.5).unwrap();
        assert_ne!(surface.state_key(&dc), before);
        assert_eq!(surface.sectors(&dc), vec![sector()]);
        assert!(surface.set_opacity(1.5).is_err());
        assert!(surface.set_grid_density(0).is_err());
    }

    /// Picking an image resolves its id without binding textures.
    #[test]
    fn test_pick_resolves_image() {
        let Frame { mut dc, gl, .. } = test_support::frame();
        let mut surface = SurfaceImage::new(sector(), image("a"));
        dc.set_picking_mode(true);
        dc.set_pick_point(Some(DVec2::new(50.0, 40.0)));
        surface.pick(&mut dc).unwrap();
        gl.borrow_mut()
            .fill_rect(Rect::new(0, 0, test_support::WIDTH, test_support::HEIGHT), 1);
        dc.draw_ordered_surface_renderables();
        let top = dc.picked_objects().top_picked_object().unwrap();
        assert_eq!(top.object, surface.id());
        assert_eq!(top.kind, "SurfaceImage");
        assert!(!gl.borrow().commands().iter().any(|c| matches!(c, Command::CreateTexture { .. })));
    }
}
