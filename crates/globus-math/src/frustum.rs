//! Six-plane view frusta in f64 model space.
//!
//! Frusta are built in eye coordinates from a screen rectangle (the whole
//! viewport for view culling, a few pixels around the cursor for picking) and
//! moved into model coordinates with [`Frustum::transform_by`].

use glam::{DMat4, DVec3};

use crate::{Plane, Rect, Sphere};

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// A convex volume bounded by six inward-facing planes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Eye-space frustum through the screen rectangle `rect` (bottom-left
    /// origin window coordinates) of a perspective view whose full viewport is
    /// `viewport` and whose horizontal field of view is `fov_radians`.
    ///
    /// The eye sits at the origin looking down -Z with +Y up.
    pub fn from_screen_rect(
        rect: &Rect,
        viewport: &Rect,
        fov_radians: f64,
        near: f64,
        far: f64,
    ) -> Self {
        let screen_distance =
            f64::from(viewport.width) / (2.0 * (fov_radians / 2.0).tan());
        let (vcx, vcy) = viewport.center();
        let x0 = f64::from(rect.x) - vcx;
        let x1 = f64::from(rect.max_x()) - vcx;
        let y0 = f64::from(rect.y) - vcy;
        let y1 = f64::from(rect.max_y()) - vcy;
        let d = screen_distance;

        let plane = |n: DVec3, dist: f64| Plane {
            normal: n.normalize(),
            distance: dist,
        };
        let mut planes = [Plane {
            normal: DVec3::Z,
            distance: 0.0,
        }; 6];
        planes[LEFT] = plane(DVec3::new(d, 0.0, x0), 0.0);
        planes[RIGHT] = plane(DVec3::new(-d, 0.0, -x1), 0.0);
        planes[BOTTOM] = plane(DVec3::new(0.0, d, y0), 0.0);
        planes[TOP] = plane(DVec3::new(0.0, -d, -y1), 0.0);
        planes[NEAR] = plane(DVec3::NEG_Z, -near);
        planes[FAR] = plane(DVec3::Z, far);
        Self { planes }
    }

    /// Transform every plane by `matrix`, treating planes as row vectors.
    ///
    /// To move an eye-space frustum into model space pass the transpose of the
    /// modelview matrix.
    pub fn transform_by(&self, matrix: &DMat4) -> Self {
        let mut planes = self.planes;
        for plane in &mut planes {
            if let Some(p) = Plane::from_vec4(*matrix * plane.to_vec4()) {
                *plane = p;
            }
        }
        Self { planes }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn near(&self) -> &Plane {
        &self.planes[NEAR]
    }

    pub fn far(&self) -> &Plane {
        &self.planes[FAR]
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) >= 0.0)
    }

    /// Conservative sphere test: `false` only when the sphere lies entirely
    /// behind one plane.
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(sphere.center) > -sphere.radius)
    }

    /// Whether any part of the segment `a`-`b` may lie inside the frustum.
    pub fn intersects_segment(&self, a: DVec3, b: DVec3) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(a) >= 0.0 || p.signed_distance(b) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Rect {
        Rect::new(0, 0, 800, 600)
    }

    fn view_frustum() -> Frustum {
        Frustum::from_screen_rect(
            &viewport(),
            &viewport(),
            std::f64::consts::FRAC_PI_4,
            1.0,
            1000.0,
        )
    }

    #[test]
    fn test_point_on_view_axis_is_inside() {
        let f = view_frustum();
        assert!(f.contains_point(DVec3::new(0.0, 0.0, -10.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, 10.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -2000.0)));
    }

    /// A pick frustum around the screen center excludes off-axis points.
    #[test]
    fn test_pick_rect_frustum_is_narrow() {
        let pick = Rect::centered(400.0, 300.0, 4);
        let f = Frustum::from_screen_rect(&pick, &viewport(), std::f64::consts::FRAC_PI_4, 1.0, 1000.0);
        assert!(f.contains_point(DVec3::new(0.0, 0.0, -100.0)));
        assert!(!f.contains_point(DVec3::new(20.0, 0.0, -100.0)));
    }

    /// Transforming by the modelview transpose matches transforming the points.
    #[test]
    fn test_transform_into_model_space() {
        let modelview = DMat4::from_translation(DVec3::new(0.0, 0.0, -50.0));
        let model = view_frustum().transform_by(&modelview.transpose());
        // Model-space origin sits 50 units in front of the eye.
        assert!(model.contains_point(DVec3::ZERO));
        assert!(!model.contains_point(DVec3::new(0.0, 0.0, 60.0)));
    }

    #[test]
    fn test_sphere_straddling_plane_intersects() {
        let f = view_frustum();
        assert!(f.intersects_sphere(&Sphere::new(DVec3::new(0.0, 0.0, -0.5), 1.0)));
        assert!(!f.intersects_sphere(&Sphere::new(DVec3::new(0.0, 0.0, 5.0), 1.0)));
    }
}
