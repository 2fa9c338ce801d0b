//! The view facade: eye, viewport, matrices, and projections.

use glam::{DMat4, DVec3, DVec4};
use globus_math::{Angle, Frustum, Globe, Position, Rect};

/// What renderers need to know about the camera for one frame.
pub trait View {
    fn eye_point(&self) -> DVec3;
    fn eye_position(&self) -> Position;
    /// Unit vector the eye looks along, in model coordinates.
    fn forward(&self) -> DVec3;
    fn viewport(&self) -> Rect;
    fn modelview(&self) -> DMat4;
    fn projection(&self) -> DMat4;
    /// Horizontal field of view.
    fn field_of_view(&self) -> Angle;
    fn near_clip_distance(&self) -> f64;
    fn far_clip_distance(&self) -> f64;
    fn frustum_in_model_coordinates(&self) -> Frustum;

    /// Width in meters of one pixel at `distance` from the eye.
    fn compute_pixel_size_at_distance(&self, distance: f64) -> f64 {
        let width = f64::from(self.viewport().width.max(1));
        2.0 * distance.max(0.0) * (self.field_of_view().radians() / 2.0).tan() / width
    }

    /// Window coordinates (bottom-left origin) and depth in `[0, 1]` of a model
    /// point, or `None` when it lies behind the eye.
    fn project(&self, point: DVec3) -> Option<DVec3> {
        let clip = self.projection() * self.modelview() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let v = self.viewport();
        Some(DVec3::new(
            f64::from(v.x) + (ndc.x + 1.0) / 2.0 * f64::from(v.width),
            f64::from(v.y) + (ndc.y + 1.0) / 2.0 * f64::from(v.height),
            (ndc.z + 1.0) / 2.0,
        ))
    }

    /// Model point at window coordinates `(x, y)` and depth `z`.
    fn unproject(&self, window: DVec3) -> Option<DVec3> {
        let v = self.viewport();
        if v.is_empty() {
            return None;
        }
        let ndc = DVec4::new(
            (window.x - f64::from(v.x)) / f64::from(v.width) * 2.0 - 1.0,
            (window.y - f64::from(v.y)) / f64::from(v.height) * 2.0 - 1.0,
            window.z * 2.0 - 1.0,
            1.0,
        );
        let p = (self.projection() * self.modelview()).inverse() * ndc;
        (p.w.abs() > f64::EPSILON).then(|| p.truncate() / p.w)
    }
}

/// A perspective view defined by an eye point and a look-at target.
#[derive(Clone, Debug)]
pub struct BasicView {
    eye_point: DVec3,
    eye_position: Position,
    forward: DVec3,
    viewport: Rect,
    field_of_view: Angle,
    near: f64,
    far: f64,
    modelview: DMat4,
    projection: DMat4,
}

impl BasicView {
    /// Look straight down at the globe from `eye`, north up.
    pub fn nadir(globe: &dyn Globe, eye: Position, viewport: Rect, field_of_view: Angle) -> Self {
        let eye_point = globe.compute_point(&eye);
        let (sin_lat, cos_lat) = eye.latitude.radians().sin_cos();
        let (sin_lon, cos_lon) = eye.longitude.radians().sin_cos();
        let north = DVec3::new(-sin_lat * sin_lon, cos_lat, -sin_lat * cos_lon);
        Self::look_at(globe, eye_point, DVec3::ZERO, north, viewport, field_of_view)
    }

    pub fn look_at(
        globe: &dyn Globe,
        eye_point: DVec3,
        target: DVec3,
        up: DVec3,
        viewport: Rect,
        field_of_view: Angle,
    ) -> Self {
        let eye_position = globe.compute_position_from_point(eye_point);
        let altitude = eye_position.elevation.max(1.0);
        let near = (altitude / 100.0).max(1.0);
        let far = eye_point.length() + globe.radius();

        let aspect = f64::from(viewport.width.max(1)) / f64::from(viewport.height.max(1));
        let fov_y = 2.0 * ((field_of_view.radians() / 2.0).tan() / aspect).atan();
        Self {
            eye_point,
            eye_position,
            forward: (target - eye_point).normalize_or_zero(),
            viewport,
            field_of_view,
            near,
            far,
            modelview: DMat4::look_at_rh(eye_point, target, up),
            projection: DMat4::perspective_rh_gl(fov_y, aspect, near, far),
        }
    }
}

impl View for BasicView {
    fn eye_point(&self) -> DVec3 {
        self.eye_point
    }

    fn eye_position(&self) -> Position {
        self.eye_position
    }

    fn forward(&self) -> DVec3 {
        self.forward
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn modelview(&self) -> DMat4 {
        self.modelview
    }

    fn projection(&self) -> DMat4 {
        self.projection
    }

    fn field_of_view(&self) -> Angle {
        self.field_of_view
    }

    fn near_clip_distance(&self) -> f64 {
        self.near
    }

    fn far_clip_distance(&self) -> f64 {
        self.far
    }

    fn frustum_in_model_coordinates(&self) -> Frustum {
        Frustum::from_screen_rect(
            &self.viewport,
            &self.viewport,
            self.field_of_view.radians(),
            self.near,
            self.far,
        )
        .transform_by(&self.modelview.transpose())
    }
}
