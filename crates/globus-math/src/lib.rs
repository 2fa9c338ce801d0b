//! Geographic and geometric primitives for the Globus engine: angles, locations,
//! sectors, great-circle and rhumb-line navigation, planes, frusta, bounding
//! spheres, screen rectangles, colors, and the globe facade.

mod angle;
mod color;
mod extent;
mod frustum;
mod globe;
mod location;
mod plane;
mod rect;
mod sector;

pub use angle::Angle;
pub use color::Color;
pub use extent::Sphere;
pub use frustum::Frustum;
pub use globe::{Globe, GlobeStateKey, SphericalGlobe, WGS84_EQUATORIAL_RADIUS};
pub use location::{LatLon, Position};
pub use plane::{Line, Plane};
pub use rect::Rect;
pub use sector::Sector;
